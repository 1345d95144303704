//! Generic specialization cache.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use dlbind_core::{MethodDeclaration, TypeDesc};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::instance::BoundInstance;

/// Identity of one closed specialization.
///
/// Two calls share a specialization iff name, return type, parameter types,
/// and type arguments are all equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClosedGenericSignature {
    pub name: String,
    pub return_type: TypeDesc,
    pub parameters: Vec<TypeDesc>,
    pub type_args: Vec<TypeDesc>,
}

impl ClosedGenericSignature {
    pub fn of(method: &MethodDeclaration) -> Self {
        Self {
            name: method.name.clone(),
            return_type: method.return_type.clone(),
            parameters: method.parameter_types().cloned().collect(),
            type_args: method.generic_args.clone(),
        }
    }
}

impl fmt::Display for ClosedGenericSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |types: &[TypeDesc]| types.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
        write!(
            f,
            "{}<{}>({}) -> {}",
            self.name,
            join(&self.type_args),
            join(&self.parameters),
            self.return_type
        )
    }
}

/// Cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericStatistics {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl GenericStatistics {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Closed specializations of one instance's generic methods.
///
/// Creation is single-flight per signature: concurrent first calls for the
/// same signature bind it once. A failed creation leaves the entry empty so
/// a later call retries.
#[derive(Default)]
pub struct GenericCache {
    entries: DashMap<ClosedGenericSignature, Arc<OnceCell<Arc<BoundInstance>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl GenericCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The specialization for `signature`, creating it on first use.
    pub fn get_or_create(
        &self,
        signature: ClosedGenericSignature,
        create: impl FnOnce() -> Result<BoundInstance>,
    ) -> Result<Arc<BoundInstance>> {
        // Clone the cell out so the shard lock is not held while binding.
        let cell = Arc::clone(self.entries.entry(signature.clone()).or_default().value());
        let mut created = false;
        let instance = cell.get_or_try_init(|| {
            created = true;
            create().map(Arc::new)
        })?;

        if created {
            self.misses.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(target: "dlbind::generics", %signature, "created specialization");
        } else {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        Ok(Arc::clone(instance))
    }

    /// Number of created specializations.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.value().get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn statistics(&self) -> GenericStatistics {
        GenericStatistics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    /// Dispose every specialization created so far.
    pub fn dispose(&self) {
        for entry in self.entries.iter() {
            if let Some(instance) = entry.value().get() {
                instance.dispose();
            }
        }
    }
}

impl fmt::Debug for GenericCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericCache")
            .field("statistics", &self.statistics())
            .finish()
    }
}
