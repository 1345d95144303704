//! Binding generation pipeline.
//!
//! Every contract member enters as one [`WorkUnit`]. The first applicable
//! stage either emits a final [`Binding`] or replaces the unit with new ones
//! that re-enter the pipeline with that stage, and every stage before it on
//! the path, excluded.

use std::fmt;
use std::sync::Arc;

use dlbind_core::{Contract, ImplementationOptions, Member, MethodDeclaration};
use dlbind_dllmap::DllMapResolver;
use dlbind_marshal::{transform_symbol, ManglerContext, ManglerRegistry, TransformerRegistry};
use dlbind_targets::Platform;

use crate::complexity::{sort_by_complexity, GeneratorComplexity};
use crate::error::{BindError, Result};
use crate::library::LibraryState;
use crate::unit::{Binding, Definition, SymbolTarget, WorkUnit};

/// Transformer and mangler registries used while binding.
///
/// Unset registries fall back to the process-wide ones.
#[derive(Debug, Clone, Default)]
pub struct Registries {
    pub transformers: Option<Arc<TransformerRegistry>>,
    pub manglers: Option<Arc<ManglerRegistry>>,
}

impl Registries {
    pub fn transformers(&self) -> &TransformerRegistry {
        match self.transformers.as_deref() {
            Some(registry) => registry,
            None => TransformerRegistry::global(),
        }
    }

    pub fn manglers(&self) -> &ManglerRegistry {
        match self.manglers.as_deref() {
            Some(registry) => registry,
            None => ManglerRegistry::global(),
        }
    }
}

/// Everything a stage may consult while generating a binding.
#[derive(Debug, Clone)]
pub struct BindingContext {
    pub contract: Arc<Contract>,
    pub options: ImplementationOptions,
    pub platform: Platform,
    /// Library name as requested, before dllmap mapping.
    pub requested_library: String,
    pub library: Arc<LibraryState>,
    pub registries: Registries,
    pub dllmap: Option<Arc<DllMapResolver>>,
}

impl BindingContext {
    pub fn is_lazy(&self) -> bool {
        self.options.contains(ImplementationOptions::USE_LAZY_BINDING)
    }

    /// Final symbol for an entry-point name: naming policy, then mangling
    /// for methods, then dllmap redirection when enabled.
    pub fn symbol_for(&self, entry: &str, method: Option<&MethodDeclaration>) -> Result<SymbolTarget> {
        let mut symbol = transform_symbol(&self.contract.naming, entry);
        if let Some(method) = method {
            let ctx = ManglerContext {
                method,
                convention: method.convention_or(self.contract.default_convention),
                platform: self.platform,
            };
            symbol = self.registries.manglers().mangle(&symbol, &ctx)?;
        }

        if !self.options.contains(ImplementationOptions::ENABLE_DLL_MAP_SUPPORT) {
            return Ok(SymbolTarget::local(symbol));
        }
        let Some(dllmap) = &self.dllmap else {
            return Ok(SymbolTarget::local(symbol));
        };
        let redirect = dllmap.map_symbol(&self.requested_library, &symbol);
        Ok(SymbolTarget {
            library: redirect.library,
            name: redirect.symbol,
        })
    }

    /// Initial work unit for the member at `index`.
    pub fn root_unit(&self, index: usize) -> Result<WorkUnit> {
        let member = self
            .contract
            .member(index)
            .ok_or_else(|| BindError::internal(format!("no member at index {index}")))?;
        Ok(match member {
            Member::Method(method) => WorkUnit::new(
                index,
                Definition::Method(method.clone()),
                self.symbol_for(method.entry_name(), Some(method))?,
            ),
            Member::Property(property) => WorkUnit::new(
                index,
                Definition::Property(property.clone()),
                self.symbol_for(property.entry_name(), None)?,
            ),
        })
    }
}

/// Composes the bindings of replacement units into the binding of the
/// unit they replaced.
pub type Compose = Box<dyn FnOnce(Vec<Binding>) -> Result<Binding> + Send>;

/// Output of one stage for one unit.
pub enum Generated {
    Terminal(Binding),
    Expanded { units: Vec<WorkUnit>, compose: Compose },
}

impl Generated {
    /// Replace the unit with `inner` and wrap its binding.
    pub fn wrap(inner: WorkUnit, wrap: impl FnOnce(Binding) -> Result<Binding> + Send + 'static) -> Self {
        Self::Expanded {
            units: vec![inner],
            compose: Box::new(move |mut bindings| {
                let binding = bindings
                    .pop()
                    .ok_or_else(|| BindError::internal("wrapped unit produced no binding"))?;
                wrap(binding)
            }),
        }
    }
}

impl fmt::Debug for Generated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminal(binding) => f.debug_tuple("Terminal").field(binding).finish(),
            Self::Expanded { units, .. } => f.debug_struct("Expanded").field("units", units).finish(),
        }
    }
}

/// One pipeline stage.
pub trait BindingGenerator: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn complexity(&self) -> GeneratorComplexity;

    fn is_applicable(&self, unit: &WorkUnit, ctx: &BindingContext) -> bool;

    fn generate(&self, unit: WorkUnit, ctx: &BindingContext) -> Result<Generated>;
}

/// Shared handle to a stage.
pub type SharedGenerator = Arc<dyn BindingGenerator>;

/// Binding of one member plus the stages that produced it.
#[derive(Debug)]
pub struct MemberBinding {
    pub binding: Binding,
    pub symbol: SymbolTarget,
    pub stages: Vec<&'static str>,
}

/// Ordered set of stages.
#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: Vec<SharedGenerator>,
}

impl Pipeline {
    /// Pipeline over `stages`, ordered by complexity.
    ///
    /// Stages of equal score keep the order given here.
    pub fn new(mut stages: Vec<SharedGenerator>) -> Self {
        sort_by_complexity(&mut stages, |s| s.complexity());
        Self { stages }
    }

    /// The standard stage set.
    pub fn standard() -> Self {
        Self::new(crate::generators::standard_stages())
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Produce the binding for one root unit.
    pub fn bind(&self, unit: WorkUnit, ctx: &BindingContext) -> Result<MemberBinding> {
        let symbol = unit.symbol.clone();
        let mut fired = Vec::new();
        let binding = self.consume(unit, ctx, &[], &mut fired)?;
        let mut stages: Vec<&'static str> = Vec::with_capacity(fired.len());
        for name in fired {
            if !stages.contains(&name) {
                stages.push(name);
            }
        }
        Ok(MemberBinding {
            binding,
            symbol,
            stages,
        })
    }

    fn consume(
        &self,
        unit: WorkUnit,
        ctx: &BindingContext,
        excluded: &[usize],
        fired: &mut Vec<&'static str>,
    ) -> Result<Binding> {
        let Some((index, stage)) = self
            .stages
            .iter()
            .enumerate()
            .find(|(i, stage)| !excluded.contains(i) && stage.is_applicable(&unit, ctx))
        else {
            return Err(BindError::internal(format!(
                "no stage can bind {} ({})",
                unit.name(),
                unit.symbol
            )));
        };

        tracing::trace!(target: "dlbind::bind", member = unit.name(), stage = stage.name(), "stage applied");
        fired.push(stage.name());

        match stage.generate(unit, ctx)? {
            Generated::Terminal(binding) => Ok(binding),
            Generated::Expanded { units, compose } => {
                let mut excluded = excluded.to_vec();
                excluded.push(index);
                let bindings = units
                    .into_iter()
                    .map(|unit| self.consume(unit, ctx, &excluded, fired))
                    .collect::<Result<Vec<_>>>()?;
                compose(bindings)
            }
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::standard()
    }
}
