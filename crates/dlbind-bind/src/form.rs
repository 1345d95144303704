//! Implementation forms: the shared, reportable shape of a binding.
//!
//! Instances of the same contract bound to the same library with the same
//! options share one form. A form records, per member, the resolved symbol
//! and the stages that produced its binding.

use std::collections::HashMap;
use std::sync::Arc;

use dlbind_core::ImplementationOptions;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// How one member was bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MemberPlan {
    pub name: String,
    /// Symbol as `library!name` when redirected to another library.
    pub symbol: String,
    pub stages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ImplementationForm {
    pub id: Uuid,
    pub contract: String,
    pub fingerprint: String,
    pub library: String,
    pub options: u32,
    pub option_names: Vec<String>,
    pub members: Vec<MemberPlan>,
}

impl ImplementationForm {
    pub fn new(
        contract: &str,
        fingerprint: &str,
        library: &str,
        options: ImplementationOptions,
        members: Vec<MemberPlan>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            contract: contract.to_string(),
            fingerprint: fingerprint.to_string(),
            library: library.to_string(),
            options: options.bits(),
            option_names: options.names().into_iter().map(String::from).collect(),
            members,
        }
    }

    pub fn key(&self) -> FormKey {
        FormKey {
            fingerprint: self.fingerprint.clone(),
            library: self.library.clone(),
            options: self.options,
        }
    }

    pub fn member(&self, name: &str) -> Option<&MemberPlan> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Pretty-printed JSON report.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Identity of a form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FormKey {
    pub fingerprint: String,
    pub library: String,
    pub options: u32,
}

/// Forms keyed by contract fingerprint, library, and options.
#[derive(Debug, Default)]
pub struct FormRegistry {
    forms: Mutex<HashMap<FormKey, Arc<ImplementationForm>>>,
}

static GLOBAL: Lazy<FormRegistry> = Lazy::new(FormRegistry::new);

impl FormRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static FormRegistry {
        &GLOBAL
    }

    /// The registered form for `form`'s key, registering `form` if there is none.
    pub fn intern(&self, form: ImplementationForm) -> Arc<ImplementationForm> {
        let mut forms = self.forms.lock();
        let key = form.key();
        if let Some(existing) = forms.get(&key) {
            return Arc::clone(existing);
        }
        tracing::debug!(
            target: "dlbind::bind",
            contract = form.contract.as_str(),
            library = form.library.as_str(),
            options = form.options,
            "registered implementation form"
        );
        let form = Arc::new(form);
        forms.insert(key, Arc::clone(&form));
        form
    }

    pub fn get(&self, key: &FormKey) -> Option<Arc<ImplementationForm>> {
        self.forms.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.forms.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
