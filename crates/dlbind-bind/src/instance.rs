//! Bound library instances.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dlbind_core::{Contract, ImplementationOptions, Member, MethodDeclaration, TypeDesc, Value};
use uuid::Uuid;

use crate::builder::NativeLibraryBuilder;
use crate::error::{BindError, Result};
use crate::form::ImplementationForm;
use crate::generics::{GenericCache, GenericStatistics};
use crate::library::LibraryState;
use crate::unit::{Binding, Invocation, Invoker};

/// One contract bound to one library under one option set.
///
/// Members are called by name through [`invoke`](Self::invoke) and
/// [`get`](Self::get)/[`set`](Self::set). Library handles are released when
/// the instance is disposed (with disposal checks enabled) or dropped.
pub struct BoundInstance {
    id: Uuid,
    contract: Arc<Contract>,
    form: Arc<ImplementationForm>,
    library: Arc<LibraryState>,
    requested_library: String,
    bindings: Vec<Binding>,
    methods: HashMap<String, Vec<usize>>,
    properties: HashMap<String, usize>,
    generics: GenericCache,
    builder: NativeLibraryBuilder,
}

impl BoundInstance {
    pub(crate) fn new(
        contract: Arc<Contract>,
        form: Arc<ImplementationForm>,
        library: Arc<LibraryState>,
        requested_library: &str,
        bindings: Vec<Binding>,
        builder: NativeLibraryBuilder,
    ) -> Self {
        let mut methods: HashMap<String, Vec<usize>> = HashMap::new();
        let mut properties = HashMap::new();
        for (index, member) in contract.members.iter().enumerate() {
            match member {
                Member::Method(m) => methods.entry(m.name.clone()).or_default().push(index),
                Member::Property(p) => {
                    properties.insert(p.name.clone(), index);
                }
            }
        }
        Self {
            id: Uuid::new_v4(),
            contract,
            form,
            library,
            requested_library: requested_library.to_string(),
            bindings,
            methods,
            properties,
            generics: GenericCache::new(),
            builder,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn contract(&self) -> &Contract {
        &self.contract
    }

    pub fn form(&self) -> &Arc<ImplementationForm> {
        &self.form
    }

    pub fn options(&self) -> ImplementationOptions {
        self.builder.options()
    }

    /// Library the instance loaded, after dllmap mapping.
    pub fn library_name(&self) -> &str {
        self.library.library()
    }

    pub fn is_disposed(&self) -> bool {
        self.library.is_disposed()
    }

    /// Call a method by name. By-reference arguments are updated in place.
    ///
    /// Overloads are told apart by argument count and types.
    pub fn invoke(&self, name: &str, args: &mut [Value]) -> Result<Value> {
        let index = self.overload(name, args)?;
        self.invoke_index(index, args)
    }

    /// Call a method by name with by-value arguments.
    pub fn call(&self, name: &str, mut args: Vec<Value>) -> Result<Value> {
        self.invoke(name, &mut args)
    }

    /// Call an open generic method closed over `type_args`.
    pub fn invoke_generic(&self, name: &str, type_args: &[TypeDesc], args: &mut [Value]) -> Result<Value> {
        let index = self.overload(name, args)?;
        let invoker = self.method_binding(index)?;
        invoker(&Invocation::new(self).with_type_args(type_args), args)
    }

    /// Call the method at member index `index`.
    pub fn invoke_index(&self, index: usize, args: &mut [Value]) -> Result<Value> {
        let invoker = self.method_binding(index)?;
        invoker(&Invocation::new(self), args)
    }

    /// Read a property.
    pub fn get(&self, name: &str) -> Result<Value> {
        let (getter, _) = self.property_binding(name)?;
        let getter = getter.ok_or_else(|| BindError::mismatch(name, "property has no getter"))?;
        getter(&Invocation::new(self), &mut [])
    }

    /// Write a property.
    pub fn set(&self, name: &str, value: Value) -> Result<()> {
        let (_, setter) = self.property_binding(name)?;
        let setter = setter.ok_or_else(|| BindError::mismatch(name, "property has no setter"))?;
        setter(&Invocation::new(self), &mut [value])?;
        Ok(())
    }

    /// Release the library.
    ///
    /// Only instances bound with `GENERATE_DISPOSAL_CHECKS` can be disposed;
    /// for others this does nothing. Disposing twice is a no-op. Guarded
    /// calls made afterwards fail with [`BindError::Disposed`].
    pub fn dispose(&self) {
        if !self
            .options()
            .contains(ImplementationOptions::GENERATE_DISPOSAL_CHECKS)
        {
            tracing::debug!(target: "dlbind::bind", id = %self.id, "disposal checks disabled, dispose ignored");
            return;
        }
        if self.library.dispose() {
            self.generics.dispose();
            tracing::info!(
                target: "dlbind::bind",
                id = %self.id,
                library = self.library.library(),
                "disposed library instance"
            );
        }
    }

    /// Callbacks held for a persistent delegate lifetime.
    pub fn retained_callbacks(&self) -> usize {
        self.library.retained_callbacks()
    }

    pub fn generic_statistics(&self) -> GenericStatistics {
        self.generics.statistics()
    }

    pub(crate) fn generics(&self) -> &GenericCache {
        &self.generics
    }

    /// Bind a one-member contract holding the closed method `closed`.
    pub(crate) fn specialize(&self, closed: &MethodDeclaration) -> Result<BoundInstance> {
        let args: Vec<String> = closed.generic_args.iter().map(ToString::to_string).collect();
        let mut contract = Contract::new(format!(
            "{}.{}<{}>",
            self.contract.name,
            closed.name,
            args.join(", ")
        ));
        contract.default_convention = self.contract.default_convention;
        contract.naming = self.contract.naming.clone();
        contract.members.push(Member::Method(closed.clone()));
        self.builder
            .activate_shared(Arc::new(contract), &self.requested_library)
    }

    fn overload(&self, name: &str, args: &[Value]) -> Result<usize> {
        let candidates = self
            .methods
            .get(name)
            .ok_or_else(|| BindError::MethodNotFound {
                name: name.to_string(),
            })?;
        if let [only] = candidates.as_slice() {
            return Ok(*only);
        }
        candidates
            .iter()
            .copied()
            .find(|&index| self.accepts(index, args))
            .ok_or_else(|| BindError::mismatch(name, "no overload accepts these arguments"))
    }

    fn accepts(&self, index: usize, args: &[Value]) -> bool {
        let Some(Member::Method(method)) = self.contract.member(index) else {
            return false;
        };
        method.parameters.len() == args.len()
            && method
                .parameters
                .iter()
                .zip(args)
                .all(|(p, arg)| p.ty.contains_generic() || arg.conforms_to(&p.ty))
    }

    fn method_binding(&self, index: usize) -> Result<&Invoker> {
        match self.bindings.get(index) {
            Some(Binding::Method(invoker)) => Ok(invoker),
            _ => Err(BindError::MethodNotFound {
                name: self
                    .contract
                    .member(index)
                    .map_or_else(|| format!("#{index}"), |m| m.name().to_string()),
            }),
        }
    }

    fn property_binding(&self, name: &str) -> Result<(Option<&Invoker>, Option<&Invoker>)> {
        let binding = self
            .properties
            .get(name)
            .and_then(|&index| self.bindings.get(index));
        match binding {
            Some(Binding::Property { getter, setter }) => Ok((getter.as_ref(), setter.as_ref())),
            _ => Err(BindError::FieldNotFound {
                name: name.to_string(),
            }),
        }
    }
}

impl fmt::Debug for BoundInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundInstance")
            .field("id", &self.id)
            .field("contract", &self.contract.name)
            .field("library", &self.library)
            .field("members", &self.bindings.len())
            .field("generics", &self.generics)
            .finish()
    }
}
