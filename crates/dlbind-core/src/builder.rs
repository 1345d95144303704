//! Contract construction API.
//!
//! The `ContractBuilder` assembles a [`Contract`] member by member and
//! validates it on `build`. Method and property declarations get chained
//! `with_*` setters so a declaration reads as one expression.
//!
//! # Example
//!
//! ```rust
//! use dlbind_core::builder::ContractBuilder;
//! use dlbind_core::contract::{MethodDeclaration, Parameter};
//! use dlbind_core::types::TypeDesc;
//!
//! let mut builder = ContractBuilder::new("Math");
//! builder.add_function("Multiply", TypeDesc::I32, &[("a", TypeDesc::I32), ("b", TypeDesc::I32)]);
//! builder.add_method(
//!     MethodDeclaration::new("Sqrt", TypeDesc::F64)
//!         .with_param(Parameter::new("x", TypeDesc::F64))
//!         .with_entry_point("sqrt"),
//! );
//!
//! let contract = builder.build().unwrap();
//! assert_eq!(contract.members.len(), 2);
//! ```

use crate::contract::{
    CallingConvention, CollectionLength, Contract, DelegateLifetime, GenericMangling, MarshalInfo,
    Member, MethodDeclaration, Parameter, PropertyDeclaration, SymbolNaming, SymbolTransform,
};
use crate::error::Result;
use crate::types::TypeDesc;

/// A builder for contracts.
#[derive(Debug, Clone)]
pub struct ContractBuilder {
    contract: Contract,
}

impl ContractBuilder {
    /// Create a builder for an empty contract.
    pub fn new(name: &str) -> Self {
        Self {
            contract: Contract::new(name),
        }
    }

    /// Calling convention for methods that do not declare one.
    pub fn default_convention(&mut self, convention: CallingConvention) -> &mut Self {
        self.contract.default_convention = convention;
        self
    }

    /// Symbol naming policy for every member.
    pub fn naming(&mut self, prefix: &str, transform: SymbolTransform) -> &mut Self {
        self.contract.naming = SymbolNaming {
            prefix: prefix.to_string(),
            transform,
        };
        self
    }

    /// Append a method and return its member index.
    pub fn add_method(&mut self, method: MethodDeclaration) -> usize {
        self.contract.members.push(Member::Method(method));
        self.contract.members.len() - 1
    }

    /// Append a by-value method from name/type pairs.
    pub fn add_function(
        &mut self,
        name: &str,
        return_type: TypeDesc,
        params: &[(&str, TypeDesc)],
    ) -> usize {
        let method = params
            .iter()
            .fold(MethodDeclaration::new(name, return_type), |m, (n, ty)| {
                m.with_param(Parameter::new(*n, ty.clone()))
            });
        self.add_method(method)
    }

    /// Append a property and return its member index.
    pub fn add_property(&mut self, property: PropertyDeclaration) -> usize {
        self.contract.members.push(Member::Property(property));
        self.contract.members.len() - 1
    }

    /// Append a read-write property over a global variable of the same name.
    pub fn add_global(&mut self, name: &str, ty: TypeDesc) -> usize {
        self.add_property(PropertyDeclaration::new(name, ty))
    }

    /// Mutable access to a method already added.
    pub fn method_mut(&mut self, index: usize) -> Option<&mut MethodDeclaration> {
        match self.contract.members.get_mut(index) {
            Some(Member::Method(m)) => Some(m),
            _ => None,
        }
    }

    /// Validate and return the contract.
    pub fn build(self) -> Result<Contract> {
        self.contract.validate()?;
        Ok(self.contract)
    }
}

impl MethodDeclaration {
    pub fn with_param(mut self, param: Parameter) -> Self {
        self.parameters.push(param);
        self
    }

    pub fn with_entry_point(mut self, symbol: &str) -> Self {
        self.entry_point = Some(symbol.to_string());
        self
    }

    pub fn with_convention(mut self, convention: CallingConvention) -> Self {
        self.convention = Some(convention);
        self
    }

    pub fn with_return_marshal(mut self, marshal: MarshalInfo) -> Self {
        self.return_marshal = marshal;
        self
    }

    pub fn with_collection_length(mut self, length: CollectionLength) -> Self {
        self.collection_length = Some(length);
        self
    }

    pub fn with_generic_params(mut self, params: &[&str]) -> Self {
        self.generic_params = params.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_generic_mangling(mut self, mangling: GenericMangling) -> Self {
        self.generic_mangling = mangling;
        self
    }

    pub fn with_delegate_lifetime(mut self, lifetime: DelegateLifetime) -> Self {
        self.delegate_lifetime = Some(lifetime);
        self
    }
}

impl PropertyDeclaration {
    pub fn read_only(mut self) -> Self {
        self.setter = false;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.getter = false;
        self
    }

    pub fn with_entry_point(mut self, symbol: &str) -> Self {
        self.entry_point = Some(symbol.to_string());
        self
    }

    pub fn with_setter_entry_point(mut self, symbol: &str) -> Self {
        self.setter_entry_point = Some(symbol.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::Passing;
    use crate::error::ContractError;

    #[test]
    fn build_simple_contract() {
        let mut builder = ContractBuilder::new("Math");
        builder.default_convention(CallingConvention::StdCall);
        let idx = builder.add_function("Multiply", TypeDesc::I32, &[("a", TypeDesc::I32), ("b", TypeDesc::I32)]);
        assert_eq!(idx, 0);
        let contract = builder.build().unwrap();
        let method = contract.methods().next().unwrap();
        assert_eq!(method.parameters.len(), 2);
        assert_eq!(
            method.convention_or(contract.default_convention),
            CallingConvention::StdCall
        );
    }

    #[test]
    fn build_rejects_duplicates() {
        let mut builder = ContractBuilder::new("Math");
        builder.add_function("Abs", TypeDesc::I32, &[("x", TypeDesc::I32)]);
        builder.add_function("Abs", TypeDesc::I64, &[("x", TypeDesc::I32)]);
        assert!(matches!(
            builder.build(),
            Err(ContractError::DuplicateSignature { .. })
        ));
    }

    #[test]
    fn method_mut_edits_in_place() {
        let mut builder = ContractBuilder::new("Math");
        let idx = builder.add_function("Abs", TypeDesc::I32, &[("x", TypeDesc::I32)]);
        let global = builder.add_global("Counter", TypeDesc::I32);
        builder.method_mut(idx).unwrap().entry_point = Some("abs".into());
        assert!(builder.method_mut(global).is_none());
        let contract = builder.build().unwrap();
        assert_eq!(contract.methods().next().unwrap().entry_name(), "abs");
    }

    #[test]
    fn fluent_declarations() {
        let method = MethodDeclaration::new("Fill", TypeDesc::Void)
            .with_param(
                Parameter::new("value", TypeDesc::nullable(TypeDesc::I32)).passing(Passing::Ref),
            )
            .with_generic_params(&["T"])
            .with_generic_mangling(GenericMangling::Simple);
        assert_eq!(method.optional_by_ref_indices(), vec![0]);
        assert!(method.is_open_generic());

        let property = PropertyDeclaration::new("Mode", TypeDesc::U8)
            .read_only()
            .with_entry_point("g_mode");
        assert!(property.getter && !property.setter);
        assert_eq!(property.entry_name(), "g_mode");
    }
}
