//! Work units flowing through the pipeline and the bindings they produce.

use std::fmt;
use std::sync::Arc;

use dlbind_core::{MethodDeclaration, PropertyDeclaration, TypeDesc, Value};

use crate::error::Result;
use crate::instance::BoundInstance;

/// Per-call context handed to every invoker.
#[derive(Clone, Copy)]
pub struct Invocation<'a> {
    /// Instance the call was made on.
    pub instance: &'a BoundInstance,
    /// Type arguments of a generic call; empty otherwise.
    pub type_args: &'a [TypeDesc],
}

impl<'a> Invocation<'a> {
    pub fn new(instance: &'a BoundInstance) -> Self {
        Self {
            instance,
            type_args: &[],
        }
    }

    pub fn with_type_args(self, type_args: &'a [TypeDesc]) -> Self {
        Self { type_args, ..self }
    }
}

/// Callable produced for one member or accessor.
///
/// By-reference arguments are updated in place when the call returns.
pub type Invoker = Arc<dyn Fn(&Invocation<'_>, &mut [Value]) -> Result<Value> + Send + Sync>;

/// Box a closure as an [`Invoker`].
pub fn invoker(
    f: impl Fn(&Invocation<'_>, &mut [Value]) -> Result<Value> + Send + Sync + 'static,
) -> Invoker {
    Arc::new(f)
}

/// The final implementation of a contract member.
#[derive(Clone)]
pub enum Binding {
    Method(Invoker),
    Property {
        getter: Option<Invoker>,
        setter: Option<Invoker>,
    },
}

impl Binding {
    pub fn invoker(&self) -> Option<&Invoker> {
        match self {
            Self::Method(invoker) => Some(invoker),
            Self::Property { .. } => None,
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Method(_) => f.write_str("Binding::Method"),
            Self::Property { getter, setter } => f
                .debug_struct("Binding::Property")
                .field("getter", &getter.is_some())
                .field("setter", &setter.is_some())
                .finish(),
        }
    }
}

/// Native symbol a unit binds to, after naming, mangling, and redirection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolTarget {
    /// Library that exports the symbol when it differs from the bound one.
    pub library: Option<String>,
    pub name: String,
}

impl SymbolTarget {
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            library: None,
            name: name.into(),
        }
    }
}

impl fmt::Display for SymbolTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.library {
            Some(library) => write!(f, "{library}!{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// What a work unit describes.
#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    Method(MethodDeclaration),
    Property(PropertyDeclaration),
    /// Read accessor of a property, split off by the property stage.
    Getter(PropertyDeclaration),
    /// Write accessor of a property, split off by the property stage.
    Setter(PropertyDeclaration),
}

impl Definition {
    pub fn name(&self) -> &str {
        match self {
            Self::Method(m) => &m.name,
            Self::Property(p) | Self::Getter(p) | Self::Setter(p) => &p.name,
        }
    }

    pub fn as_method(&self) -> Option<&MethodDeclaration> {
        match self {
            Self::Method(m) => Some(m),
            _ => None,
        }
    }

    /// Whether the unit ends in a callable (method or accessor).
    pub fn is_callable(&self) -> bool {
        !matches!(self, Self::Property(_))
    }
}

/// One member (or a rewritten part of one) awaiting a binding.
#[derive(Debug, Clone)]
pub struct WorkUnit {
    /// Index of the contract member the unit came from.
    pub member_index: usize,
    pub definition: Definition,
    pub symbol: SymbolTarget,
}

impl WorkUnit {
    pub fn new(member_index: usize, definition: Definition, symbol: SymbolTarget) -> Self {
        Self {
            member_index,
            definition,
            symbol,
        }
    }

    /// Same member and symbol, different definition.
    pub fn replace(&self, definition: Definition) -> Self {
        Self {
            member_index: self.member_index,
            definition,
            symbol: self.symbol.clone(),
        }
    }

    /// Replacement method unit.
    pub fn with_method(&self, method: MethodDeclaration) -> Self {
        self.replace(Definition::Method(method))
    }

    pub fn name(&self) -> &str {
        self.definition.name()
    }

    pub fn method(&self) -> Option<&MethodDeclaration> {
        self.definition.as_method()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replacement_keeps_member_and_symbol() {
        let unit = WorkUnit::new(
            3,
            Definition::Method(MethodDeclaration::new("Multiply", TypeDesc::I32)),
            SymbolTarget::local("lib_Multiply"),
        );
        let replaced = unit.with_method(MethodDeclaration::new("Multiply", TypeDesc::I64));
        assert_eq!(replaced.member_index, 3);
        assert_eq!(replaced.symbol, unit.symbol);
        assert_eq!(replaced.method().unwrap().return_type, TypeDesc::I64);
    }

    #[test]
    fn symbol_display_names_foreign_library() {
        assert_eq!(SymbolTarget::local("f").to_string(), "f");
        let foreign = SymbolTarget {
            library: Some("libm.so.6".to_string()),
            name: "cos".to_string(),
        };
        assert_eq!(foreign.to_string(), "libm.so.6!cos");
    }

    #[test]
    fn only_whole_properties_are_not_callable() {
        let p = PropertyDeclaration::new("Counter", TypeDesc::I32);
        assert!(!Definition::Property(p.clone()).is_callable());
        assert!(Definition::Getter(p.clone()).is_callable());
        assert!(Definition::Setter(p).is_callable());
    }
}
