//! Type descriptions used in contract signatures.
//!
//! A `TypeDesc` is either *primitive* (it crosses the native boundary as-is:
//! integers, floats, pointers, enums) or *rich* (it needs a transformer to be
//! lowered to a primitive first: bool, text, nullable values, collections).

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The type of a parameter, return value, or property.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TypeDesc {
    Void,
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    /// Untyped native pointer.
    Pointer,
    /// Address of a native function.
    FunctionPointer,
    /// A string, crossing as a pointer to encoded characters.
    Text,
    /// An optional value type, crossing as a pointer (null when absent).
    Nullable(Box<TypeDesc>),
    /// An enumeration, crossing as its underlying integer.
    Enum { name: String, underlying: Box<TypeDesc> },
    /// A returned native array, sized by a length hint on the declaration.
    Collection(Box<TypeDesc>),
    /// An open generic type parameter.
    Generic(String),
}

impl TypeDesc {
    /// Shorthand for `Nullable(inner)`.
    pub fn nullable(inner: TypeDesc) -> Self {
        Self::Nullable(Box::new(inner))
    }

    /// Shorthand for `Collection(element)`.
    pub fn collection(element: TypeDesc) -> Self {
        Self::Collection(Box::new(element))
    }

    /// Shorthand for an enum over an integer type.
    pub fn enumeration(name: impl Into<String>, underlying: TypeDesc) -> Self {
        Self::Enum {
            name: name.into(),
            underlying: Box::new(underlying),
        }
    }

    /// Shorthand for `Generic(name)`.
    pub fn generic(name: impl Into<String>) -> Self {
        Self::Generic(name.into())
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Self::Void)
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::I8 | Self::I16 | Self::I32 | Self::I64 | Self::U8 | Self::U16 | Self::U32 | Self::U64
        )
    }

    pub fn is_unsigned(&self) -> bool {
        matches!(self, Self::U8 | Self::U16 | Self::U32 | Self::U64)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    pub fn is_pointer_like(&self) -> bool {
        matches!(self, Self::Pointer | Self::FunctionPointer)
    }

    /// Whether the type crosses the native boundary without transformation.
    pub fn is_primitive(&self) -> bool {
        match self {
            Self::Enum { underlying, .. } => underlying.is_integer(),
            other => other.is_integer() || other.is_float() || other.is_pointer_like(),
        }
    }

    /// Whether the type is a plain value type (may be wrapped in `Nullable`).
    pub fn is_value_type(&self) -> bool {
        matches!(self, Self::Bool) || (self.is_primitive() && !self.is_pointer_like())
    }

    /// Whether this is a nullable value type.
    pub fn is_nullable_value(&self) -> bool {
        matches!(self, Self::Nullable(inner) if inner.is_value_type())
    }

    /// Strip an enum down to its underlying integer type.
    pub fn underlying(&self) -> &TypeDesc {
        match self {
            Self::Enum { underlying, .. } => underlying,
            other => other,
        }
    }

    /// Size in bytes when passed natively, given the pointer width.
    ///
    /// `Bool` reports its default one-byte encoding; generic parameters have
    /// no size until closed.
    pub fn native_size(&self, pointer_size: u32) -> Option<u32> {
        match self {
            Self::Void => Some(0),
            Self::Bool | Self::I8 | Self::U8 => Some(1),
            Self::I16 | Self::U16 => Some(2),
            Self::I32 | Self::U32 | Self::F32 => Some(4),
            Self::I64 | Self::U64 | Self::F64 => Some(8),
            Self::Pointer
            | Self::FunctionPointer
            | Self::Text
            | Self::Nullable(_)
            | Self::Collection(_) => Some(pointer_size),
            Self::Enum { underlying, .. } => underlying.native_size(pointer_size),
            Self::Generic(_) => None,
        }
    }

    /// Whether an open generic parameter occurs anywhere in the type.
    pub fn contains_generic(&self) -> bool {
        match self {
            Self::Generic(_) => true,
            Self::Nullable(inner) | Self::Collection(inner) => inner.contains_generic(),
            Self::Enum { underlying, .. } => underlying.contains_generic(),
            _ => false,
        }
    }

    /// Replace generic parameters using `bindings`; unbound names are kept.
    pub fn substitute(&self, bindings: &HashMap<String, TypeDesc>) -> TypeDesc {
        match self {
            Self::Generic(name) => bindings.get(name).cloned().unwrap_or_else(|| self.clone()),
            Self::Nullable(inner) => Self::Nullable(Box::new(inner.substitute(bindings))),
            Self::Collection(inner) => Self::Collection(Box::new(inner.substitute(bindings))),
            Self::Enum { name, underlying } => Self::Enum {
                name: name.clone(),
                underlying: Box::new(underlying.substitute(bindings)),
            },
            other => other.clone(),
        }
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => write!(f, "void"),
            Self::Bool => write!(f, "bool"),
            Self::I8 => write!(f, "i8"),
            Self::I16 => write!(f, "i16"),
            Self::I32 => write!(f, "i32"),
            Self::I64 => write!(f, "i64"),
            Self::U8 => write!(f, "u8"),
            Self::U16 => write!(f, "u16"),
            Self::U32 => write!(f, "u32"),
            Self::U64 => write!(f, "u64"),
            Self::F32 => write!(f, "f32"),
            Self::F64 => write!(f, "f64"),
            Self::Pointer => write!(f, "pointer"),
            Self::FunctionPointer => write!(f, "fn-pointer"),
            Self::Text => write!(f, "text"),
            Self::Nullable(inner) => write!(f, "nullable<{inner}>"),
            Self::Enum { name, underlying } => write!(f, "enum {name}({underlying})"),
            Self::Collection(inner) => write!(f, "collection<{inner}>"),
            Self::Generic(name) => write!(f, "{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_classification() {
        assert!(TypeDesc::I32.is_primitive());
        assert!(TypeDesc::Pointer.is_primitive());
        assert!(TypeDesc::enumeration("Mode", TypeDesc::U8).is_primitive());
        assert!(!TypeDesc::Bool.is_primitive());
        assert!(!TypeDesc::Text.is_primitive());
        assert!(!TypeDesc::nullable(TypeDesc::I32).is_primitive());
    }

    #[test]
    fn value_types() {
        assert!(TypeDesc::Bool.is_value_type());
        assert!(TypeDesc::F64.is_value_type());
        assert!(!TypeDesc::Pointer.is_value_type());
        assert!(TypeDesc::nullable(TypeDesc::I64).is_nullable_value());
        assert!(!TypeDesc::nullable(TypeDesc::Text).is_nullable_value());
    }

    #[test]
    fn sizes_follow_pointer_width() {
        assert_eq!(TypeDesc::Text.native_size(4), Some(4));
        assert_eq!(TypeDesc::Text.native_size(8), Some(8));
        assert_eq!(TypeDesc::enumeration("E", TypeDesc::I16).native_size(8), Some(2));
        assert_eq!(TypeDesc::generic("T").native_size(8), None);
    }

    #[test]
    fn substitute_generics() {
        let mut bindings = HashMap::new();
        bindings.insert("T".to_string(), TypeDesc::F32);
        let open = TypeDesc::nullable(TypeDesc::generic("T"));
        assert!(open.contains_generic());
        let closed = open.substitute(&bindings);
        assert_eq!(closed, TypeDesc::nullable(TypeDesc::F32));
        assert!(!closed.contains_generic());
    }

    #[test]
    fn display() {
        assert_eq!(TypeDesc::nullable(TypeDesc::I32).to_string(), "nullable<i32>");
        assert_eq!(TypeDesc::collection(TypeDesc::F64).to_string(), "collection<f64>");
    }
}
