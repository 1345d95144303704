//! Dynamic argument and return values.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ContractError, Result};
use crate::types::TypeDesc;

/// A value passed to or returned from a bound member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Value {
    Unit,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    /// A native address (pointer or function pointer).
    Ptr(usize),
    /// A string; `None` crosses as a null pointer.
    Text(Option<String>),
    /// An optional value type; `None` crosses as a null pointer.
    Nullable(Option<Box<Value>>),
    /// Elements copied out of a returned native array.
    Collection(Vec<Value>),
    /// A function pointer together with whatever keeps it callable.
    #[serde(skip)]
    Callback(Callback),
}

/// A native-callable function handed to a bound method.
///
/// `owner` is the state the function depends on, such as a closure's
/// environment or a generated trampoline. The binding keeps a clone of the
/// callback alive for as long as the method's delegate lifetime demands.
#[derive(Clone)]
pub struct Callback {
    address: usize,
    owner: Option<Arc<dyn Any + Send + Sync>>,
}

impl Callback {
    /// A plain function with no state.
    pub fn function(address: usize) -> Self {
        Self { address, owner: None }
    }

    pub fn with_owner(address: usize, owner: Arc<dyn Any + Send + Sync>) -> Self {
        Self { address, owner: Some(owner) }
    }

    pub fn address(&self) -> usize {
        self.address
    }

    pub fn owner(&self) -> Option<&Arc<dyn Any + Send + Sync>> {
        self.owner.as_ref()
    }

    fn owner_ptr(&self) -> Option<*const ()> {
        self.owner.as_ref().map(|o| Arc::as_ptr(o) as *const ())
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address && self.owner_ptr() == other.owner_ptr()
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("address", &format_args!("{:#x}", self.address))
            .field("owned", &self.owner.is_some())
            .finish()
    }
}

impl Value {
    /// Name of the variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Bool(_) => "bool",
            Self::I8(_) => "i8",
            Self::I16(_) => "i16",
            Self::I32(_) => "i32",
            Self::I64(_) => "i64",
            Self::U8(_) => "u8",
            Self::U16(_) => "u16",
            Self::U32(_) => "u32",
            Self::U64(_) => "u64",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
            Self::Ptr(_) => "pointer",
            Self::Text(_) => "text",
            Self::Nullable(_) => "nullable",
            Self::Collection(_) => "collection",
            Self::Callback(_) => "callback",
        }
    }

    /// The zero value of a primitive type.
    pub fn zero(ty: &TypeDesc) -> Value {
        match ty.underlying() {
            TypeDesc::Bool => Self::Bool(false),
            TypeDesc::I8 => Self::I8(0),
            TypeDesc::I16 => Self::I16(0),
            TypeDesc::I32 => Self::I32(0),
            TypeDesc::I64 => Self::I64(0),
            TypeDesc::U8 => Self::U8(0),
            TypeDesc::U16 => Self::U16(0),
            TypeDesc::U32 => Self::U32(0),
            TypeDesc::U64 => Self::U64(0),
            TypeDesc::F32 => Self::F32(0.0),
            TypeDesc::F64 => Self::F64(0.0),
            TypeDesc::Pointer | TypeDesc::FunctionPointer => Self::Ptr(0),
            TypeDesc::Text => Self::Text(None),
            TypeDesc::Nullable(_) => Self::Nullable(None),
            TypeDesc::Collection(_) => Self::Collection(Vec::new()),
            _ => Self::Unit,
        }
    }

    /// Integer content widened to `i64`, including bools and pointers.
    pub fn as_i64(&self) -> Option<i64> {
        Some(match *self {
            Self::Bool(b) => b as i64,
            Self::I8(v) => v as i64,
            Self::I16(v) => v as i64,
            Self::I32(v) => v as i64,
            Self::I64(v) => v,
            Self::U8(v) => v as i64,
            Self::U16(v) => v as i64,
            Self::U32(v) => v as i64,
            Self::U64(v) => v as i64,
            Self::Ptr(v) => v as i64,
            _ => return None,
        })
    }

    /// Floating content widened to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::F32(v) => Some(v as f64),
            Self::F64(v) => Some(v),
            _ => None,
        }
    }

    /// Whether this is a null text, null nullable, or zero pointer.
    pub fn is_null(&self) -> bool {
        matches!(
            self,
            Self::Ptr(0) | Self::Text(None) | Self::Nullable(None)
        )
    }

    /// Whether the value can be passed where `ty` is declared.
    pub fn conforms_to(&self, ty: &TypeDesc) -> bool {
        match (ty.underlying(), self) {
            (TypeDesc::Void, Self::Unit) => true,
            (TypeDesc::Bool, Self::Bool(_)) => true,
            (TypeDesc::I8, Self::I8(_))
            | (TypeDesc::I16, Self::I16(_))
            | (TypeDesc::I32, Self::I32(_))
            | (TypeDesc::I64, Self::I64(_))
            | (TypeDesc::U8, Self::U8(_))
            | (TypeDesc::U16, Self::U16(_))
            | (TypeDesc::U32, Self::U32(_))
            | (TypeDesc::U64, Self::U64(_))
            | (TypeDesc::F32, Self::F32(_))
            | (TypeDesc::F64, Self::F64(_)) => true,
            (TypeDesc::Pointer | TypeDesc::FunctionPointer, Self::Ptr(_)) => true,
            (TypeDesc::FunctionPointer, Self::Callback(_)) => true,
            (TypeDesc::Text, Self::Text(_)) => true,
            (TypeDesc::Nullable(inner), Self::Nullable(v)) => {
                v.as_deref().map_or(true, |v| v.conforms_to(inner))
            }
            (TypeDesc::Collection(inner), Self::Collection(items)) => {
                items.iter().all(|v| v.conforms_to(inner))
            }
            _ => false,
        }
    }

    /// Fail with `TypeMismatch` unless the value conforms to `ty`.
    pub fn expect_type(&self, ty: &TypeDesc) -> Result<()> {
        if self.conforms_to(ty) {
            Ok(())
        } else {
            Err(ContractError::TypeMismatch {
                expected: ty.to_string(),
                found: self.kind().to_string(),
            })
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => write!(f, "()"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::I8(v) => write!(f, "{v}"),
            Self::I16(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::U8(v) => write!(f, "{v}"),
            Self::U16(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v}"),
            Self::Ptr(v) => write!(f, "{v:#x}"),
            Self::Callback(cb) => write!(f, "callback {:#x}", cb.address),
            Self::Text(Some(s)) => write!(f, "{s:?}"),
            Self::Text(None) | Self::Nullable(None) => write!(f, "null"),
            Self::Nullable(Some(v)) => write!(f, "{v}"),
            Self::Collection(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Self::$variant(v)
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    usize => Ptr,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(Some(v.to_string()))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(Some(v))
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Self::Unit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn conversions() {
        assert_eq!(Value::from(5i32), Value::I32(5));
        assert_eq!(Value::from("abc"), Value::Text(Some("abc".into())));
        assert_eq!(Value::from(()), Value::Unit);
    }

    #[test]
    fn widening() {
        assert_eq!(Value::U8(200).as_i64(), Some(200));
        assert_eq!(Value::Bool(true).as_i64(), Some(1));
        assert_eq!(Value::F32(1.5).as_f64(), Some(1.5));
        assert_eq!(Value::Text(None).as_i64(), None);
    }

    #[test]
    fn conformance() {
        let nullable = TypeDesc::nullable(TypeDesc::I32);
        assert!(Value::Nullable(None).conforms_to(&nullable));
        assert!(Value::Nullable(Some(Box::new(Value::I32(3)))).conforms_to(&nullable));
        assert!(!Value::Nullable(Some(Box::new(Value::I64(3)))).conforms_to(&nullable));
        assert!(Value::I32(1).conforms_to(&TypeDesc::enumeration("E", TypeDesc::I32)));
        assert!(Value::I32(1).expect_type(&TypeDesc::F64).is_err());
        let callback = Value::Callback(Callback::function(0x10));
        assert!(callback.conforms_to(&TypeDesc::FunctionPointer));
        assert!(!callback.conforms_to(&TypeDesc::Pointer));
    }

    #[test]
    fn callbacks_compare_by_address_and_owner() {
        let owner: Arc<dyn Any + Send + Sync> = Arc::new(3u32);
        let a = Callback::with_owner(0x10, Arc::clone(&owner));
        assert_eq!(a, a.clone());
        assert_ne!(a, Callback::with_owner(0x10, Arc::new(3u32)));
        assert_ne!(a, Callback::function(0x10));
        assert_eq!(Callback::function(0x10), Callback::function(0x10));
        assert_eq!(Value::Callback(a).kind(), "callback");
    }

    #[test]
    fn zero_values() {
        assert_eq!(Value::zero(&TypeDesc::U16), Value::U16(0));
        assert!(Value::zero(&TypeDesc::Text).is_null());
        assert!(Value::zero(&TypeDesc::Pointer).is_null());
    }

    fn zeroable() -> impl Strategy<Value = TypeDesc> {
        let leaf = prop::sample::select(vec![
            TypeDesc::Bool,
            TypeDesc::I8,
            TypeDesc::I16,
            TypeDesc::I32,
            TypeDesc::I64,
            TypeDesc::U8,
            TypeDesc::U16,
            TypeDesc::U32,
            TypeDesc::U64,
            TypeDesc::F32,
            TypeDesc::F64,
            TypeDesc::Pointer,
            TypeDesc::FunctionPointer,
            TypeDesc::Text,
        ]);
        leaf.prop_flat_map(|ty| {
            prop_oneof![
                Just(ty.clone()),
                Just(TypeDesc::nullable(ty.clone())),
                Just(TypeDesc::collection(ty.clone())),
                Just(TypeDesc::enumeration("E", ty)),
            ]
        })
    }

    proptest! {
        #[test]
        fn zero_values_conform_to_their_type(ty in zeroable()) {
            prop_assert!(Value::zero(&ty).conforms_to(&ty), "zero of {} is {:?}", ty, Value::zero(&ty));
        }
    }
}
