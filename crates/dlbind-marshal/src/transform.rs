//! Type transformers for rich types and their registry.
//!
//! A transformer lowers a rich [`Value`] (bool, text, nullable) to a
//! primitive one before a native call and raises a native return value back.
//! Memory produced while lowering is adopted by the call's [`CallFrame`]
//! unless the free policy hands it to the callee.

use std::collections::HashMap;
use std::ffi::CStr;
use std::fmt;
use std::sync::Arc;

use dlbind_core::{BoolEncoding, MarshalInfo, StringEncoding, TypeDesc, Value};
use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::abi::NativeType;
use crate::error::{MarshalError, Result};
use crate::memory::{alloc_bytes, free_native, read_scalar, write_scalar, CallFrame};

/// Converts one rich type to and from its native representation.
pub trait TypeTransformer: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Native type the value crosses as.
    fn native_type(&self, marshal: &MarshalInfo) -> NativeType;

    /// Lower a caller value for passing to native code.
    fn lower(&self, value: &Value, marshal: &MarshalInfo, frame: &mut CallFrame) -> Result<Value>;

    /// Raise a native value returned by native code.
    fn raise(&self, native: &Value, marshal: &MarshalInfo) -> Result<Value>;
}

/// Shared handle to a registered transformer.
pub type SharedTransformer = Arc<dyn TypeTransformer>;

fn bool_native(encoding: BoolEncoding) -> NativeType {
    match encoding {
        BoolEncoding::U1 => NativeType::U8,
        BoolEncoding::I1 => NativeType::I8,
        BoolEncoding::I2 | BoolEncoding::VariantBool => NativeType::I16,
        BoolEncoding::U2 => NativeType::U16,
        BoolEncoding::I4 | BoolEncoding::Bool => NativeType::I32,
        BoolEncoding::U4 => NativeType::U32,
        BoolEncoding::I8 => NativeType::I64,
        BoolEncoding::U8 => NativeType::U64,
    }
}

fn expect_pointer(native: &Value) -> Result<usize> {
    match native {
        Value::Ptr(p) => Ok(*p),
        other => Err(MarshalError::ArgumentMismatch {
            detail: format!("expected a native pointer, found {}", other.kind()),
        }),
    }
}

/// Booleans as fixed-width integers.
#[derive(Debug, Default, Clone, Copy)]
pub struct BooleanTransformer;

impl BooleanTransformer {
    fn encode(value: bool, encoding: BoolEncoding) -> Value {
        let raw = if value { encoding.true_value() } else { 0 };
        bool_native(encoding).from_int_bits(raw)
    }

    fn decode(native: &Value) -> Result<bool> {
        native
            .as_i64()
            .map(|raw| raw != 0)
            .ok_or_else(|| MarshalError::ArgumentMismatch {
                detail: format!("expected an integer boolean, found {}", native.kind()),
            })
    }
}

impl TypeTransformer for BooleanTransformer {
    fn name(&self) -> &'static str {
        "bool"
    }

    fn native_type(&self, marshal: &MarshalInfo) -> NativeType {
        bool_native(marshal.bool_encoding)
    }

    fn lower(&self, value: &Value, marshal: &MarshalInfo, _frame: &mut CallFrame) -> Result<Value> {
        match value {
            Value::Bool(b) => Ok(Self::encode(*b, marshal.bool_encoding)),
            other => Err(MarshalError::ArgumentMismatch {
                detail: format!("expected bool, found {}", other.kind()),
            }),
        }
    }

    fn raise(&self, native: &Value, _marshal: &MarshalInfo) -> Result<Value> {
        Self::decode(native).map(Value::Bool)
    }
}

/// Strings as pointers to encoded, terminated character data.
#[derive(Debug, Default, Clone, Copy)]
pub struct StringTransformer;

const BSTR_PREFIX: usize = std::mem::size_of::<u32>();

impl StringTransformer {
    /// Concrete encoding on the host.
    pub fn effective_encoding(encoding: StringEncoding) -> StringEncoding {
        match encoding {
            StringEncoding::Auto if cfg!(windows) => StringEncoding::Utf16,
            StringEncoding::Auto => StringEncoding::Utf8,
            other => other,
        }
    }

    /// Encoded bytes and the offset of the first character within them.
    fn encode(text: &str, encoding: StringEncoding) -> Result<(Vec<u8>, usize)> {
        if text.contains('\0') {
            return Err(MarshalError::ArgumentMismatch {
                detail: "string contains an interior NUL".to_string(),
            });
        }
        Ok(match Self::effective_encoding(encoding) {
            StringEncoding::Utf16 => {
                let mut bytes: Vec<u8> = text.encode_utf16().flat_map(u16::to_ne_bytes).collect();
                bytes.extend_from_slice(&0u16.to_ne_bytes());
                (bytes, 0)
            }
            StringEncoding::BStr => {
                let units: Vec<u8> = text.encode_utf16().flat_map(u16::to_ne_bytes).collect();
                let mut bytes = (units.len() as u32).to_ne_bytes().to_vec();
                bytes.extend_from_slice(&units);
                bytes.extend_from_slice(&0u16.to_ne_bytes());
                (bytes, BSTR_PREFIX)
            }
            _ => {
                let mut bytes = text.as_bytes().to_vec();
                bytes.push(0);
                (bytes, 0)
            }
        })
    }

    /// Decode the string at `address`.
    ///
    /// # Safety
    ///
    /// `address` must point to a terminated string in `encoding`.
    unsafe fn decode(address: usize, encoding: StringEncoding) -> String {
        match Self::effective_encoding(encoding) {
            StringEncoding::Utf16 => {
                let p = address as *const u16;
                let mut len = 0;
                while p.add(len).read_unaligned() != 0 {
                    len += 1;
                }
                let units: Vec<u16> = (0..len).map(|i| p.add(i).read_unaligned()).collect();
                String::from_utf16_lossy(&units)
            }
            StringEncoding::BStr => {
                let bytes = ((address - BSTR_PREFIX) as *const u32).read_unaligned() as usize;
                let p = address as *const u16;
                let units: Vec<u16> = (0..bytes / 2).map(|i| p.add(i).read_unaligned()).collect();
                String::from_utf16_lossy(&units)
            }
            _ => CStr::from_ptr(address as *const std::ffi::c_char)
                .to_string_lossy()
                .into_owned(),
        }
    }
}

impl TypeTransformer for StringTransformer {
    fn name(&self) -> &'static str {
        "text"
    }

    fn native_type(&self, _marshal: &MarshalInfo) -> NativeType {
        NativeType::Pointer
    }

    fn lower(&self, value: &Value, marshal: &MarshalInfo, frame: &mut CallFrame) -> Result<Value> {
        let text = match value {
            Value::Text(None) => return Ok(Value::Ptr(0)),
            Value::Text(Some(text)) => text,
            other => {
                return Err(MarshalError::ArgumentMismatch {
                    detail: format!("expected text, found {}", other.kind()),
                })
            }
        };
        let (bytes, offset) = Self::encode(text, marshal.string_encoding)?;
        let base = alloc_bytes(&bytes)?;
        if marshal.frees_parameter() {
            frame.adopt(base);
        }
        Ok(Value::Ptr(base + offset))
    }

    fn raise(&self, native: &Value, marshal: &MarshalInfo) -> Result<Value> {
        let address = expect_pointer(native)?;
        if address == 0 {
            return Ok(Value::Text(None));
        }
        // SAFETY: a non-null text return points to a string in the declared encoding.
        let text = unsafe { Self::decode(address, marshal.string_encoding) };
        if marshal.frees_return() {
            let base = match Self::effective_encoding(marshal.string_encoding) {
                StringEncoding::BStr => address - BSTR_PREFIX,
                _ => address,
            };
            // SAFETY: caller-frees returns come from the C allocator.
            unsafe { free_native(base) };
        }
        Ok(Value::Text(Some(text)))
    }
}

/// Optional value types as pointers to the value, null when absent.
#[derive(Debug, Clone)]
pub struct NullableTransformer {
    inner: TypeDesc,
}

impl NullableTransformer {
    /// Transformer for `Nullable(inner)`; `inner` must be a value type.
    pub fn new(inner: TypeDesc) -> Result<Self> {
        if !inner.is_value_type() {
            return Err(MarshalError::unsupported(TypeDesc::nullable(inner)));
        }
        Ok(Self { inner })
    }

    pub fn inner(&self) -> &TypeDesc {
        &self.inner
    }

    /// Native type of the pointed-to payload.
    pub fn payload_type(&self, marshal: &MarshalInfo) -> Result<NativeType> {
        match self.inner {
            TypeDesc::Bool => Ok(bool_native(marshal.bool_encoding)),
            ref other => NativeType::of(other),
        }
    }

    /// Lower a present payload to its native scalar.
    pub fn lower_payload(&self, value: &Value, marshal: &MarshalInfo) -> Result<Value> {
        value.expect_type(&self.inner)?;
        match value {
            Value::Bool(b) => Ok(BooleanTransformer::encode(*b, marshal.bool_encoding)),
            other => Ok(other.clone()),
        }
    }

    /// Raise a native payload scalar.
    pub fn raise_payload(&self, native: Value) -> Result<Value> {
        match self.inner {
            TypeDesc::Bool => BooleanTransformer::decode(&native).map(Value::Bool),
            _ => Ok(native),
        }
    }
}

impl TypeTransformer for NullableTransformer {
    fn name(&self) -> &'static str {
        "nullable"
    }

    fn native_type(&self, _marshal: &MarshalInfo) -> NativeType {
        NativeType::Pointer
    }

    fn lower(&self, value: &Value, marshal: &MarshalInfo, frame: &mut CallFrame) -> Result<Value> {
        let payload = match value {
            Value::Nullable(None) => return Ok(Value::Ptr(0)),
            Value::Nullable(Some(payload)) => payload,
            other => {
                return Err(MarshalError::ArgumentMismatch {
                    detail: format!("expected nullable, found {}", other.kind()),
                })
            }
        };
        let ty = self.payload_type(marshal)?;
        let native = self.lower_payload(payload, marshal)?;
        let address = alloc_bytes(&vec![0u8; ty.size()])?;
        // SAFETY: the block was just allocated with ty.size() bytes.
        if let Err(err) = unsafe { write_scalar(address, ty, &native) } {
            unsafe { free_native(address) };
            return Err(err);
        }
        if marshal.frees_parameter() {
            frame.adopt(address);
        }
        Ok(Value::Ptr(address))
    }

    fn raise(&self, native: &Value, marshal: &MarshalInfo) -> Result<Value> {
        let address = expect_pointer(native)?;
        if address == 0 {
            return Ok(Value::Nullable(None));
        }
        let ty = self.payload_type(marshal)?;
        // SAFETY: a non-null nullable return points to one payload scalar.
        let raw = unsafe { read_scalar(address, ty)? };
        if marshal.frees_return() {
            // SAFETY: caller-frees returns come from the C allocator.
            unsafe { free_native(address) };
        }
        let payload = self.raise_payload(raw)?;
        Ok(Value::Nullable(Some(Box::new(payload))))
    }
}

/// Transformers keyed by the rich type they handle.
///
/// Registration is first-write-wins. Text, bool, and nullable value types
/// resolve on first lookup without registration; every other type must be
/// registered explicitly.
#[derive(Debug, Default)]
pub struct TransformerRegistry {
    transformers: RwLock<HashMap<TypeDesc, SharedTransformer>>,
}

static GLOBAL: Lazy<TransformerRegistry> = Lazy::new(TransformerRegistry::new);

impl TransformerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static TransformerRegistry {
        &GLOBAL
    }

    /// Register a transformer. Returns `false` if `ty` already has one.
    pub fn register(&self, ty: TypeDesc, transformer: SharedTransformer) -> bool {
        let mut transformers = self.transformers.write();
        if transformers.contains_key(&ty) {
            return false;
        }
        tracing::debug!(target: "dlbind::transform", %ty, transformer = transformer.name(), "registered transformer");
        transformers.insert(ty, transformer);
        true
    }

    pub fn contains(&self, ty: &TypeDesc) -> bool {
        self.transformers.read().contains_key(ty)
    }

    /// Whether `ty` needs a transformer before crossing the boundary.
    pub fn requires_transform(ty: &TypeDesc) -> bool {
        matches!(ty, TypeDesc::Bool | TypeDesc::Text | TypeDesc::Nullable(_))
    }

    /// Transformer for `ty`; repeated lookups return the same instance.
    pub fn get(&self, ty: &TypeDesc) -> Result<SharedTransformer> {
        if let Some(found) = self.transformers.read().get(ty) {
            return Ok(Arc::clone(found));
        }
        let builtin: SharedTransformer = match ty {
            TypeDesc::Bool => Arc::new(BooleanTransformer),
            TypeDesc::Text => Arc::new(StringTransformer),
            TypeDesc::Nullable(inner) => Arc::new(NullableTransformer::new((**inner).clone())?),
            other => return Err(MarshalError::unsupported(other)),
        };
        let mut transformers = self.transformers.write();
        Ok(Arc::clone(transformers.entry(ty.clone()).or_insert(builtin)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlbind_core::FreePolicy;
    use proptest::prelude::*;

    fn borrowed() -> MarshalInfo {
        MarshalInfo::default().with_free(FreePolicy::Borrowed)
    }

    #[test]
    fn boolean_encodings() {
        let t = BooleanTransformer;
        let mut frame = CallFrame::new();
        let vb = MarshalInfo::default().with_bool(BoolEncoding::VariantBool);
        assert_eq!(t.lower(&Value::Bool(true), &vb, &mut frame).unwrap(), Value::I16(-1));
        assert_eq!(t.lower(&Value::Bool(false), &vb, &mut frame).unwrap(), Value::I16(0));
        let win = MarshalInfo::default().with_bool(BoolEncoding::Bool);
        assert_eq!(t.lower(&Value::Bool(true), &win, &mut frame).unwrap(), Value::I32(1));
        assert_eq!(t.native_type(&MarshalInfo::default()), NativeType::U8);
        assert_eq!(t.raise(&Value::I32(7), &win).unwrap(), Value::Bool(true));
        assert_eq!(t.raise(&Value::U8(0), &win).unwrap(), Value::Bool(false));
    }

    #[test]
    fn string_lowering_is_freed_with_the_frame() {
        let t = StringTransformer;
        let mut frame = CallFrame::new();
        let native = t
            .lower(&Value::from("hello"), &MarshalInfo::default(), &mut frame)
            .unwrap();
        assert_eq!(frame.owned_allocations(), 1);
        let back = t.raise(&native, &borrowed()).unwrap();
        assert_eq!(back, Value::from("hello"));
    }

    #[test]
    fn callee_frees_strings_are_not_adopted() {
        let t = StringTransformer;
        let mut frame = CallFrame::new();
        let info = MarshalInfo::default().with_free(FreePolicy::CalleeFrees);
        let native = t.lower(&Value::from("x"), &info, &mut frame).unwrap();
        assert_eq!(frame.owned_allocations(), 0);
        // Caller frees on the way back.
        let back = t
            .raise(&native, &MarshalInfo::default().with_free(FreePolicy::CallerFrees))
            .unwrap();
        assert_eq!(back, Value::from("x"));
    }

    #[test]
    fn utf16_and_bstr_round_trip() {
        let t = StringTransformer;
        for encoding in [StringEncoding::Utf16, StringEncoding::BStr, StringEncoding::Auto] {
            let info = MarshalInfo::default().with_string(encoding);
            let mut frame = CallFrame::new();
            let native = t.lower(&Value::from("grüß"), &info, &mut frame).unwrap();
            let back = t.raise(&native, &info.clone().with_free(FreePolicy::Borrowed)).unwrap();
            assert_eq!(back, Value::from("grüß"));
        }
    }

    #[test]
    fn null_strings_and_nul_bytes() {
        let t = StringTransformer;
        let mut frame = CallFrame::new();
        let info = MarshalInfo::default();
        assert_eq!(t.lower(&Value::Text(None), &info, &mut frame).unwrap(), Value::Ptr(0));
        assert_eq!(t.raise(&Value::Ptr(0), &info).unwrap(), Value::Text(None));
        assert!(t.lower(&Value::from("a\0b"), &info, &mut frame).is_err());
    }

    #[test]
    fn nullable_round_trip() {
        let t = NullableTransformer::new(TypeDesc::I32).unwrap();
        let mut frame = CallFrame::new();
        let info = MarshalInfo::default();
        let some = Value::Nullable(Some(Box::new(Value::I32(9))));
        let native = t.lower(&some, &info, &mut frame).unwrap();
        assert_ne!(native, Value::Ptr(0));
        assert_eq!(t.raise(&native, &borrowed()).unwrap(), some);
        assert_eq!(t.lower(&Value::Nullable(None), &info, &mut frame).unwrap(), Value::Ptr(0));
        assert_eq!(t.raise(&Value::Ptr(0), &info).unwrap(), Value::Nullable(None));
    }

    #[test]
    fn nullable_bool_uses_encoding() {
        let t = NullableTransformer::new(TypeDesc::Bool).unwrap();
        let info = MarshalInfo::default().with_bool(BoolEncoding::I4);
        assert_eq!(t.payload_type(&info).unwrap(), NativeType::I32);
        assert_eq!(t.lower_payload(&Value::Bool(true), &info).unwrap(), Value::I32(1));
        assert!(NullableTransformer::new(TypeDesc::Text).is_err());
    }

    #[test]
    fn registry_first_write_wins() {
        let registry = TransformerRegistry::new();
        assert!(registry.register(TypeDesc::Text, Arc::new(StringTransformer)));
        assert!(!registry.register(TypeDesc::Text, Arc::new(StringTransformer)));
    }

    #[test]
    fn registry_returns_same_instance() {
        let registry = TransformerRegistry::new();
        let ty = TypeDesc::nullable(TypeDesc::F64);
        let a = registry.get(&ty).unwrap();
        let b = registry.get(&ty).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(registry.contains(&ty));
    }

    #[test]
    fn registry_rejects_unknown_types() {
        let registry = TransformerRegistry::new();
        assert!(matches!(
            registry.get(&TypeDesc::collection(TypeDesc::I32)),
            Err(MarshalError::UnsupportedType { .. })
        ));
        assert!(registry.get(&TypeDesc::nullable(TypeDesc::Text)).is_err());
    }

    #[test]
    fn global_registry_is_shared() {
        let a = TransformerRegistry::global().get(&TypeDesc::Text).unwrap();
        let b = TransformerRegistry::global().get(&TypeDesc::Text).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    fn string_encodings() -> impl Strategy<Value = StringEncoding> {
        prop::sample::select(vec![
            StringEncoding::Ansi,
            StringEncoding::Utf8,
            StringEncoding::Utf16,
            StringEncoding::Auto,
            StringEncoding::BStr,
        ])
    }

    fn bool_encodings() -> impl Strategy<Value = BoolEncoding> {
        prop::sample::select(vec![
            BoolEncoding::U1,
            BoolEncoding::I1,
            BoolEncoding::I2,
            BoolEncoding::U2,
            BoolEncoding::I4,
            BoolEncoding::Bool,
            BoolEncoding::U4,
            BoolEncoding::I8,
            BoolEncoding::U8,
            BoolEncoding::VariantBool,
        ])
    }

    /// A value type and a payload of that type. NaN is left out since it
    /// never compares equal to itself.
    fn payloads() -> impl Strategy<Value = (TypeDesc, Value)> {
        prop_oneof![
            any::<bool>().prop_map(|v| (TypeDesc::Bool, Value::Bool(v))),
            any::<i8>().prop_map(|v| (TypeDesc::I8, Value::I8(v))),
            any::<i16>().prop_map(|v| (TypeDesc::I16, Value::I16(v))),
            any::<i32>().prop_map(|v| (TypeDesc::I32, Value::I32(v))),
            any::<i64>().prop_map(|v| (TypeDesc::I64, Value::I64(v))),
            any::<u8>().prop_map(|v| (TypeDesc::U8, Value::U8(v))),
            any::<u16>().prop_map(|v| (TypeDesc::U16, Value::U16(v))),
            any::<u32>().prop_map(|v| (TypeDesc::U32, Value::U32(v))),
            any::<u64>().prop_map(|v| (TypeDesc::U64, Value::U64(v))),
            any::<f32>()
                .prop_filter("NaN", |v| !v.is_nan())
                .prop_map(|v| (TypeDesc::F32, Value::F32(v))),
            any::<f64>()
                .prop_filter("NaN", |v| !v.is_nan())
                .prop_map(|v| (TypeDesc::F64, Value::F64(v))),
        ]
    }

    proptest! {
        #[test]
        fn text_survives_every_encoding(
            text in proptest::option::of("[^\\x00]{0,24}"),
            encoding in string_encodings(),
        ) {
            let t = StringTransformer;
            let info = MarshalInfo::default().with_string(encoding);
            let value = Value::Text(text);
            let mut frame = CallFrame::new();
            let native = t.lower(&value, &info, &mut frame).unwrap();
            let back = t.raise(&native, &info.clone().with_free(FreePolicy::Borrowed)).unwrap();
            prop_assert_eq!(back, value);
        }

        #[test]
        fn nullable_payloads_survive(
            (inner, payload) in payloads(),
            present in any::<bool>(),
            encoding in bool_encodings(),
        ) {
            let t = NullableTransformer::new(inner).unwrap();
            let info = MarshalInfo::default().with_bool(encoding);
            let value = Value::Nullable(present.then(|| Box::new(payload)));
            let mut frame = CallFrame::new();
            let native = t.lower(&value, &info, &mut frame).unwrap();
            prop_assert_eq!(native == Value::Ptr(0), !present);
            let back = t.raise(&native, &info.clone().with_free(FreePolicy::Borrowed)).unwrap();
            prop_assert_eq!(back, value);
        }

        #[test]
        fn booleans_survive_every_encoding(value in any::<bool>(), encoding in bool_encodings()) {
            let t = BooleanTransformer;
            let info = MarshalInfo::default().with_bool(encoding);
            let mut frame = CallFrame::new();
            let native = t.lower(&Value::Bool(value), &info, &mut frame).unwrap();
            prop_assert_eq!(native.as_i64(), Some(if value { encoding.true_value() } else { 0 }));
            prop_assert_eq!(t.raise(&native, &info).unwrap(), Value::Bool(value));
        }
    }
}
