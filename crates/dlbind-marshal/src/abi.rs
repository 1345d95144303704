//! Native scalar types and the call thunk.
//!
//! A call is made by reinterpreting a symbol address as a fixed-shape
//! `extern "C"` function and spreading the arguments over it by register
//! class. On System V x86_64 and AArch64 integer and floating arguments fill
//! separate register files, so one universal shape with eight integer and
//! eight floating parameters covers every signature within those limits.
//! Windows x64 assigns registers by position, so the first four slots are
//! dispatched over the sixteen integer/float combinations.
//!
//! `f32` arguments travel in the low half of a floating register and narrow
//! integers are sign- or zero-extended. Return registers are truncated to the
//! declared type.

use std::fmt;

use dlbind_core::{TypeDesc, Value};

use crate::error::{MarshalError, Result};

/// A scalar type as seen by the native ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeType {
    Void,
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
    Pointer,
}

impl NativeType {
    /// Native type of a primitive `TypeDesc`. Rich types must be lowered first.
    pub fn of(ty: &TypeDesc) -> Result<Self> {
        Ok(match ty.underlying() {
            TypeDesc::Void => Self::Void,
            TypeDesc::I8 => Self::I8,
            TypeDesc::I16 => Self::I16,
            TypeDesc::I32 => Self::I32,
            TypeDesc::I64 => Self::I64,
            TypeDesc::U8 => Self::U8,
            TypeDesc::U16 => Self::U16,
            TypeDesc::U32 => Self::U32,
            TypeDesc::U64 => Self::U64,
            TypeDesc::F32 => Self::F32,
            TypeDesc::F64 => Self::F64,
            TypeDesc::Pointer | TypeDesc::FunctionPointer => Self::Pointer,
            other => return Err(MarshalError::unsupported(other)),
        })
    }

    /// Size in bytes on the host.
    pub fn size(self) -> usize {
        match self {
            Self::Void => 0,
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
            Self::Pointer => std::mem::size_of::<usize>(),
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// Integer register contents for `value`, extended to 64 bits.
    pub fn int_bits(self, value: &Value) -> Result<i64> {
        Ok(match (self, value) {
            (Self::I8, Value::I8(v)) => *v as i64,
            (Self::I16, Value::I16(v)) => *v as i64,
            (Self::I32, Value::I32(v)) => *v as i64,
            (Self::I64, Value::I64(v)) => *v,
            (Self::U8, Value::U8(v)) => *v as i64,
            (Self::U16, Value::U16(v)) => *v as i64,
            (Self::U32, Value::U32(v)) => *v as i64,
            (Self::U64, Value::U64(v)) => *v as i64,
            (Self::Pointer, Value::Ptr(v)) => *v as i64,
            (ty, value) => return Err(mismatch(ty, value)),
        })
    }

    /// Value of this type from an integer return register.
    pub fn from_int_bits(self, raw: i64) -> Value {
        match self {
            Self::Void => Value::Unit,
            Self::I8 => Value::I8(raw as i8),
            Self::I16 => Value::I16(raw as i16),
            Self::I32 => Value::I32(raw as i32),
            Self::I64 => Value::I64(raw),
            Self::U8 => Value::U8(raw as u8),
            Self::U16 => Value::U16(raw as u16),
            Self::U32 => Value::U32(raw as u32),
            Self::U64 => Value::U64(raw as u64),
            Self::F32 => Value::F32(f32::from_bits(raw as u32)),
            Self::F64 => Value::F64(f64::from_bits(raw as u64)),
            Self::Pointer => Value::Ptr(raw as usize),
        }
    }

    /// Value of this type from a floating return register.
    pub fn from_float_bits(self, raw: f64) -> Value {
        match self {
            Self::F32 => Value::F32(f32::from_bits(raw.to_bits() as u32)),
            Self::F64 => Value::F64(raw),
            other => other.from_int_bits(raw.to_bits() as i64),
        }
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Void => "void",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Pointer => "pointer",
        };
        f.write_str(name)
    }
}

fn mismatch(ty: NativeType, value: &Value) -> MarshalError {
    MarshalError::ArgumentMismatch {
        detail: format!("expected native {ty}, found {}", value.kind()),
    }
}

/// Parameter and return types of a native function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallSignature {
    pub params: Vec<NativeType>,
    pub ret: NativeType,
}

impl CallSignature {
    pub fn new(params: Vec<NativeType>, ret: NativeType) -> Self {
        Self { params, ret }
    }

    /// Signature over primitive contract types.
    pub fn from_types<'a>(
        params: impl IntoIterator<Item = &'a TypeDesc>,
        ret: &TypeDesc,
    ) -> Result<Self> {
        let params = params
            .into_iter()
            .map(NativeType::of)
            .collect::<Result<Vec<_>>>()?;
        let ret = NativeType::of(ret)?;
        if let Some(void) = params.iter().find(|p| **p == NativeType::Void) {
            return Err(MarshalError::unsupported(void));
        }
        Ok(Self { params, ret })
    }
}

impl fmt::Display for CallSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, ") -> {}", self.ret)
    }
}

/// Whether the call thunk supports the host ABI.
pub const fn thunk_supported() -> bool {
    cfg!(any(
        all(not(windows), any(target_arch = "x86_64", target_arch = "aarch64")),
        all(windows, target_arch = "x86_64")
    ))
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Int(i64),
    Float(f64),
}

fn slot(ty: NativeType, value: &Value) -> Result<Slot> {
    match (ty, value) {
        (NativeType::F32, Value::F32(v)) => Ok(Slot::Float(f64::from_bits(v.to_bits() as u64))),
        (NativeType::F64, Value::F64(v)) => Ok(Slot::Float(*v)),
        (NativeType::F32 | NativeType::F64 | NativeType::Void, value) => Err(mismatch(ty, value)),
        (ty, value) => ty.int_bits(value).map(Slot::Int),
    }
}

/// Call the native function at `address`.
///
/// Arguments must already be lowered to primitive values matching
/// `signature.params`.
///
/// # Safety
///
/// `address` must be the entry point of a function whose C signature matches
/// `signature`, and every pointer argument must be valid for the callee.
pub unsafe fn call_native(address: usize, signature: &CallSignature, args: &[Value]) -> Result<Value> {
    if address == 0 {
        return Err(MarshalError::ArgumentMismatch {
            detail: "function address is null".to_string(),
        });
    }
    if args.len() != signature.params.len() {
        return Err(MarshalError::ArgumentMismatch {
            detail: format!(
                "{signature} takes {} arguments, {} given",
                signature.params.len(),
                args.len()
            ),
        });
    }
    let slots = signature
        .params
        .iter()
        .zip(args)
        .map(|(ty, value)| slot(*ty, value))
        .collect::<Result<Vec<_>>>()?;

    tracing::trace!(target: "dlbind::abi", address = format_args!("{address:#x}"), %signature, "native call");
    thunk::invoke(address, &slots, signature.ret)
}

/// A resolved native function and its signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeFunction {
    address: usize,
    signature: CallSignature,
}

impl NativeFunction {
    /// # Safety
    ///
    /// `address` must point to a function with the given signature and stay
    /// valid for as long as this value is called.
    pub unsafe fn new(address: usize, signature: CallSignature) -> Self {
        Self { address, signature }
    }

    pub fn address(&self) -> usize {
        self.address
    }

    pub fn signature(&self) -> &CallSignature {
        &self.signature
    }

    /// Call with already-lowered arguments.
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        // SAFETY: construction guarantees address and signature agree.
        unsafe { call_native(self.address, &self.signature, args) }
    }
}

#[cfg(all(not(windows), any(target_arch = "x86_64", target_arch = "aarch64")))]
mod thunk {
    use dlbind_core::Value;

    use super::{NativeType, Slot};
    use crate::error::{MarshalError, Result};

    const INT_SLOTS: usize = 8;
    const FLOAT_SLOTS: usize = 8;

    type IntFn = unsafe extern "C" fn(
        i64, i64, i64, i64, i64, i64, i64, i64,
        f64, f64, f64, f64, f64, f64, f64, f64,
    ) -> i64;
    type FloatFn = unsafe extern "C" fn(
        i64, i64, i64, i64, i64, i64, i64, i64,
        f64, f64, f64, f64, f64, f64, f64, f64,
    ) -> f64;

    pub(super) unsafe fn invoke(address: usize, slots: &[Slot], ret: NativeType) -> Result<Value> {
        let mut ints = [0i64; INT_SLOTS];
        let mut floats = [0f64; FLOAT_SLOTS];
        let (mut n_int, mut n_float) = (0, 0);
        for slot in slots {
            match *slot {
                Slot::Int(v) if n_int < INT_SLOTS => {
                    ints[n_int] = v;
                    n_int += 1;
                }
                Slot::Float(v) if n_float < FLOAT_SLOTS => {
                    floats[n_float] = v;
                    n_float += 1;
                }
                _ => {
                    return Err(MarshalError::PlatformNotSupported {
                        detail: format!(
                            "at most {INT_SLOTS} integer and {FLOAT_SLOTS} floating arguments are supported"
                        ),
                    })
                }
            }
        }

        let [i0, i1, i2, i3, i4, i5, i6, i7] = ints;
        let [f0, f1, f2, f3, f4, f5, f6, f7] = floats;
        if ret.is_float() {
            let f = std::mem::transmute::<usize, FloatFn>(address);
            let raw = f(i0, i1, i2, i3, i4, i5, i6, i7, f0, f1, f2, f3, f4, f5, f6, f7);
            Ok(ret.from_float_bits(raw))
        } else {
            let f = std::mem::transmute::<usize, IntFn>(address);
            let raw = f(i0, i1, i2, i3, i4, i5, i6, i7, f0, f1, f2, f3, f4, f5, f6, f7);
            Ok(ret.from_int_bits(raw))
        }
    }
}

#[cfg(all(windows, target_arch = "x86_64"))]
mod thunk {
    use dlbind_core::Value;

    use super::{NativeType, Slot};
    use crate::error::{MarshalError, Result};

    const SLOTS: usize = 8;

    trait Register: Copy {
        fn load(bits: u64) -> Self;
    }

    impl Register for i64 {
        fn load(bits: u64) -> Self {
            bits as i64
        }
    }

    impl Register for f64 {
        fn load(bits: u64) -> Self {
            f64::from_bits(bits)
        }
    }

    trait Return: Copy {
        fn into_value(self, ret: NativeType) -> Value;
    }

    impl Return for i64 {
        fn into_value(self, ret: NativeType) -> Value {
            ret.from_int_bits(self)
        }
    }

    impl Return for f64 {
        fn into_value(self, ret: NativeType) -> Value {
            ret.from_float_bits(self)
        }
    }

    unsafe fn call4<A: Register, B: Register, C: Register, D: Register, R: Return>(
        address: usize,
        bits: &[u64; SLOTS],
        ret: NativeType,
    ) -> Value {
        let f: unsafe extern "C" fn(A, B, C, D, i64, i64, i64, i64) -> R =
            std::mem::transmute_copy(&address);
        f(
            A::load(bits[0]),
            B::load(bits[1]),
            C::load(bits[2]),
            D::load(bits[3]),
            bits[4] as i64,
            bits[5] as i64,
            bits[6] as i64,
            bits[7] as i64,
        )
        .into_value(ret)
    }

    unsafe fn dispatch<R: Return>(
        address: usize,
        bits: &[u64; SLOTS],
        float: [bool; 4],
        ret: NativeType,
    ) -> Value {
        macro_rules! call {
            ($a:ty, $b:ty, $c:ty, $d:ty) => {
                call4::<$a, $b, $c, $d, R>(address, bits, ret)
            };
        }
        match float {
            [false, false, false, false] => call!(i64, i64, i64, i64),
            [false, false, false, true] => call!(i64, i64, i64, f64),
            [false, false, true, false] => call!(i64, i64, f64, i64),
            [false, false, true, true] => call!(i64, i64, f64, f64),
            [false, true, false, false] => call!(i64, f64, i64, i64),
            [false, true, false, true] => call!(i64, f64, i64, f64),
            [false, true, true, false] => call!(i64, f64, f64, i64),
            [false, true, true, true] => call!(i64, f64, f64, f64),
            [true, false, false, false] => call!(f64, i64, i64, i64),
            [true, false, false, true] => call!(f64, i64, i64, f64),
            [true, false, true, false] => call!(f64, i64, f64, i64),
            [true, false, true, true] => call!(f64, i64, f64, f64),
            [true, true, false, false] => call!(f64, f64, i64, i64),
            [true, true, false, true] => call!(f64, f64, i64, f64),
            [true, true, true, false] => call!(f64, f64, f64, i64),
            [true, true, true, true] => call!(f64, f64, f64, f64),
        }
    }

    pub(super) unsafe fn invoke(address: usize, slots: &[Slot], ret: NativeType) -> Result<Value> {
        if slots.len() > SLOTS {
            return Err(MarshalError::PlatformNotSupported {
                detail: format!("at most {SLOTS} arguments are supported"),
            });
        }
        let mut bits = [0u64; SLOTS];
        let mut float = [false; 4];
        for (i, slot) in slots.iter().enumerate() {
            match *slot {
                Slot::Int(v) => bits[i] = v as u64,
                Slot::Float(v) => {
                    bits[i] = v.to_bits();
                    if i < 4 {
                        float[i] = true;
                    }
                }
            }
        }
        Ok(if ret.is_float() {
            dispatch::<f64>(address, &bits, float, ret)
        } else {
            dispatch::<i64>(address, &bits, float, ret)
        })
    }
}

#[cfg(not(any(
    all(not(windows), any(target_arch = "x86_64", target_arch = "aarch64")),
    all(windows, target_arch = "x86_64")
)))]
mod thunk {
    use dlbind_core::Value;

    use super::{NativeType, Slot};
    use crate::error::{MarshalError, Result};

    pub(super) unsafe fn invoke(_address: usize, _slots: &[Slot], _ret: NativeType) -> Result<Value> {
        Err(MarshalError::PlatformNotSupported {
            detail: format!("no native call thunk for {}", std::env::consts::ARCH),
        })
    }
}
