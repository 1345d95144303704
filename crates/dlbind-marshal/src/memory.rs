//! Native allocation, by-reference cells, and the per-call frame.

use std::cell::UnsafeCell;
use std::ffi::c_void;

use dlbind_core::Value;

use crate::abi::NativeType;
use crate::error::{MarshalError, Result};

extern "C" {
    fn malloc(size: usize) -> *mut c_void;
    fn free(ptr: *mut c_void);
}

/// Copy `bytes` into a fresh block from the C allocator.
///
/// The block can be handed to native code that releases it with `free`.
pub fn alloc_bytes(bytes: &[u8]) -> Result<usize> {
    let size = bytes.len().max(1);
    // SAFETY: malloc has no preconditions; the result is checked for null.
    let ptr = unsafe { malloc(size) }.cast::<u8>();
    if ptr.is_null() {
        return Err(MarshalError::Allocation { size });
    }
    // SAFETY: ptr is a fresh block of at least bytes.len() bytes.
    unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr, bytes.len()) };
    Ok(ptr as usize)
}

/// Release a block from the C allocator. Null is ignored.
///
/// # Safety
///
/// `address` must be null or a live block returned by the C allocator.
pub unsafe fn free_native(address: usize) {
    if address != 0 {
        free(address as *mut c_void);
    }
}

/// Read a scalar of type `ty` at `address`.
///
/// # Safety
///
/// `address` must be valid for a read of `ty.size()` bytes.
pub unsafe fn read_scalar(address: usize, ty: NativeType) -> Result<Value> {
    let p = address as *const u8;
    Ok(match ty {
        NativeType::I8 => Value::I8(p.cast::<i8>().read_unaligned()),
        NativeType::I16 => Value::I16(p.cast::<i16>().read_unaligned()),
        NativeType::I32 => Value::I32(p.cast::<i32>().read_unaligned()),
        NativeType::I64 => Value::I64(p.cast::<i64>().read_unaligned()),
        NativeType::U8 => Value::U8(p.read_unaligned()),
        NativeType::U16 => Value::U16(p.cast::<u16>().read_unaligned()),
        NativeType::U32 => Value::U32(p.cast::<u32>().read_unaligned()),
        NativeType::U64 => Value::U64(p.cast::<u64>().read_unaligned()),
        NativeType::F32 => Value::F32(p.cast::<f32>().read_unaligned()),
        NativeType::F64 => Value::F64(p.cast::<f64>().read_unaligned()),
        NativeType::Pointer => Value::Ptr(p.cast::<usize>().read_unaligned()),
        NativeType::Void => return Err(MarshalError::unsupported("void")),
    })
}

/// Write `value` as a scalar of type `ty` at `address`.
///
/// # Safety
///
/// `address` must be valid for a write of `ty.size()` bytes.
pub unsafe fn write_scalar(address: usize, ty: NativeType, value: &Value) -> Result<()> {
    let p = address as *mut u8;
    match (ty, value) {
        (NativeType::F32, Value::F32(v)) => p.cast::<f32>().write_unaligned(*v),
        (NativeType::F64, Value::F64(v)) => p.cast::<f64>().write_unaligned(*v),
        (NativeType::I8 | NativeType::U8, _) => p.write_unaligned(ty.int_bits(value)? as u8),
        (NativeType::I16 | NativeType::U16, _) => p.cast::<u16>().write_unaligned(ty.int_bits(value)? as u16),
        (NativeType::I32 | NativeType::U32, _) => p.cast::<u32>().write_unaligned(ty.int_bits(value)? as u32),
        (NativeType::I64 | NativeType::U64, _) => p.cast::<u64>().write_unaligned(ty.int_bits(value)? as u64),
        (NativeType::Pointer, _) => p.cast::<usize>().write_unaligned(ty.int_bits(value)? as usize),
        (ty, value) => {
            return Err(MarshalError::ArgumentMismatch {
                detail: format!("cannot store {} as native {ty}", value.kind()),
            })
        }
    }
    Ok(())
}

/// Heap storage for one scalar passed by reference.
///
/// The cell never moves while it is alive, so its address can be handed to
/// native code for the duration of a call.
#[derive(Debug)]
pub struct NativeCell {
    ty: NativeType,
    storage: Box<UnsafeCell<u64>>,
}

impl NativeCell {
    /// A zero-filled cell.
    pub fn zeroed(ty: NativeType) -> Self {
        Self {
            ty,
            storage: Box::new(UnsafeCell::new(0)),
        }
    }

    /// A cell holding `initial`.
    pub fn new(ty: NativeType, initial: &Value) -> Result<Self> {
        let cell = Self::zeroed(ty);
        // SAFETY: the cell owns eight writable bytes, enough for any scalar.
        unsafe { write_scalar(cell.address(), ty, initial)? };
        Ok(cell)
    }

    pub fn native_type(&self) -> NativeType {
        self.ty
    }

    pub fn address(&self) -> usize {
        self.storage.get() as usize
    }

    /// Current contents.
    pub fn get(&self) -> Result<Value> {
        // SAFETY: the cell owns eight readable bytes.
        unsafe { read_scalar(self.address(), self.ty) }
    }
}

/// Handle to a cell owned by a [`CallFrame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellId(usize);

/// Native resources that live for exactly one call.
///
/// Cells back by-reference arguments. Adopted allocations are released with
/// the C allocator when the frame drops.
#[derive(Debug, Default)]
pub struct CallFrame {
    cells: Vec<NativeCell>,
    owned: Vec<usize>,
}

impl CallFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a cell holding `initial`.
    pub fn cell(&mut self, ty: NativeType, initial: &Value) -> Result<CellId> {
        self.cells.push(NativeCell::new(ty, initial)?);
        Ok(CellId(self.cells.len() - 1))
    }

    /// Allocate a zero-filled cell.
    pub fn zeroed_cell(&mut self, ty: NativeType) -> CellId {
        self.cells.push(NativeCell::zeroed(ty));
        CellId(self.cells.len() - 1)
    }

    pub fn address(&self, id: CellId) -> usize {
        self.cells[id.0].address()
    }

    pub fn read(&self, id: CellId) -> Result<Value> {
        self.cells[id.0].get()
    }

    /// Take ownership of a C allocator block; it is freed when the frame drops.
    pub fn adopt(&mut self, address: usize) {
        if address != 0 {
            self.owned.push(address);
        }
    }

    /// Number of blocks the frame will free.
    pub fn owned_allocations(&self) -> usize {
        self.owned.len()
    }
}

impl Drop for CallFrame {
    fn drop(&mut self) {
        for address in self.owned.drain(..) {
            // SAFETY: only C allocator blocks are adopted, each exactly once.
            unsafe { free_native(address) };
        }
    }
}
