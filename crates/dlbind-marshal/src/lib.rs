//! Marshalling layer for dlbind.
//!
//! Everything between a contract-level [`Value`](dlbind_core::Value) and a
//! raw native call lives here.
//!
//! ## Modules
//!
//! - [`abi`] — Native scalar types and the call thunk
//! - [`memory`] — Native allocation, by-reference cells, and the per-call frame
//! - [`transform`] — Type transformers for rich types and their registry
//! - [`naming`] — Symbol prefix and case transforms
//! - [`mangle`] — Entry-point manglers and the mangler registry

pub mod abi;
pub mod error;
pub mod mangle;
pub mod memory;
pub mod naming;
pub mod transform;

pub use abi::{call_native, CallSignature, NativeFunction, NativeType};
pub use error::{MarshalError, Result};
pub use mangle::{
    Mangler, ManglerContext, ManglerRegistry, SharedMangler, SimpleGenericMangler, StdCallMangler,
};
pub use memory::{CallFrame, NativeCell};
pub use naming::transform_symbol;
pub use transform::{
    BooleanTransformer, NullableTransformer, SharedTransformer, StringTransformer,
    TransformerRegistry, TypeTransformer,
};
