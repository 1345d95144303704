//! Contract model for dlbind.
//!
//! A contract is the declarative description of a native API: the methods and
//! global variables a library exports, with the calling-convention,
//! marshalling, and naming metadata needed to bind them at runtime.
//!
//! ## Modules
//!
//! - [`types`] — Type descriptions used in signatures
//! - [`value`] — Dynamic argument and return values
//! - [`contract`] — Method, property, and contract declarations
//! - [`builder`] — Fluent construction of contracts
//! - [`options`] — Binding option flags

pub mod builder;
pub mod contract;
pub mod error;
pub mod options;
pub mod types;
pub mod value;

pub use builder::ContractBuilder;
pub use contract::{
    BoolEncoding, CallingConvention, CollectionLength, Contract, DelegateLifetime, FreePolicy,
    GenericMangling, MarshalInfo, Member, MethodDeclaration, Parameter, Passing,
    PropertyDeclaration, StringEncoding, SymbolNaming, SymbolTransform,
};
pub use error::{ContractError, Result};
pub use options::ImplementationOptions;
pub use types::TypeDesc;
pub use value::{Callback, Value};
