//! Binding generation for dlbind.
//!
//! A [`NativeLibraryBuilder`] binds a [`Contract`](dlbind_core::Contract) to a
//! native library and returns a [`BoundInstance`] whose members call into it.
//! Each member is bound by running it through the stage [`Pipeline`].
//!
//! ## Modules
//!
//! - [`error`] — Binding error taxonomy
//! - [`complexity`] — Stage complexity flags and ordering
//! - [`unit`] — Work units, invokers, and bindings
//! - [`pipeline`] — Stage trait, binding context, and the pipeline driver
//! - [`generators`] — The built-in stages
//! - [`library`] — Library handles owned by an instance
//! - [`instance`] — Bound instances
//! - [`generics`] — Generic specialization cache
//! - [`form`] — Shared implementation forms and their registry
//! - [`builder`] — Contract activation
//! - [`config`] — TOML binding configuration

pub mod builder;
pub mod complexity;
pub mod config;
pub mod error;
pub mod form;
pub mod generators;
pub mod generics;
pub mod instance;
pub mod library;
pub mod pipeline;
pub mod unit;

pub use builder::NativeLibraryBuilder;
pub use complexity::GeneratorComplexity;
pub use config::BindingConfig;
pub use error::{BindError, Result};
pub use form::{FormRegistry, ImplementationForm, MemberPlan};
pub use generics::{ClosedGenericSignature, GenericCache, GenericStatistics};
pub use instance::BoundInstance;
pub use pipeline::{BindingContext, BindingGenerator, Generated, Pipeline};
pub use unit::{Binding, Definition, Invocation, Invoker, SymbolTarget, WorkUnit};
