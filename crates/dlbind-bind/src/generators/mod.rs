//! Pipeline stages.
//!
//! ## Stages, in pipeline order
//!
//! - [`generic`] — Open generic methods, bound through the specialization cache
//! - [`permutation`] — Optional by-reference parameters, one variant per presence mask
//! - [`callback`] — Function-pointer arguments, held for their delegate lifetime
//! - [`boolean`] — Booleans to fixed-width integers
//! - [`lowering`] — Text and nullable value types through the transformer registry
//! - [`collection`] — Returned collections with a known length
//! - [`property`] — Properties split into getter and setter units
//! - [`disposal`] — Calls fail once the instance is disposed
//! - [`global`] — Getter and setter units over a native global variable
//! - [`indirect`] — Calls through the raw symbol address
//! - [`delegate`] — Calls through a resolved function object

pub mod boolean;
pub mod callback;
pub mod collection;
pub mod delegate;
pub mod disposal;
pub mod generic;
pub mod global;
pub mod indirect;
pub mod lowering;
mod native;
pub mod permutation;
pub mod property;

use std::sync::Arc;

use dlbind_core::{Parameter, Value};

use crate::error::{BindError, Result};
use crate::pipeline::SharedGenerator;
use crate::unit::{Binding, Invoker};

pub use boolean::BooleanWrapper;
pub use callback::CallbackMarshaller;
pub use collection::SizedCollectionWrapper;
pub use delegate::DelegateGenerator;
pub use disposal::DisposalGuard;
pub use generic::GenericMethodGenerator;
pub use global::GlobalVariableGenerator;
pub use indirect::IndirectCallGenerator;
pub use lowering::LoweringGenerator;
pub use permutation::RefPermutationGenerator;
pub use property::PropertyGenerator;

/// Every built-in stage. Stages of equal score run in the order listed.
pub fn standard_stages() -> Vec<SharedGenerator> {
    vec![
        Arc::new(GenericMethodGenerator),
        Arc::new(RefPermutationGenerator),
        Arc::new(CallbackMarshaller),
        Arc::new(BooleanWrapper),
        Arc::new(LoweringGenerator),
        Arc::new(SizedCollectionWrapper),
        Arc::new(PropertyGenerator),
        Arc::new(DisposalGuard),
        Arc::new(GlobalVariableGenerator),
        Arc::new(IndirectCallGenerator),
        Arc::new(DelegateGenerator),
    ]
}

/// The invoker of a method binding produced for a replacement unit.
pub(crate) fn method_invoker(binding: Binding) -> Result<Invoker> {
    match binding {
        Binding::Method(invoker) => Ok(invoker),
        other => Err(BindError::internal(format!(
            "expected a method binding, found {other:?}"
        ))),
    }
}

/// Fail unless `args` has one value per parameter.
pub(crate) fn check_arity(member: &str, params: &[Parameter], args: &[Value]) -> Result<()> {
    if args.len() == params.len() {
        return Ok(());
    }
    Err(BindError::mismatch(
        member,
        format!("expected {} arguments, got {}", params.len(), args.len()),
    ))
}

/// Copy by-reference results from `lowered` back into the caller's arguments.
///
/// `raise` converts each copied value back to the caller's representation.
pub(crate) fn copy_back(
    params: &[Parameter],
    args: &mut [Value],
    lowered: Vec<Value>,
    mut raise: impl FnMut(usize, Value) -> Result<Value>,
) -> Result<()> {
    for (i, value) in lowered.into_iter().enumerate() {
        if params.get(i).is_some_and(|p| p.passing.copies_back()) {
            args[i] = raise(i, value)?;
        }
    }
    Ok(())
}
