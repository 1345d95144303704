//! Disposal guard, active under `GENERATE_DISPOSAL_CHECKS`.

use std::sync::Arc;

use dlbind_core::ImplementationOptions;

use crate::complexity::GeneratorComplexity;
use crate::error::{BindError, Result};
use crate::pipeline::{BindingContext, BindingGenerator, Generated};
use crate::unit::{invoker, Binding, WorkUnit};

use super::method_invoker;

/// Fails every call made after the instance's library was disposed, before
/// the call reaches native code.
///
/// Stages that rewrite arguments (permutation, callback, boolean, lowering)
/// score higher and run outside this guard, so their lowering still happens
/// on a disposed instance; its temporaries are released with the call frame
/// and nothing is retained by the instance.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisposalGuard;

impl BindingGenerator for DisposalGuard {
    fn name(&self) -> &'static str {
        "disposal-guard"
    }

    fn complexity(&self) -> GeneratorComplexity {
        GeneratorComplexity::OPTION_DEPENDENT
    }

    fn is_applicable(&self, unit: &WorkUnit, ctx: &BindingContext) -> bool {
        ctx.options.contains(ImplementationOptions::GENERATE_DISPOSAL_CHECKS)
            && unit.definition.is_callable()
    }

    fn generate(&self, unit: WorkUnit, ctx: &BindingContext) -> Result<Generated> {
        let library = Arc::clone(&ctx.library);
        let member = unit.name().to_string();
        Ok(Generated::wrap(unit, move |inner| {
            let inner = method_invoker(inner)?;
            Ok(Binding::Method(invoker(move |inv, args| {
                if library.is_disposed() {
                    return Err(BindError::Disposed {
                        member: member.clone(),
                    });
                }
                inner(inv, args)
            })))
        }))
    }
}
