//! Open generic methods.

use std::sync::Arc;

use dlbind_core::ImplementationOptions;

use crate::complexity::GeneratorComplexity;
use crate::error::{BindError, Result};
use crate::generics::ClosedGenericSignature;
use crate::pipeline::{BindingContext, BindingGenerator, Generated};
use crate::unit::{invoker, Binding, WorkUnit};

/// Binds an open generic method to the instance's specialization cache.
///
/// Each call closes the method over the call's type arguments; the first
/// call for a closed signature binds a one-member instance for it, later
/// calls reuse that instance.
///
/// This stage runs ahead of the disposal guard, so under
/// `GENERATE_DISPOSAL_CHECKS` it checks disposal itself: a disposed
/// instance never creates or calls a specialization.
#[derive(Debug, Default, Clone, Copy)]
pub struct GenericMethodGenerator;

impl BindingGenerator for GenericMethodGenerator {
    fn name(&self) -> &'static str {
        "generic-method"
    }

    fn complexity(&self) -> GeneratorComplexity {
        GeneratorComplexity::MEMBER_DEPENDENT
            | GeneratorComplexity::TRANSFORMS_PARAMETERS
            | GeneratorComplexity::CREATES_TYPES
            | GeneratorComplexity::DEFERRED_IMPLEMENTATION
    }

    fn is_applicable(&self, unit: &WorkUnit, _ctx: &BindingContext) -> bool {
        unit.method().is_some_and(|m| m.is_open_generic())
    }

    fn generate(&self, unit: WorkUnit, ctx: &BindingContext) -> Result<Generated> {
        let method = unit
            .method()
            .cloned()
            .ok_or_else(|| BindError::internal("generic stage reached a non-method unit"))?;
        let guard = ctx
            .options
            .contains(ImplementationOptions::GENERATE_DISPOSAL_CHECKS)
            .then(|| Arc::clone(&ctx.library));

        Ok(Generated::Terminal(Binding::Method(invoker(move |inv, args| {
            if guard.as_ref().is_some_and(|library| library.is_disposed()) {
                return Err(BindError::Disposed {
                    member: method.name.clone(),
                });
            }
            let closed = method.close(inv.type_args)?;
            let signature = ClosedGenericSignature::of(&closed);
            let specialization = inv
                .instance
                .generics()
                .get_or_create(signature, || inv.instance.specialize(&closed))?;
            specialization.invoke_index(0, args)
        }))))
    }
}
