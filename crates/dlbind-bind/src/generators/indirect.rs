//! Terminating stage for `USE_INDIRECT_CALLS`: call the raw symbol address.

use dlbind_core::ImplementationOptions;
use dlbind_marshal::call_native;

use crate::complexity::GeneratorComplexity;
use crate::error::{BindError, Result};
use crate::pipeline::{BindingContext, BindingGenerator, Generated};
use crate::unit::{invoker, Binding, Definition, WorkUnit};

use super::native::{CallPlan, SymbolSlot};

#[derive(Debug, Default, Clone, Copy)]
pub struct IndirectCallGenerator;

impl BindingGenerator for IndirectCallGenerator {
    fn name(&self) -> &'static str {
        "indirect-call"
    }

    fn complexity(&self) -> GeneratorComplexity {
        GeneratorComplexity::OPTION_DEPENDENT | GeneratorComplexity::TERMINATING
    }

    fn is_applicable(&self, unit: &WorkUnit, ctx: &BindingContext) -> bool {
        ctx.options.contains(ImplementationOptions::USE_INDIRECT_CALLS)
            && matches!(unit.definition, Definition::Method(_))
    }

    fn generate(&self, unit: WorkUnit, ctx: &BindingContext) -> Result<Generated> {
        let method = unit
            .method()
            .ok_or_else(|| BindError::internal("indirect-call stage reached a non-method unit"))?;
        let plan = CallPlan::new(method)?;
        let slot = SymbolSlot::new(&unit, ctx)?;

        Ok(Generated::Terminal(Binding::Method(invoker(move |_, args| {
            let address = slot.address()?;
            plan.invoke(args, |native| {
                // SAFETY: the contract declares the symbol's signature.
                Ok(unsafe { call_native(address, plan.signature(), native)? })
            })
        }))))
    }
}
