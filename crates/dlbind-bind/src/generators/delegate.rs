//! Default terminating stage: call through a resolved function object.

use dlbind_marshal::NativeFunction;
use once_cell::sync::OnceCell;

use crate::complexity::GeneratorComplexity;
use crate::error::{BindError, Result};
use crate::pipeline::{BindingContext, BindingGenerator, Generated};
use crate::unit::{invoker, Binding, Definition, WorkUnit};

use super::native::{CallPlan, SymbolSlot};

/// Binds a method to a [`NativeFunction`] created from its symbol.
#[derive(Debug, Default, Clone, Copy)]
pub struct DelegateGenerator;

impl BindingGenerator for DelegateGenerator {
    fn name(&self) -> &'static str {
        "delegate"
    }

    fn complexity(&self) -> GeneratorComplexity {
        GeneratorComplexity::TERMINATING
    }

    fn is_applicable(&self, unit: &WorkUnit, _ctx: &BindingContext) -> bool {
        matches!(unit.definition, Definition::Method(_))
    }

    fn generate(&self, unit: WorkUnit, ctx: &BindingContext) -> Result<Generated> {
        let method = unit
            .method()
            .ok_or_else(|| BindError::internal("delegate stage reached a non-method unit"))?;
        let plan = CallPlan::new(method)?;
        let slot = SymbolSlot::new(&unit, ctx)?;
        let function: OnceCell<NativeFunction> = OnceCell::new();

        Ok(Generated::Terminal(Binding::Method(invoker(move |_, args| {
            let function = function.get_or_try_init(|| {
                let address = slot.address()?;
                // SAFETY: the contract declares the symbol's signature.
                Ok::<_, BindError>(unsafe { NativeFunction::new(address, plan.signature().clone()) })
            })?;
            plan.invoke(args, |native| Ok(function.call(native)?))
        }))))
    }
}
