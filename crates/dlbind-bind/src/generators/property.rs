//! Splits a property into getter and setter units.

use crate::complexity::GeneratorComplexity;
use crate::error::{BindError, Result};
use crate::pipeline::{BindingContext, BindingGenerator, Generated};
use crate::unit::{Binding, Definition, WorkUnit};

use super::method_invoker;

/// The getter keeps the property's symbol; the setter gets its own, which
/// may name the same variable.
#[derive(Debug, Default, Clone, Copy)]
pub struct PropertyGenerator;

impl BindingGenerator for PropertyGenerator {
    fn name(&self) -> &'static str {
        "property"
    }

    fn complexity(&self) -> GeneratorComplexity {
        GeneratorComplexity::MEMBER_DEPENDENT
    }

    fn is_applicable(&self, unit: &WorkUnit, _ctx: &BindingContext) -> bool {
        matches!(unit.definition, Definition::Property(_))
    }

    fn generate(&self, unit: WorkUnit, ctx: &BindingContext) -> Result<Generated> {
        let Definition::Property(property) = &unit.definition else {
            return Err(BindError::internal("property stage reached a non-property unit"));
        };

        let mut units = Vec::with_capacity(2);
        if property.getter {
            units.push(unit.replace(Definition::Getter(property.clone())));
        }
        if property.setter {
            let symbol = ctx.symbol_for(property.setter_entry_name(), None)?;
            units.push(WorkUnit::new(
                unit.member_index,
                Definition::Setter(property.clone()),
                symbol,
            ));
        }
        let (has_getter, has_setter) = (property.getter, property.setter);

        Ok(Generated::Expanded {
            units,
            compose: Box::new(move |bindings| {
                let mut bindings = bindings.into_iter();
                let mut next = |present: bool| -> Result<_> {
                    if present {
                        bindings.next().map(method_invoker).transpose()
                    } else {
                        Ok(None)
                    }
                };
                let getter = next(has_getter)?;
                let setter = next(has_setter)?;
                Ok(Binding::Property { getter, setter })
            }),
        })
    }
}
