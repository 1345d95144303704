//! Terminating stage for property accessors over native global variables.

use dlbind_core::{PropertyDeclaration, TypeDesc, Value};
use dlbind_marshal::memory::{read_scalar, write_scalar};
use dlbind_marshal::NativeType;

use crate::complexity::GeneratorComplexity;
use crate::error::{BindError, Result};
use crate::pipeline::{BindingContext, BindingGenerator, Generated};
use crate::unit::{invoker, Binding, Definition, WorkUnit};

use super::native::SymbolSlot;

/// Reads and writes the variable at the accessor's symbol.
///
/// Booleans are stored as one byte, any non-zero value reading as `true`.
#[derive(Debug, Default, Clone, Copy)]
pub struct GlobalVariableGenerator;

fn storage_type(property: &PropertyDeclaration) -> Result<NativeType> {
    match &property.ty {
        TypeDesc::Bool => Ok(NativeType::U8),
        ty if ty.is_primitive() => Ok(NativeType::of(ty)?),
        ty => Err(BindError::UnsupportedType { ty: ty.to_string() }),
    }
}

impl BindingGenerator for GlobalVariableGenerator {
    fn name(&self) -> &'static str {
        "global-variable"
    }

    fn complexity(&self) -> GeneratorComplexity {
        GeneratorComplexity::MEMBER_DEPENDENT | GeneratorComplexity::TERMINATING
    }

    fn is_applicable(&self, unit: &WorkUnit, _ctx: &BindingContext) -> bool {
        matches!(unit.definition, Definition::Getter(_) | Definition::Setter(_))
    }

    fn generate(&self, unit: WorkUnit, ctx: &BindingContext) -> Result<Generated> {
        let slot = SymbolSlot::new(&unit, ctx)?;
        let binding = match unit.definition {
            Definition::Getter(property) => {
                let storage = storage_type(&property)?;
                let is_bool = property.ty == TypeDesc::Bool;
                invoker(move |_, args| {
                    if !args.is_empty() {
                        return Err(BindError::mismatch(slot.member(), "getter takes no arguments"));
                    }
                    let address = slot.address()?;
                    // SAFETY: the symbol names a variable of the declared type.
                    let raw = unsafe { read_scalar(address, storage)? };
                    if is_bool {
                        return Ok(Value::Bool(raw.as_i64().is_some_and(|v| v != 0)));
                    }
                    Ok(raw)
                })
            }
            Definition::Setter(property) => {
                let storage = storage_type(&property)?;
                invoker(move |_, args| {
                    let [value] = args else {
                        return Err(BindError::mismatch(slot.member(), "setter takes one argument"));
                    };
                    value.expect_type(&property.ty)?;
                    let native = match value {
                        Value::Bool(b) => Value::U8(u8::from(*b)),
                        other => other.clone(),
                    };
                    let address = slot.address()?;
                    // SAFETY: the symbol names a variable of the declared type.
                    unsafe { write_scalar(address, storage, &native)? };
                    Ok(Value::Unit)
                })
            }
            _ => return Err(BindError::internal("global-variable stage reached a non-accessor unit")),
        };
        Ok(Generated::Terminal(Binding::Method(binding)))
    }
}
