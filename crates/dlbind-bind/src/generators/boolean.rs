//! Boolean marshalling wrapper.

use dlbind_core::{MarshalInfo, MethodDeclaration, Passing, TypeDesc, Value};
use dlbind_marshal::CallFrame;

use crate::complexity::GeneratorComplexity;
use crate::error::{BindError, Result};
use crate::pipeline::{BindingContext, BindingGenerator, Generated};
use crate::unit::{invoker, Binding, WorkUnit};

use super::{check_arity, copy_back, method_invoker};

/// Replaces boolean parameters, by value or by reference, and boolean
/// returns with the integer type of their declared encoding.
#[derive(Debug, Default, Clone, Copy)]
pub struct BooleanWrapper;

fn has_bool(method: &MethodDeclaration) -> bool {
    method.return_type == TypeDesc::Bool || method.parameter_types().any(|ty| *ty == TypeDesc::Bool)
}

impl BindingGenerator for BooleanWrapper {
    fn name(&self) -> &'static str {
        "boolean"
    }

    fn complexity(&self) -> GeneratorComplexity {
        GeneratorComplexity::MEMBER_DEPENDENT | GeneratorComplexity::TRANSFORMS_PARAMETERS
    }

    fn is_applicable(&self, unit: &WorkUnit, _ctx: &BindingContext) -> bool {
        unit.method().is_some_and(has_bool)
    }

    fn generate(&self, unit: WorkUnit, ctx: &BindingContext) -> Result<Generated> {
        let method = unit
            .method()
            .cloned()
            .ok_or_else(|| BindError::internal("boolean stage reached a non-method unit"))?;
        let transformer = ctx.registries.transformers().get(&TypeDesc::Bool)?;

        let mut lowered = method.clone();
        let mut marshals: Vec<Option<MarshalInfo>> = Vec::with_capacity(method.parameters.len());
        for param in &mut lowered.parameters {
            if param.ty == TypeDesc::Bool {
                param.ty = param.marshal.bool_encoding.native_type();
                marshals.push(Some(param.marshal.clone()));
            } else {
                marshals.push(None);
            }
        }
        let return_marshal = (method.return_type == TypeDesc::Bool).then(|| method.return_marshal.clone());
        if return_marshal.is_some() {
            lowered.return_type = method.return_marshal.bool_encoding.native_type();
        }

        Ok(Generated::wrap(unit.with_method(lowered), move |inner| {
            let inner = method_invoker(inner)?;
            Ok(Binding::Method(invoker(move |inv, args| {
                check_arity(&method.name, &method.parameters, args)?;
                let mut frame = CallFrame::new();
                let mut native = args.to_vec();
                for (i, value) in native.iter_mut().enumerate() {
                    let Some(marshal) = &marshals[i] else {
                        continue;
                    };
                    *value = if matches!(method.parameters[i].passing, Passing::Out) {
                        Value::zero(&marshal.bool_encoding.native_type())
                    } else {
                        transformer.lower(value, marshal, &mut frame)?
                    };
                }

                let ret = inner(inv, &mut native)?;

                copy_back(&method.parameters, args, native, |i, value| match &marshals[i] {
                    Some(marshal) => Ok(transformer.raise(&value, marshal)?),
                    None => Ok(value),
                })?;
                match &return_marshal {
                    Some(marshal) => Ok(transformer.raise(&ret, marshal)?),
                    None => Ok(ret),
                }
            })))
        }))
    }
}
