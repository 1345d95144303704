//! Callback parameters and their delegate lifetime.

use std::sync::Arc;

use dlbind_core::{Callback, DelegateLifetime, MethodDeclaration, Parameter, Passing, TypeDesc, Value};

use crate::complexity::GeneratorComplexity;
use crate::error::{BindError, Result};
use crate::pipeline::{BindingContext, BindingGenerator, Generated};
use crate::unit::{invoker, Binding, WorkUnit};

use super::{check_arity, copy_back, method_invoker};

/// Passes function-pointer parameters as plain addresses and keeps each
/// [`Callback`] argument alive for its method's delegate lifetime.
///
/// - `Persistent` callbacks are held by the instance until it is disposed.
/// - `CallOnly` callbacks are held until the native call returns.
/// - `UserManaged` callbacks are not held at all.
///
/// A raw [`Value::Ptr`] is passed through under every lifetime.
#[derive(Debug, Default, Clone, Copy)]
pub struct CallbackMarshaller;

fn is_callback(param: &Parameter) -> bool {
    param.ty == TypeDesc::FunctionPointer && matches!(param.passing, Passing::Value)
}

fn has_callback(method: &MethodDeclaration) -> bool {
    method.parameters.iter().any(is_callback)
}

impl BindingGenerator for CallbackMarshaller {
    fn name(&self) -> &'static str {
        "callback"
    }

    fn complexity(&self) -> GeneratorComplexity {
        GeneratorComplexity::MEMBER_DEPENDENT | GeneratorComplexity::TRANSFORMS_PARAMETERS
    }

    fn is_applicable(&self, unit: &WorkUnit, _ctx: &BindingContext) -> bool {
        unit.method().is_some_and(has_callback)
    }

    fn generate(&self, unit: WorkUnit, ctx: &BindingContext) -> Result<Generated> {
        let method = unit
            .method()
            .cloned()
            .ok_or_else(|| BindError::internal("callback stage reached a non-method unit"))?;
        let lifetime = method.delegate_lifetime.unwrap_or_default();
        let slots: Vec<bool> = method.parameters.iter().map(is_callback).collect();

        let mut lowered = method.clone();
        for (param, &slot) in lowered.parameters.iter_mut().zip(&slots) {
            if slot {
                param.ty = TypeDesc::Pointer;
            }
        }
        let library = Arc::clone(&ctx.library);

        Ok(Generated::wrap(unit.with_method(lowered), move |inner| {
            let inner = method_invoker(inner)?;
            Ok(Binding::Method(invoker(move |inv, args| {
                check_arity(&method.name, &method.parameters, args)?;
                let mut pinned: Vec<Callback> = Vec::new();
                let mut native = args.to_vec();
                for (i, value) in native.iter_mut().enumerate() {
                    if !slots[i] {
                        continue;
                    }
                    let address = match value {
                        Value::Ptr(address) => *address,
                        Value::Callback(callback) => {
                            match lifetime {
                                DelegateLifetime::Persistent => library.retain(callback),
                                DelegateLifetime::CallOnly => pinned.push(callback.clone()),
                                DelegateLifetime::UserManaged => {}
                            }
                            callback.address()
                        }
                        other => {
                            return Err(BindError::mismatch(
                                &method.name,
                                format!(
                                    "parameter {} expected a callback, found {}",
                                    method.parameters[i].name,
                                    other.kind()
                                ),
                            ))
                        }
                    };
                    *value = Value::Ptr(address);
                }
                if !pinned.is_empty() {
                    tracing::trace!(target: "dlbind::bind", member = method.name.as_str(), count = pinned.len(), "pinned call-only callbacks");
                }

                let ret = inner(inv, &mut native);
                drop(pinned);
                let ret = ret?;
                copy_back(&method.parameters, args, native, |_, value| Ok(value))?;
                Ok(ret)
            })))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_by_value_function_pointers_are_callbacks() {
        let method = MethodDeclaration::new("Apply", TypeDesc::I32)
            .with_param(Parameter::new("f", TypeDesc::FunctionPointer))
            .with_param(Parameter::new("slot", TypeDesc::FunctionPointer).passing(Passing::Ref))
            .with_param(Parameter::new("v", TypeDesc::I32));
        let flags: Vec<bool> = method.parameters.iter().map(is_callback).collect();
        assert_eq!(flags, [true, false, false]);
        assert!(has_callback(&method));
        assert!(!has_callback(&MethodDeclaration::new("Plain", TypeDesc::Void)));
    }

    #[test]
    fn untagged_methods_hold_callbacks_persistently() {
        let method = MethodDeclaration::new("Apply", TypeDesc::Void);
        assert_eq!(method.delegate_lifetime.unwrap_or_default(), DelegateLifetime::Persistent);
    }
}
