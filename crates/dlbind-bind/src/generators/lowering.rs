//! Lowers text and nullable value types through the transformer registry.

use dlbind_core::{MarshalInfo, MethodDeclaration, Passing, TypeDesc};
use dlbind_marshal::{CallFrame, SharedTransformer};

use crate::complexity::GeneratorComplexity;
use crate::error::{BindError, Result};
use crate::pipeline::{BindingContext, BindingGenerator, Generated};
use crate::unit::{invoker, Binding, WorkUnit};

use super::{check_arity, copy_back, method_invoker};

/// By-value text and nullable parameters, and text or nullable returns,
/// cross as pointers.
///
/// Memory allocated for a parameter lives until the call returns unless its
/// free policy gives it to the callee.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoweringGenerator;

fn lowers(ty: &TypeDesc) -> bool {
    matches!(ty, TypeDesc::Text | TypeDesc::Nullable(_))
}

fn applies(method: &MethodDeclaration) -> bool {
    lowers(&method.return_type)
        || method
            .parameters
            .iter()
            .any(|p| p.passing == Passing::Value && lowers(&p.ty))
}

type Lowered = Option<(SharedTransformer, MarshalInfo)>;

impl BindingGenerator for LoweringGenerator {
    fn name(&self) -> &'static str {
        "lowering"
    }

    fn complexity(&self) -> GeneratorComplexity {
        GeneratorComplexity::MEMBER_DEPENDENT | GeneratorComplexity::TRANSFORMS_PARAMETERS
    }

    fn is_applicable(&self, unit: &WorkUnit, _ctx: &BindingContext) -> bool {
        unit.method().is_some_and(applies)
    }

    fn generate(&self, unit: WorkUnit, ctx: &BindingContext) -> Result<Generated> {
        let method = unit
            .method()
            .cloned()
            .ok_or_else(|| BindError::internal("lowering stage reached a non-method unit"))?;
        let registry = ctx.registries.transformers();

        let mut lowered = method.clone();
        let mut params: Vec<Lowered> = Vec::with_capacity(method.parameters.len());
        for param in &mut lowered.parameters {
            if param.passing == Passing::Value && lowers(&param.ty) {
                let transformer = registry.get(&param.ty)?;
                param.ty = TypeDesc::Pointer;
                params.push(Some((transformer, param.marshal.clone())));
            } else {
                params.push(None);
            }
        }
        let ret: Lowered = if lowers(&method.return_type) {
            lowered.return_type = TypeDesc::Pointer;
            Some((registry.get(&method.return_type)?, method.return_marshal.clone()))
        } else {
            None
        };

        tracing::debug!(
            target: "dlbind::bind",
            member = method.name.as_str(),
            parameters = params.iter().flatten().count(),
            lowers_return = ret.is_some(),
            "lowering rich types"
        );

        Ok(Generated::wrap(unit.with_method(lowered), move |inner| {
            let inner = method_invoker(inner)?;
            Ok(Binding::Method(invoker(move |inv, args| {
                check_arity(&method.name, &method.parameters, args)?;
                let mut frame = CallFrame::new();
                let mut native = args.to_vec();
                for (value, lowering) in native.iter_mut().zip(&params) {
                    if let Some((transformer, marshal)) = lowering {
                        *value = transformer.lower(value, marshal, &mut frame)?;
                    }
                }

                let result = inner(inv, &mut native)?;

                copy_back(&method.parameters, args, native, |_, value| Ok(value))?;
                match &ret {
                    Some((transformer, marshal)) => Ok(transformer.raise(&result, marshal)?),
                    None => Ok(result),
                }
            })))
        }))
    }
}
