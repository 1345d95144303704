//! Expansion of optional by-reference parameters.
//!
//! A method with `N` by-reference nullable parameters is replaced by `2^N`
//! variants over the same symbol. In variant `mask`, parameter `k` (in
//! declaration order among the optional ones) is passed as a reference to
//! its payload when bit `k` is set and as a null pointer otherwise.

use dlbind_core::{MethodDeclaration, Passing, TypeDesc, Value};

use crate::complexity::GeneratorComplexity;
use crate::error::{BindError, Result};
use crate::pipeline::{BindingContext, BindingGenerator, Generated};
use crate::unit::{invoker, Binding, WorkUnit};

use super::{check_arity, method_invoker};

#[derive(Debug, Default, Clone, Copy)]
pub struct RefPermutationGenerator;

/// Variant of `method` for one presence mask over `optional`.
pub fn permutation(method: &MethodDeclaration, optional: &[usize], mask: usize) -> Result<MethodDeclaration> {
    let mut variant = method.clone();
    for (bit, &index) in optional.iter().enumerate() {
        let param = &mut variant.parameters[index];
        let TypeDesc::Nullable(inner) = &param.ty else {
            return Err(BindError::internal(format!(
                "parameter {} of {} is not nullable",
                param.name, method.name
            )));
        };
        if mask & (1 << bit) != 0 {
            param.ty = (**inner).clone();
        } else {
            param.ty = TypeDesc::Pointer;
            param.passing = Passing::Value;
        }
    }
    Ok(variant)
}

/// Presence mask of the caller's arguments: bit `k` is set iff optional
/// parameter `k` has a value.
pub fn presence_mask(member: &str, optional: &[usize], args: &[Value]) -> Result<usize> {
    let mut mask = 0;
    for (bit, &index) in optional.iter().enumerate() {
        match &args[index] {
            Value::Nullable(Some(_)) => mask |= 1 << bit,
            Value::Nullable(None) => {}
            other => {
                return Err(BindError::mismatch(
                    member,
                    format!("argument {index} must be nullable, found {}", other.kind()),
                ))
            }
        }
    }
    Ok(mask)
}

impl BindingGenerator for RefPermutationGenerator {
    fn name(&self) -> &'static str {
        "ref-permutation"
    }

    fn complexity(&self) -> GeneratorComplexity {
        GeneratorComplexity::MEMBER_DEPENDENT | GeneratorComplexity::TRANSFORMS_PARAMETERS
    }

    fn is_applicable(&self, unit: &WorkUnit, _ctx: &BindingContext) -> bool {
        unit.method()
            .is_some_and(|m| !m.optional_by_ref_indices().is_empty())
    }

    fn generate(&self, unit: WorkUnit, _ctx: &BindingContext) -> Result<Generated> {
        let method = unit
            .method()
            .cloned()
            .ok_or_else(|| BindError::internal("permutation stage reached a non-method unit"))?;
        let optional = method.optional_by_ref_indices();
        let count = 1usize
            .checked_shl(optional.len() as u32)
            .ok_or_else(|| BindError::mismatch(&method.name, "too many optional by-reference parameters"))?;
        let units = (0..count)
            .map(|mask| permutation(&method, &optional, mask).map(|m| unit.with_method(m)))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            target: "dlbind::bind",
            member = method.name.as_str(),
            optional = optional.len(),
            permutations = count,
            "expanded optional by-reference parameters"
        );

        Ok(Generated::Expanded {
            units,
            compose: Box::new(move |bindings| {
                let invokers = bindings
                    .into_iter()
                    .map(method_invoker)
                    .collect::<Result<Vec<_>>>()?;
                Ok(Binding::Method(invoker(move |inv, args| {
                    check_arity(&method.name, &method.parameters, args)?;
                    let mask = presence_mask(&method.name, &optional, args)?;
                    let variant = invokers.get(mask).ok_or_else(|| {
                        BindError::internal(format!(
                            "permutation {mask} of {} does not exist ({} generated)",
                            method.name,
                            invokers.len()
                        ))
                    })?;

                    let mut native = args.to_vec();
                    for (bit, &index) in optional.iter().enumerate() {
                        native[index] = match &args[index] {
                            Value::Nullable(Some(payload)) if mask & (1 << bit) != 0 => (**payload).clone(),
                            _ => Value::Ptr(0),
                        };
                    }

                    let result = variant(inv, &mut native)?;

                    for (i, value) in native.into_iter().enumerate() {
                        let param = &method.parameters[i];
                        if !param.passing.copies_back() {
                            continue;
                        }
                        match optional.iter().position(|&o| o == i) {
                            Some(bit) if mask & (1 << bit) != 0 => {
                                args[i] = Value::Nullable(Some(Box::new(value)));
                            }
                            Some(_) => {}
                            None => args[i] = value,
                        }
                    }
                    Ok(result)
                })))
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlbind_core::Parameter;
    use proptest::prelude::*;

    fn blend() -> MethodDeclaration {
        MethodDeclaration::new("Blend", TypeDesc::Void)
            .with_param(Parameter::new("a", TypeDesc::nullable(TypeDesc::I32)).passing(Passing::Ref))
            .with_param(Parameter::new("weight", TypeDesc::F32))
            .with_param(Parameter::new("b", TypeDesc::nullable(TypeDesc::F64)).passing(Passing::Ref))
    }

    #[test]
    fn absent_parameters_become_null_pointers() {
        let method = blend();
        let optional = method.optional_by_ref_indices();
        assert_eq!(optional, [0, 2]);

        let variant = permutation(&method, &optional, 0b01).unwrap();
        assert_eq!(variant.parameters[0].ty, TypeDesc::I32);
        assert_eq!(variant.parameters[0].passing, Passing::Ref);
        assert_eq!(variant.parameters[1], method.parameters[1]);
        assert_eq!(variant.parameters[2].ty, TypeDesc::Pointer);
        assert_eq!(variant.parameters[2].passing, Passing::Value);
        assert_eq!(variant.signature(), "Blend(ref i32, f32, pointer)");
    }

    #[test]
    fn presence_mask_follows_argument_order() {
        let optional = [0, 2];
        let args = [
            Value::Nullable(None),
            Value::F32(0.5),
            Value::Nullable(Some(Box::new(Value::F64(1.0)))),
        ];
        assert_eq!(presence_mask("Blend", &optional, &args).unwrap(), 0b10);

        let wrong = [Value::I32(1), Value::F32(0.5), Value::Nullable(None)];
        assert!(matches!(
            presence_mask("Blend", &optional, &wrong),
            Err(BindError::ArgumentMismatch { .. })
        ));
    }

    proptest! {
        #[test]
        fn each_variant_keeps_exactly_the_present_payloads(mask in 0usize..4) {
            let method = blend();
            let optional = method.optional_by_ref_indices();
            let variant = permutation(&method, &optional, mask).unwrap();
            let present = optional
                .iter()
                .filter(|&&i| variant.parameters[i].ty != TypeDesc::Pointer)
                .count();
            prop_assert_eq!(present, mask.count_ones() as usize);
            prop_assert!(variant.optional_by_ref_indices().is_empty());
        }
    }
}
