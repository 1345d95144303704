//! Sized-collection return wrapper.

use dlbind_core::{CollectionLength, TypeDesc, Value};
use dlbind_marshal::memory::{free_native, read_scalar};
use dlbind_marshal::NativeType;

use crate::complexity::GeneratorComplexity;
use crate::error::{BindError, Result};
use crate::pipeline::{BindingContext, BindingGenerator, Generated};
use crate::unit::{invoker, Binding, Invocation, WorkUnit};

use super::method_invoker;

/// A returned collection crosses as a pointer to its first element.
///
/// The element count comes from the declaration: either a literal or the
/// result of calling another zero-argument member of the same instance.
/// A null pointer yields an empty collection.
#[derive(Debug, Default, Clone, Copy)]
pub struct SizedCollectionWrapper;

fn element_length(length: &CollectionLength, member: &str, inv: &Invocation<'_>) -> Result<usize> {
    match length {
        CollectionLength::Fixed(n) => Ok(*n),
        CollectionLength::Member(name) => {
            let count = inv.instance.invoke(name, &mut [])?;
            let raw = count.as_i64().ok_or_else(|| {
                BindError::mismatch(member, format!("length member {name} returned {}", count.kind()))
            })?;
            usize::try_from(raw).map_err(|_| {
                BindError::mismatch(member, format!("length member {name} returned {raw}"))
            })
        }
    }
}

/// Copy `count` elements out of the native array at `address`.
///
/// The count comes from native code, so the span and the allocation are
/// checked before anything is read.
fn read_elements(
    member: &str,
    address: usize,
    count: usize,
    element: NativeType,
    is_bool: bool,
) -> Result<Vec<Value>> {
    let size = element.size();
    if count
        .checked_mul(size)
        .and_then(|bytes| address.checked_add(bytes))
        .is_none()
    {
        return Err(BindError::mismatch(
            member,
            format!("{count} elements of {size} bytes overflow the address space"),
        ));
    }
    let mut items = Vec::new();
    items
        .try_reserve_exact(count)
        .map_err(|err| BindError::mismatch(member, format!("cannot hold {count} elements: {err}")))?;
    for i in 0..count {
        // SAFETY: native code returned `count` contiguous elements and the
        // span was checked above.
        let raw = unsafe { read_scalar(address + i * size, element)? };
        items.push(if is_bool {
            Value::Bool(raw.as_i64().is_some_and(|v| v != 0))
        } else {
            raw
        });
    }
    Ok(items)
}

impl BindingGenerator for SizedCollectionWrapper {
    fn name(&self) -> &'static str {
        "sized-collection"
    }

    fn complexity(&self) -> GeneratorComplexity {
        GeneratorComplexity::MEMBER_DEPENDENT | GeneratorComplexity::TRANSFORMS_PARAMETERS
    }

    fn is_applicable(&self, unit: &WorkUnit, _ctx: &BindingContext) -> bool {
        unit.method()
            .is_some_and(|m| matches!(m.return_type, TypeDesc::Collection(_)))
    }

    fn generate(&self, unit: WorkUnit, _ctx: &BindingContext) -> Result<Generated> {
        let method = unit
            .method()
            .cloned()
            .ok_or_else(|| BindError::internal("sized-collection stage reached a non-method unit"))?;
        let TypeDesc::Collection(element) = &method.return_type else {
            return Err(BindError::internal("sized-collection stage reached a non-collection return"));
        };
        let length = method.collection_length.clone().ok_or_else(|| {
            BindError::mismatch(&method.name, "returned collection has no length")
        })?;
        let is_bool = **element == TypeDesc::Bool;
        let element_type = if is_bool {
            NativeType::of(&method.return_marshal.bool_encoding.native_type())?
        } else if element.is_primitive() {
            NativeType::of(element)?
        } else {
            return Err(BindError::UnsupportedType {
                ty: method.return_type.to_string(),
            });
        };
        let frees = method.return_marshal.frees_return();

        let mut lowered = method.clone();
        lowered.return_type = TypeDesc::Pointer;
        lowered.collection_length = None;

        Ok(Generated::wrap(unit.with_method(lowered), move |inner| {
            let inner = method_invoker(inner)?;
            Ok(Binding::Method(invoker(move |inv, args| {
                let address = match inner(inv, args)? {
                    Value::Ptr(address) => address,
                    other => {
                        return Err(BindError::internal(format!(
                            "collection pointer came back as {}",
                            other.kind()
                        )))
                    }
                };
                if address == 0 {
                    return Ok(Value::Collection(Vec::new()));
                }

                let items = element_length(&length, &method.name, inv).and_then(|count| {
                    read_elements(&method.name, address, count, element_type, is_bool)
                });
                if frees {
                    // SAFETY: caller-frees returns come from the C allocator.
                    unsafe { free_native(address) };
                }
                Ok(Value::Collection(items?))
            })))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static BYTES: [u8; 4] = [0, 1, 0, 7];

    #[test]
    fn elements_are_copied_in_order() {
        let address = BYTES.as_ptr() as usize;
        let items = read_elements("Flags", address, 4, NativeType::U8, true).unwrap();
        assert_eq!(
            items,
            [Value::Bool(false), Value::Bool(true), Value::Bool(false), Value::Bool(true)]
        );
        let raw = read_elements("Bytes", address, 2, NativeType::U8, false).unwrap();
        assert_eq!(raw, [Value::U8(0), Value::U8(1)]);
    }

    #[test]
    fn oversized_length_is_rejected_before_reading() {
        let address = BYTES.as_ptr() as usize;
        let err = read_elements("Bytes", address, usize::MAX / 2, NativeType::I32, false).unwrap_err();
        assert!(matches!(err, BindError::ArgumentMismatch { member, .. } if member == "Bytes"));
        let err = read_elements("Bytes", address, usize::MAX - address + 1, NativeType::U8, false).unwrap_err();
        assert!(matches!(err, BindError::ArgumentMismatch { .. }));
    }
}
