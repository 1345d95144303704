//! Shared machinery of the terminating call stages.

use std::sync::Arc;

use dlbind_core::{MethodDeclaration, Parameter, Passing, Value};
use dlbind_marshal::{CallFrame, CallSignature, NativeType};
use once_cell::sync::OnceCell;

use crate::error::{BindError, Result};
use crate::library::LibraryState;
use crate::pipeline::BindingContext;
use crate::unit::{SymbolTarget, WorkUnit};

use super::check_arity;

/// A unit's symbol, resolved at bind time or on first use.
#[derive(Debug)]
pub(crate) struct SymbolSlot {
    member: String,
    symbol: SymbolTarget,
    library: Arc<LibraryState>,
    address: OnceCell<usize>,
}

impl SymbolSlot {
    /// Eager binding resolves here and fails naming member and symbol.
    pub(crate) fn new(unit: &WorkUnit, ctx: &BindingContext) -> Result<Self> {
        let slot = Self {
            member: unit.name().to_string(),
            symbol: unit.symbol.clone(),
            library: Arc::clone(&ctx.library),
            address: OnceCell::new(),
        };
        if !ctx.is_lazy() {
            slot.address()?;
        }
        Ok(slot)
    }

    pub(crate) fn address(&self) -> Result<usize> {
        self.address
            .get_or_try_init(|| {
                let address = self
                    .library
                    .resolve(&self.symbol)
                    .map_err(|err| BindError::symbol(&self.member, &self.symbol.name, err))?;
                tracing::debug!(
                    target: "dlbind::bind",
                    member = self.member.as_str(),
                    symbol = %self.symbol,
                    address = format_args!("{:#x}", address.as_usize()),
                    "resolved symbol"
                );
                Ok(address.as_usize())
            })
            .copied()
    }

    pub(crate) fn member(&self) -> &str {
        &self.member
    }
}

/// Primitive call shape of a fully lowered method.
///
/// By-reference parameters cross as pointers to cells owned by the call.
#[derive(Debug, Clone)]
pub(crate) struct CallPlan {
    member: String,
    parameters: Vec<Parameter>,
    slots: Vec<NativeType>,
    signature: CallSignature,
}

impl CallPlan {
    pub(crate) fn new(method: &MethodDeclaration) -> Result<Self> {
        let slots = method
            .parameters
            .iter()
            .map(|p| NativeType::of(&p.ty))
            .collect::<dlbind_marshal::Result<Vec<_>>>()?;
        let params = method
            .parameters
            .iter()
            .zip(&slots)
            .map(|(p, ty)| if p.passing.is_by_ref() { NativeType::Pointer } else { *ty })
            .collect();
        let ret = NativeType::of(&method.return_type)?;
        Ok(Self {
            member: method.name.clone(),
            parameters: method.parameters.clone(),
            slots,
            signature: CallSignature::new(params, ret),
        })
    }

    pub(crate) fn signature(&self) -> &CallSignature {
        &self.signature
    }

    /// Run `call` with by-reference arguments placed in cells, then copy
    /// the cells back.
    pub(crate) fn invoke(
        &self,
        args: &mut [Value],
        call: impl FnOnce(&[Value]) -> Result<Value>,
    ) -> Result<Value> {
        check_arity(&self.member, &self.parameters, args)?;
        let mut frame = CallFrame::new();
        let mut cells = Vec::new();
        let mut native = Vec::with_capacity(args.len());
        for (i, (param, arg)) in self.parameters.iter().zip(args.iter()).enumerate() {
            let ty = self.slots[i];
            match param.passing {
                Passing::Value => native.push(arg.clone()),
                Passing::Out => {
                    let id = frame.zeroed_cell(ty);
                    native.push(Value::Ptr(frame.address(id)));
                    cells.push((i, id));
                }
                Passing::Ref | Passing::In => {
                    let id = frame.cell(ty, arg)?;
                    native.push(Value::Ptr(frame.address(id)));
                    cells.push((i, id));
                }
            }
        }

        let ret = call(&native)?;

        for (i, id) in cells {
            if self.parameters[i].passing.copies_back() {
                args[i] = frame.read(id)?;
            }
        }
        Ok(ret)
    }
}
