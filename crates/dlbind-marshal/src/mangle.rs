//! Entry-point manglers and the mangler registry.
//!
//! After the naming policy has produced a symbol, at most one mangler may
//! decorate it. A member for which two manglers apply cannot be bound.

use std::fmt;
use std::sync::Arc;

use dlbind_core::{CallingConvention, GenericMangling, MethodDeclaration, TypeDesc};
use dlbind_targets::{OperatingSystem, Platform, WordSize};
use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::error::{MarshalError, Result};

/// What a mangler needs to know about the member being bound.
#[derive(Debug, Clone, Copy)]
pub struct ManglerContext<'a> {
    pub method: &'a MethodDeclaration,
    /// Effective calling convention (declaration, else contract default).
    pub convention: CallingConvention,
    pub platform: Platform,
}

/// Decorates symbol names according to some platform or language scheme.
pub trait Mangler: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn is_applicable(&self, ctx: &ManglerContext<'_>) -> bool;

    fn mangle(&self, symbol: &str, ctx: &ManglerContext<'_>) -> Result<String>;

    fn demangle(&self, symbol: &str) -> Result<String>;
}

/// Shared handle to a registered mangler.
pub type SharedMangler = Arc<dyn Mangler>;

/// 32-bit Windows stdcall decoration: `_name@N`.
///
/// `N` is the argument stack size: every parameter takes its native size
/// rounded up to a four-byte slot, and by-reference or pointer-like
/// parameters take the pointer width.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdCallMangler;

const STACK_SLOT: u32 = 4;

impl StdCallMangler {
    /// Bytes the parameters occupy on the stack.
    pub fn argument_stack_size(method: &MethodDeclaration, pointer_size: u32) -> Result<u32> {
        method.parameters.iter().try_fold(0u32, |total, param| {
            let size = if param.passing.is_by_ref() {
                pointer_size
            } else {
                match &param.ty {
                    TypeDesc::Bool => param.marshal.bool_encoding.size(),
                    ty => ty
                        .native_size(pointer_size)
                        .ok_or_else(|| MarshalError::unsupported(ty))?,
                }
            };
            Ok(total + size.div_ceil(STACK_SLOT) * STACK_SLOT)
        })
    }
}

impl Mangler for StdCallMangler {
    fn name(&self) -> &'static str {
        "stdcall"
    }

    fn is_applicable(&self, ctx: &ManglerContext<'_>) -> bool {
        ctx.convention.is_stdcall_family()
            && ctx.platform.os == OperatingSystem::Windows
            && ctx.platform.word_size == WordSize::Word32
    }

    fn mangle(&self, symbol: &str, ctx: &ManglerContext<'_>) -> Result<String> {
        let size = Self::argument_stack_size(ctx.method, ctx.platform.pointer_size())?;
        Ok(format!("_{symbol}@{size}"))
    }

    fn demangle(&self, symbol: &str) -> Result<String> {
        let malformed = |detail: &str| MarshalError::Demangle {
            symbol: symbol.to_string(),
            detail: detail.to_string(),
        };
        let body = symbol
            .strip_prefix('_')
            .ok_or_else(|| malformed("missing leading underscore"))?;
        let (name, size) = body
            .rsplit_once('@')
            .ok_or_else(|| malformed("missing @ suffix"))?;
        if name.is_empty() || size.is_empty() || !size.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed("suffix is not a stack size"));
        }
        Ok(name.to_string())
    }
}

/// Appends a short code per generic type argument.
///
/// Codes: `f32` f, `f64` d, `i8` sb, `u8` b, `i16` s, `i32` i, `i64` l; the
/// wider unsigned types take their signed code plus `u`. Other value types
/// append `st` and pointer-like types append `v`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleGenericMangler;

impl SimpleGenericMangler {
    fn suffix(ty: &TypeDesc) -> &'static str {
        match ty {
            TypeDesc::F32 => "f",
            TypeDesc::F64 => "d",
            TypeDesc::I8 => "sb",
            TypeDesc::U8 => "b",
            TypeDesc::I16 => "s",
            TypeDesc::U16 => "su",
            TypeDesc::I32 => "i",
            TypeDesc::U32 => "iu",
            TypeDesc::I64 => "l",
            TypeDesc::U64 => "lu",
            TypeDesc::Pointer | TypeDesc::FunctionPointer => "v",
            TypeDesc::Enum { .. } | TypeDesc::Nullable(_) => "st",
            _ => "",
        }
    }
}

impl Mangler for SimpleGenericMangler {
    fn name(&self) -> &'static str {
        "simple-generic"
    }

    fn is_applicable(&self, ctx: &ManglerContext<'_>) -> bool {
        ctx.method.is_closed_generic() && ctx.method.generic_mangling == GenericMangling::Simple
    }

    fn mangle(&self, symbol: &str, ctx: &ManglerContext<'_>) -> Result<String> {
        let mut out = symbol.to_string();
        for arg in &ctx.method.generic_args {
            out.push_str(Self::suffix(arg));
        }
        Ok(out)
    }

    fn demangle(&self, symbol: &str) -> Result<String> {
        Err(MarshalError::Demangle {
            symbol: symbol.to_string(),
            detail: "generic suffixes are not reversible".to_string(),
        })
    }
}

/// Manglers consulted for every bound method.
#[derive(Debug)]
pub struct ManglerRegistry {
    manglers: RwLock<Vec<SharedMangler>>,
}

static GLOBAL: Lazy<ManglerRegistry> = Lazy::new(ManglerRegistry::new);

impl ManglerRegistry {
    /// A registry holding the stdcall and simple-generic manglers.
    pub fn new() -> Self {
        let registry = Self::empty();
        registry.register(Arc::new(StdCallMangler));
        registry.register(Arc::new(SimpleGenericMangler));
        registry
    }

    pub fn empty() -> Self {
        Self {
            manglers: RwLock::new(Vec::new()),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static ManglerRegistry {
        &GLOBAL
    }

    /// Register a mangler. Returns `false` if one with the same name exists.
    pub fn register(&self, mangler: SharedMangler) -> bool {
        let mut manglers = self.manglers.write();
        if manglers.iter().any(|m| m.name() == mangler.name()) {
            return false;
        }
        manglers.push(mangler);
        true
    }

    /// Every mangler that applies to `ctx`.
    pub fn applicable(&self, ctx: &ManglerContext<'_>) -> Vec<SharedMangler> {
        self.manglers
            .read()
            .iter()
            .filter(|m| m.is_applicable(ctx))
            .cloned()
            .collect()
    }

    /// Mangle `symbol` with the single applicable mangler, if any.
    pub fn mangle(&self, symbol: &str, ctx: &ManglerContext<'_>) -> Result<String> {
        let applicable = self.applicable(ctx);
        match applicable.as_slice() {
            [] => Ok(symbol.to_string()),
            [mangler] => {
                let mangled = mangler.mangle(symbol, ctx)?;
                tracing::debug!(
                    target: "dlbind::mangle",
                    symbol,
                    mangled = mangled.as_str(),
                    mangler = mangler.name(),
                    "mangled entry point"
                );
                Ok(mangled)
            }
            many => Err(MarshalError::AmbiguousMangler {
                symbol: symbol.to_string(),
                detail: many.iter().map(|m| m.name()).collect::<Vec<_>>().join(", "),
            }),
        }
    }
}

impl Default for ManglerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlbind_core::{BoolEncoding, MarshalInfo, Parameter, Passing};

    fn method() -> MethodDeclaration {
        MethodDeclaration::new("Multiply", TypeDesc::I32)
            .with_param(Parameter::new("a", TypeDesc::I32))
            .with_param(Parameter::new("b", TypeDesc::I32))
    }

    fn ctx<'a>(method: &'a MethodDeclaration, convention: CallingConvention, platform: Platform) -> ManglerContext<'a> {
        ManglerContext {
            method,
            convention,
            platform,
        }
    }

    #[test]
    fn stdcall_applies_only_to_32_bit_windows() {
        let m = method();
        let mangler = StdCallMangler;
        assert!(mangler.is_applicable(&ctx(&m, CallingConvention::StdCall, Platform::windows_x86())));
        assert!(!mangler.is_applicable(&ctx(&m, CallingConvention::StdCall, Platform::windows_x86_64())));
        assert!(!mangler.is_applicable(&ctx(&m, CallingConvention::StdCall, Platform::linux_x86_64())));
        assert!(!mangler.is_applicable(&ctx(&m, CallingConvention::Cdecl, Platform::windows_x86())));
    }

    #[test]
    fn stdcall_stack_sizes() {
        let m = method();
        let c = ctx(&m, CallingConvention::StdCall, Platform::windows_x86());
        assert_eq!(StdCallMangler.mangle("Multiply", &c).unwrap(), "_Multiply@8");

        let m = MethodDeclaration::new("Mixed", TypeDesc::Void)
            .with_param(Parameter::new("a", TypeDesc::F64))
            .with_param(Parameter::new("b", TypeDesc::U8))
            .with_param(Parameter::new("c", TypeDesc::Text))
            .with_param(Parameter::new("d", TypeDesc::I64).passing(Passing::Ref))
            .with_param(
                Parameter::new("e", TypeDesc::Bool)
                    .marshal(MarshalInfo::default().with_bool(BoolEncoding::VariantBool)),
            );
        let c = ctx(&m, CallingConvention::StdCall, Platform::windows_x86());
        // 8 + 4 + 4 + 4 + 4
        assert_eq!(StdCallMangler.mangle("Mixed", &c).unwrap(), "_Mixed@24");
    }

    #[test]
    fn stdcall_demangle() {
        assert_eq!(StdCallMangler.demangle("_Multiply@8").unwrap(), "Multiply");
        assert_eq!(StdCallMangler.demangle("_a@b@12").unwrap(), "a@b");
        assert!(StdCallMangler.demangle("Multiply@8").is_err());
        assert!(StdCallMangler.demangle("_Multiply").is_err());
        assert!(StdCallMangler.demangle("_Multiply@x").is_err());
    }

    #[test]
    fn simple_generic_suffixes() {
        let open = MethodDeclaration::new("Sum", TypeDesc::generic("T"))
            .with_param(Parameter::new("a", TypeDesc::generic("T")))
            .with_generic_params(&["T", "U"])
            .with_generic_mangling(GenericMangling::Simple);
        let closed = open.close(&[TypeDesc::F32, TypeDesc::U32]).unwrap();
        let c = ctx(&closed, CallingConvention::Cdecl, Platform::linux_x86_64());
        assert!(SimpleGenericMangler.is_applicable(&c));
        assert_eq!(SimpleGenericMangler.mangle("Sum", &c).unwrap(), "Sumfiu");

        let c = ctx(&open, CallingConvention::Cdecl, Platform::linux_x86_64());
        assert!(!SimpleGenericMangler.is_applicable(&c));
        assert!(SimpleGenericMangler.demangle("Sumf").is_err());
    }

    #[test]
    fn registry_applies_single_mangler() {
        let registry = ManglerRegistry::new();
        let m = method();
        let c = ctx(&m, CallingConvention::Winapi, Platform::windows_x86());
        assert_eq!(registry.mangle("Multiply", &c).unwrap(), "_Multiply@8");
        let c = ctx(&m, CallingConvention::Cdecl, Platform::windows_x86());
        assert_eq!(registry.mangle("Multiply", &c).unwrap(), "Multiply");
    }

    #[test]
    fn registry_reports_ambiguity() {
        let registry = ManglerRegistry::new();
        let closed = MethodDeclaration::new("Id", TypeDesc::generic("T"))
            .with_param(Parameter::new("x", TypeDesc::generic("T")))
            .with_generic_params(&["T"])
            .with_generic_mangling(GenericMangling::Simple)
            .close(&[TypeDesc::I32])
            .unwrap();
        let c = ctx(&closed, CallingConvention::StdCall, Platform::windows_x86());
        assert_eq!(registry.applicable(&c).len(), 2);
        assert!(matches!(
            registry.mangle("Id", &c),
            Err(MarshalError::AmbiguousMangler { .. })
        ));
    }

    #[test]
    fn registry_first_write_wins() {
        let registry = ManglerRegistry::new();
        assert!(!registry.register(Arc::new(StdCallMangler)));
        let empty = ManglerRegistry::empty();
        assert!(empty.register(Arc::new(StdCallMangler)));
    }
}
