//! Method, property, and contract declarations.
//!
//! A [`Contract`] is the unit that gets bound to a library. Its members keep
//! their declaration order; that order is the member index used by bound
//! instances to dispatch calls.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{ContractError, Result};
use crate::types::TypeDesc;

/// Native calling convention of a function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallingConvention {
    #[default]
    Cdecl,
    StdCall,
    ThisCall,
    FastCall,
    /// The platform default: stdcall on Windows, cdecl elsewhere.
    Winapi,
}

impl CallingConvention {
    /// Whether this convention decorates symbols the stdcall way on Windows.
    pub fn is_stdcall_family(self) -> bool {
        matches!(self, Self::StdCall | Self::Winapi)
    }
}

/// How a parameter is passed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Passing {
    #[default]
    Value,
    /// By reference, copied in and back out.
    Ref,
    /// By reference, written by the callee only.
    Out,
    /// By reference, read by the callee only.
    In,
}

impl Passing {
    pub fn is_by_ref(self) -> bool {
        !matches!(self, Self::Value)
    }

    /// Whether the callee's writes are copied back to the caller.
    pub fn copies_back(self) -> bool {
        matches!(self, Self::Ref | Self::Out)
    }
}

/// Native representation of a boolean.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BoolEncoding {
    #[default]
    U1,
    I1,
    I2,
    U2,
    I4,
    /// Win32 `BOOL`, a four-byte signed integer.
    Bool,
    U4,
    I8,
    U8,
    /// `VARIANT_BOOL`: two bytes, true is -1.
    VariantBool,
}

impl BoolEncoding {
    /// Width in bytes.
    pub fn size(self) -> u32 {
        match self {
            Self::U1 | Self::I1 => 1,
            Self::I2 | Self::U2 | Self::VariantBool => 2,
            Self::I4 | Self::Bool | Self::U4 => 4,
            Self::I8 | Self::U8 => 8,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            Self::I1 | Self::I2 | Self::I4 | Self::Bool | Self::I8 | Self::VariantBool
        )
    }

    /// Integer written for `true`. Any non-zero value reads back as true.
    pub fn true_value(self) -> i64 {
        match self {
            Self::VariantBool => -1,
            _ => 1,
        }
    }

    /// The integer type this encoding crosses as.
    pub fn native_type(self) -> TypeDesc {
        match self {
            Self::U1 => TypeDesc::U8,
            Self::I1 => TypeDesc::I8,
            Self::I2 | Self::VariantBool => TypeDesc::I16,
            Self::U2 => TypeDesc::U16,
            Self::I4 | Self::Bool => TypeDesc::I32,
            Self::U4 => TypeDesc::U32,
            Self::I8 => TypeDesc::I64,
            Self::U8 => TypeDesc::U64,
        }
    }
}

/// Native representation of a string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StringEncoding {
    /// Single-byte characters, NUL-terminated.
    #[default]
    Ansi,
    Utf8,
    /// Two-byte characters, NUL-terminated.
    Utf16,
    /// UTF-16 on Windows, UTF-8 elsewhere.
    Auto,
    /// Length-prefixed UTF-16.
    BStr,
}

/// Who releases native memory produced for a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FreePolicy {
    /// The binding frees after use.
    CallerFrees,
    /// The native side takes ownership.
    CalleeFrees,
    /// Nobody frees; the memory is owned elsewhere.
    Borrowed,
}

/// Per-parameter (or per-return) marshalling metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MarshalInfo {
    pub bool_encoding: BoolEncoding,
    pub string_encoding: StringEncoding,
    /// Explicit free policy; when absent, parameters are freed after the
    /// call and returned memory is borrowed.
    pub free: Option<FreePolicy>,
}

impl MarshalInfo {
    pub fn with_bool(mut self, encoding: BoolEncoding) -> Self {
        self.bool_encoding = encoding;
        self
    }

    pub fn with_string(mut self, encoding: StringEncoding) -> Self {
        self.string_encoding = encoding;
        self
    }

    pub fn with_free(mut self, policy: FreePolicy) -> Self {
        self.free = Some(policy);
        self
    }

    /// Whether memory for a lowered parameter is released after the call.
    pub fn frees_parameter(&self) -> bool {
        !matches!(self.free, Some(FreePolicy::CalleeFrees | FreePolicy::Borrowed))
    }

    /// Whether returned memory is released after it has been copied out.
    pub fn frees_return(&self) -> bool {
        matches!(self.free, Some(FreePolicy::CallerFrees))
    }
}

/// One method parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Parameter {
    pub name: String,
    pub ty: TypeDesc,
    #[serde(default)]
    pub passing: Passing,
    #[serde(default)]
    pub marshal: MarshalInfo,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: TypeDesc) -> Self {
        Self {
            name: name.into(),
            ty,
            passing: Passing::Value,
            marshal: MarshalInfo::default(),
        }
    }

    pub fn passing(mut self, passing: Passing) -> Self {
        self.passing = passing;
        self
    }

    pub fn marshal(mut self, marshal: MarshalInfo) -> Self {
        self.marshal = marshal;
        self
    }

    /// A by-reference nullable value type, which may be passed as null.
    pub fn is_optional_by_ref(&self) -> bool {
        self.passing.is_by_ref() && self.ty.is_nullable_value()
    }
}

/// Length of a returned collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollectionLength {
    /// A literal element count.
    Fixed(usize),
    /// Read the count by calling another zero-argument integer method.
    Member(String),
}

/// How long a callback handed to native code must stay valid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DelegateLifetime {
    /// The caller keeps the callback alive; the binding holds nothing.
    UserManaged,
    /// Held by the instance until it is disposed.
    #[default]
    Persistent,
    /// Held for the duration of the call only.
    CallOnly,
}

/// How closed generic specializations are named natively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GenericMangling {
    /// Every specialization binds the unmodified symbol.
    #[default]
    None,
    /// Append a short code per type argument.
    Simple,
}

/// A method bound to a native function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MethodDeclaration {
    pub name: String,
    #[serde(default = "void")]
    pub return_type: TypeDesc,
    #[serde(default)]
    pub return_marshal: MarshalInfo,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub convention: Option<CallingConvention>,
    #[serde(default)]
    pub entry_point: Option<String>,
    #[serde(default)]
    pub collection_length: Option<CollectionLength>,
    /// Open type parameter names.
    #[serde(default)]
    pub generic_params: Vec<String>,
    /// Type arguments of a closed specialization, in parameter order.
    #[serde(default)]
    pub generic_args: Vec<TypeDesc>,
    #[serde(default)]
    pub delegate_lifetime: Option<DelegateLifetime>,
    #[serde(default)]
    pub generic_mangling: GenericMangling,
}

fn void() -> TypeDesc {
    TypeDesc::Void
}

impl MethodDeclaration {
    pub fn new(name: impl Into<String>, return_type: TypeDesc) -> Self {
        Self {
            name: name.into(),
            return_type,
            return_marshal: MarshalInfo::default(),
            parameters: Vec::new(),
            convention: None,
            entry_point: None,
            collection_length: None,
            generic_params: Vec::new(),
            generic_args: Vec::new(),
            delegate_lifetime: None,
            generic_mangling: GenericMangling::None,
        }
    }

    /// Symbol name before prefixing, transformation, and mangling.
    pub fn entry_name(&self) -> &str {
        self.entry_point.as_deref().unwrap_or(&self.name)
    }

    /// Whether the method declares type parameters it has not been closed over.
    pub fn is_open_generic(&self) -> bool {
        !self.generic_params.is_empty() && self.generic_args.is_empty()
    }

    /// Whether this is a closed specialization of a generic method.
    pub fn is_closed_generic(&self) -> bool {
        !self.generic_params.is_empty() && self.generic_args.len() == self.generic_params.len()
    }

    /// Calling convention, falling back to the contract default.
    pub fn convention_or(&self, default: CallingConvention) -> CallingConvention {
        self.convention.unwrap_or(default)
    }

    pub fn parameter_types(&self) -> impl Iterator<Item = &TypeDesc> + '_ {
        self.parameters.iter().map(|p| &p.ty)
    }

    /// Indices of by-reference nullable parameters, in declaration order.
    pub fn optional_by_ref_indices(&self) -> Vec<usize> {
        self.parameters
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_optional_by_ref())
            .map(|(i, _)| i)
            .collect()
    }

    /// Signature text used for duplicate detection: `name(t1, t2)`.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .parameters
            .iter()
            .map(|p| match p.passing {
                Passing::Value => p.ty.to_string(),
                passing => format!("{}{}", passing_tag(passing), p.ty),
            })
            .collect();
        format!("{}({})", self.name, params.join(", "))
    }

    /// Close an open generic method over `args`.
    pub fn close(&self, args: &[TypeDesc]) -> Result<MethodDeclaration> {
        if args.len() != self.generic_params.len() {
            return Err(ContractError::InvalidDeclaration {
                member: self.name.clone(),
                detail: format!(
                    "expected {} type arguments, got {}",
                    self.generic_params.len(),
                    args.len()
                ),
            });
        }
        if let Some(open) = args.iter().find(|a| a.contains_generic()) {
            return Err(ContractError::InvalidDeclaration {
                member: self.name.clone(),
                detail: format!("type argument {open} is not closed"),
            });
        }

        let bindings: HashMap<String, TypeDesc> = self
            .generic_params
            .iter()
            .cloned()
            .zip(args.iter().cloned())
            .collect();

        let mut closed = self.clone();
        closed.return_type = self.return_type.substitute(&bindings);
        for param in &mut closed.parameters {
            param.ty = param.ty.substitute(&bindings);
        }
        closed.generic_args = args.to_vec();
        Ok(closed)
    }
}

fn passing_tag(passing: Passing) -> &'static str {
    match passing {
        Passing::Value => "",
        Passing::Ref => "ref ",
        Passing::Out => "out ",
        Passing::In => "in ",
    }
}

/// A property bound to a native global variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PropertyDeclaration {
    pub name: String,
    pub ty: TypeDesc,
    #[serde(default = "enabled")]
    pub getter: bool,
    #[serde(default = "enabled")]
    pub setter: bool,
    /// Symbol read by the getter (and written by the setter unless overridden).
    #[serde(default)]
    pub entry_point: Option<String>,
    #[serde(default)]
    pub setter_entry_point: Option<String>,
}

fn enabled() -> bool {
    true
}

impl PropertyDeclaration {
    pub fn new(name: impl Into<String>, ty: TypeDesc) -> Self {
        Self {
            name: name.into(),
            ty,
            getter: true,
            setter: true,
            entry_point: None,
            setter_entry_point: None,
        }
    }

    /// Getter symbol before naming policy.
    pub fn entry_name(&self) -> &str {
        self.entry_point.as_deref().unwrap_or(&self.name)
    }

    /// Setter symbol before naming policy.
    pub fn setter_entry_name(&self) -> &str {
        self.setter_entry_point
            .as_deref()
            .unwrap_or_else(|| self.entry_name())
    }
}

/// One member of a contract.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Member {
    Method(MethodDeclaration),
    Property(PropertyDeclaration),
}

impl Member {
    pub fn name(&self) -> &str {
        match self {
            Self::Method(m) => &m.name,
            Self::Property(p) => &p.name,
        }
    }

    pub fn as_method(&self) -> Option<&MethodDeclaration> {
        match self {
            Self::Method(m) => Some(m),
            Self::Property(_) => None,
        }
    }

    pub fn as_property(&self) -> Option<&PropertyDeclaration> {
        match self {
            Self::Property(p) => Some(p),
            Self::Method(_) => None,
        }
    }
}

/// Text transformation applied to symbol names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SymbolTransform {
    #[default]
    None,
    /// `some_name` -> `SomeName`
    Pascalize,
    /// `some_name` -> `someName`
    Camelize,
    /// `SomeName` -> `some_name`
    Underscore,
    /// `some_name` -> `some-name`
    Dasherize,
    /// `SomeName` -> `some-name`
    Kebaberize,
}

/// Contract-wide symbol naming policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SymbolNaming {
    pub prefix: String,
    pub transform: SymbolTransform,
}

/// A declarative description of a native API.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Contract {
    pub name: String,
    #[serde(default)]
    pub default_convention: CallingConvention,
    #[serde(default)]
    pub naming: SymbolNaming,
    #[serde(default, rename = "member")]
    pub members: Vec<Member>,
}

impl Contract {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_convention: CallingConvention::default(),
            naming: SymbolNaming::default(),
            members: Vec::new(),
        }
    }

    /// Parse and validate a contract written in TOML.
    pub fn from_toml(input: &str) -> Result<Self> {
        let contract: Self = toml::from_str(input)?;
        contract.validate()?;
        Ok(contract)
    }

    pub fn member(&self, index: usize) -> Option<&Member> {
        self.members.get(index)
    }

    /// Index of the first member with the given name.
    pub fn member_index(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|m| m.name() == name)
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodDeclaration> + '_ {
        self.members.iter().filter_map(Member::as_method)
    }

    pub fn properties(&self) -> impl Iterator<Item = &PropertyDeclaration> + '_ {
        self.members.iter().filter_map(Member::as_property)
    }

    /// SHA-256 over the contract's JSON form, as lowercase hex.
    ///
    /// Contracts declared independently with the same members in the same
    /// order share a fingerprint.
    pub fn fingerprint(&self) -> Result<String> {
        let json = serde_json::to_vec(self)?;
        Ok(format!("{:x}", Sha256::digest(&json)))
    }

    /// Check the contract for conflicting or inconsistent declarations.
    pub fn validate(&self) -> Result<()> {
        let mut signatures = HashSet::new();
        let mut properties = HashSet::new();

        for member in &self.members {
            match member {
                Member::Method(method) => {
                    self.validate_method(method)?;
                    if method.entry_point.is_none() && !signatures.insert(method.signature()) {
                        return Err(ContractError::DuplicateSignature {
                            contract: self.name.clone(),
                            signature: method.signature(),
                        });
                    }
                }
                Member::Property(property) => {
                    if !property.getter && !property.setter {
                        return Err(invalid(&property.name, "property has neither getter nor setter"));
                    }
                    if matches!(property.ty, TypeDesc::Void | TypeDesc::Collection(_)) {
                        return Err(invalid(
                            &property.name,
                            format!("property type {} cannot back a global variable", property.ty),
                        ));
                    }
                    if !properties.insert(property.name.as_str()) {
                        return Err(ContractError::DuplicateSignature {
                            contract: self.name.clone(),
                            signature: property.name.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn validate_method(&self, method: &MethodDeclaration) -> Result<()> {
        if method.name.is_empty() {
            return Err(invalid("<unnamed>", "method name is empty"));
        }
        if !method.generic_args.is_empty() && !method.is_closed_generic() {
            return Err(invalid(&method.name, "generic argument count does not match parameters"));
        }
        if let Some(param) = method
            .parameters
            .iter()
            .find(|p| matches!(p.ty, TypeDesc::Void | TypeDesc::Collection(_)))
        {
            return Err(invalid(
                &method.name,
                format!("parameter {} cannot have type {}", param.name, param.ty),
            ));
        }
        for param in &method.parameters {
            if let TypeDesc::Generic(name) = &param.ty {
                if !method.generic_params.contains(name) {
                    return Err(invalid(&method.name, format!("unknown type parameter {name}")));
                }
            }
        }

        match (&method.return_type, &method.collection_length) {
            (TypeDesc::Collection(_), None) => {
                Err(invalid(&method.name, "collection return requires a length"))
            }
            (TypeDesc::Collection(_), Some(CollectionLength::Member(length))) => {
                let source = self.methods().find(|m| &m.name == length).ok_or_else(|| {
                    invalid(&method.name, format!("length member {length} does not exist"))
                })?;
                if !source.parameters.is_empty() || !source.return_type.underlying().is_integer() {
                    return Err(invalid(
                        &method.name,
                        format!("length member {length} must take no arguments and return an integer"),
                    ));
                }
                Ok(())
            }
            (_, Some(_)) if !matches!(method.return_type, TypeDesc::Collection(_)) => Err(invalid(
                &method.name,
                "collection length given for a non-collection return",
            )),
            _ => Ok(()),
        }
    }
}

fn invalid(member: &str, detail: impl Into<String>) -> ContractError {
    ContractError::InvalidDeclaration {
        member: member.to_string(),
        detail: detail.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn multiply() -> MethodDeclaration {
        let mut m = MethodDeclaration::new("Multiply", TypeDesc::I32);
        m.parameters = vec![
            Parameter::new("a", TypeDesc::I32),
            Parameter::new("b", TypeDesc::I32),
        ];
        m
    }

    #[test]
    fn duplicate_signature_rejected() {
        let mut contract = Contract::new("Math");
        contract.members.push(Member::Method(multiply()));
        contract.members.push(Member::Method(multiply()));
        assert!(matches!(
            contract.validate(),
            Err(ContractError::DuplicateSignature { .. })
        ));
    }

    #[test]
    fn explicit_entry_point_disambiguates() {
        let mut contract = Contract::new("Math");
        contract.members.push(Member::Method(multiply()));
        let mut other = multiply();
        other.entry_point = Some("multiply_checked".into());
        contract.members.push(Member::Method(other));
        contract.validate().unwrap();
    }

    #[test]
    fn overloads_by_passing_are_distinct() {
        let mut contract = Contract::new("Math");
        contract.members.push(Member::Method(multiply()));
        let mut by_ref = multiply();
        by_ref.parameters[0].passing = Passing::Ref;
        contract.members.push(Member::Method(by_ref));
        contract.validate().unwrap();
    }

    #[test]
    fn collection_requires_length_member() {
        let mut contract = Contract::new("Arrays");
        let mut values = MethodDeclaration::new("Values", TypeDesc::collection(TypeDesc::I32));
        values.collection_length = Some(CollectionLength::Member("Count".into()));
        contract.members.push(Member::Method(values.clone()));
        assert!(contract.validate().is_err());

        contract
            .members
            .push(Member::Method(MethodDeclaration::new("Count", TypeDesc::I32)));
        contract.validate().unwrap();

        values.collection_length = None;
        contract.members[0] = Member::Method(values);
        assert!(contract.validate().is_err());
    }

    #[test]
    fn close_generic_method() {
        let mut method = MethodDeclaration::new("Add", TypeDesc::generic("T"));
        method.generic_params = vec!["T".into()];
        method.parameters = vec![
            Parameter::new("a", TypeDesc::generic("T")),
            Parameter::new("b", TypeDesc::generic("T")),
        ];
        assert!(method.is_open_generic());

        let closed = method.close(&[TypeDesc::F64]).unwrap();
        assert!(closed.is_closed_generic());
        assert_eq!(closed.return_type, TypeDesc::F64);
        assert_eq!(closed.parameters[1].ty, TypeDesc::F64);
        assert!(method.close(&[]).is_err());
    }

    #[test]
    fn property_symbols() {
        let mut p = PropertyDeclaration::new("Counter", TypeDesc::I32);
        assert_eq!(p.entry_name(), "Counter");
        assert_eq!(p.setter_entry_name(), "Counter");
        p.entry_point = Some("g_counter".into());
        p.setter_entry_point = Some("g_counter_shadow".into());
        assert_eq!(p.entry_name(), "g_counter");
        assert_eq!(p.setter_entry_name(), "g_counter_shadow");
    }

    #[test]
    fn free_policy_defaults_depend_on_direction() {
        let info = MarshalInfo::default();
        assert!(info.frees_parameter());
        assert!(!info.frees_return());
        let info = info.with_free(FreePolicy::CallerFrees);
        assert!(info.frees_return());
        let info = MarshalInfo::default().with_free(FreePolicy::CalleeFrees);
        assert!(!info.frees_parameter());
    }

    #[test]
    fn bool_encodings() {
        assert_eq!(BoolEncoding::VariantBool.true_value(), -1);
        assert_eq!(BoolEncoding::VariantBool.size(), 2);
        assert_eq!(BoolEncoding::Bool.native_type(), TypeDesc::I32);
        assert_eq!(BoolEncoding::default().size(), 1);
    }

    #[test]
    fn fingerprint_is_stable() {
        let mut a = Contract::new("Math");
        a.members.push(Member::Method(multiply()));
        let b = a.clone();
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        a.default_convention = CallingConvention::StdCall;
        assert_ne!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }

    #[test]
    fn fingerprint_covers_member_order() {
        let mut a = Contract::new("Math");
        a.members.push(Member::Method(multiply()));
        a.members.push(Member::Property(PropertyDeclaration::new("Counter", TypeDesc::I32)));
        let mut b = Contract::new("Math");
        b.members.push(Member::Method(multiply()));
        b.members.push(Member::Property(PropertyDeclaration::new("Counter", TypeDesc::I32)));

        let fingerprint = a.fingerprint().unwrap();
        assert_eq!(fingerprint, b.fingerprint().unwrap());
        assert_eq!(fingerprint.len(), 64);
        assert!(fingerprint.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));

        b.members.reverse();
        assert_ne!(fingerprint, b.fingerprint().unwrap());
    }

    #[test]
    fn contract_from_toml() {
        let input = r#"
name = "Math"
default-convention = "cdecl"

[naming]
prefix = "m_"
transform = "underscore"

[[member]]
[member.method]
name = "Multiply"
return-type = "i32"
parameters = [
    { name = "a", ty = "i32" },
    { name = "b", ty = "i32" },
]

[[member]]
[member.property]
name = "Counter"
ty = "i64"
setter = false
"#;
        let contract = Contract::from_toml(input).unwrap();
        assert_eq!(contract.members.len(), 2);
        assert_eq!(contract.naming.prefix, "m_");
        let method = contract.methods().next().unwrap();
        assert_eq!(method.signature(), "Multiply(i32, i32)");
        let property = contract.properties().next().unwrap();
        assert!(property.getter && !property.setter);
    }
}
