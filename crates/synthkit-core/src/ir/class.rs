//! Classes, fields, methods and the symbolic references that name them.

use super::descriptor::{package_of, ValueKind};
use super::instruction::Instruction;
use bitflags::bitflags;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

bitflags! {
    /// Access flags shared by classes, fields and methods.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct AccessFlags: u32 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const ABSTRACT = 0x0400;
        const NATIVE = 0x0100;
        const SYNTHETIC = 0x1000;
        const CONSTRUCTOR = 0x10000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Visibility {
    Private,
    Package,
    Protected,
    Public,
}

impl AccessFlags {
    pub fn visibility(self) -> Visibility {
        if self.contains(AccessFlags::PUBLIC) {
            Visibility::Public
        } else if self.contains(AccessFlags::PROTECTED) {
            Visibility::Protected
        } else if self.contains(AccessFlags::PRIVATE) {
            Visibility::Private
        } else {
            Visibility::Package
        }
    }

    /// Replace the visibility bits, keeping every other flag.
    pub fn with_visibility(self, visibility: Visibility) -> AccessFlags {
        let base = self - (AccessFlags::PUBLIC | AccessFlags::PRIVATE | AccessFlags::PROTECTED);
        match visibility {
            Visibility::Public => base | AccessFlags::PUBLIC,
            Visibility::Protected => base | AccessFlags::PROTECTED,
            Visibility::Private => base | AccessFlags::PRIVATE,
            Visibility::Package => base,
        }
    }

    pub fn is_static(self) -> bool {
        self.contains(AccessFlags::STATIC)
    }
}

/// Symbolic field reference as it appears in an instruction. The owner is the
/// class the reference names, which is not necessarily the declaring class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldRef {
    pub owner: String,
    pub name: String,
    pub ty: String,
}

impl FieldRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            ty: ty.into(),
        }
    }

    pub fn value_kind(&self) -> Option<ValueKind> {
        ValueKind::of(&self.ty)
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}:{}", self.owner, self.name, self.ty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodSig {
    pub name: String,
    pub params: Vec<String>,
    pub ret: String,
}

impl MethodSig {
    pub fn new<P: Into<String>>(
        name: impl Into<String>,
        params: impl IntoIterator<Item = P>,
        ret: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            params: params.into_iter().map(Into::into).collect(),
            ret: ret.into(),
        }
    }
}

impl fmt::Display for MethodSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:({}){}", self.name, self.params.concat(), self.ret)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodRef {
    pub owner: String,
    pub sig: MethodSig,
}

impl MethodRef {
    pub fn new(owner: impl Into<String>, sig: MethodSig) -> Self {
        Self {
            owner: owner.into(),
            sig,
        }
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner, self.sig)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub owner: String,
    pub name: String,
    pub ty: String,
    pub access: AccessFlags,
}

impl Field {
    pub fn is_static(&self) -> bool {
        self.access.is_static()
    }

    pub fn visibility(&self) -> Visibility {
        self.access.visibility()
    }

    pub fn to_ref(&self) -> FieldRef {
        FieldRef::new(self.owner.clone(), self.name.clone(), self.ty.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Method {
    pub owner: String,
    pub sig: MethodSig,
    pub access: AccessFlags,
    /// Number of registers the body may address
    pub registers: u16,
    /// `None` for abstract, native and external methods
    pub code: Option<Vec<Instruction>>,
}

impl Method {
    pub fn is_static(&self) -> bool {
        self.access.is_static()
    }

    pub fn is_constructor(&self) -> bool {
        self.access.contains(AccessFlags::CONSTRUCTOR) || self.sig.name == "<init>"
    }

    pub fn method_ref(&self) -> MethodRef {
        MethodRef::new(self.owner.clone(), self.sig.clone())
    }

    /// Parameter types as seen by `LoadParam`: the receiver first for
    /// instance methods, then the declared parameters.
    pub fn param_types(&self) -> Vec<&str> {
        let mut types = Vec::with_capacity(self.sig.params.len() + 1);
        if !self.is_static() {
            types.push(self.owner.as_str());
        }
        types.extend(self.sig.params.iter().map(String::as_str));
        types
    }

    pub fn instructions(&self) -> &[Instruction] {
        self.code.as_deref().unwrap_or(&[])
    }
}

/// A class in the program snapshot. `concrete` is fixed by the loader: true
/// iff the full member list is known, false for stubs of library classes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassUnit {
    pub name: String,
    pub super_class: Option<String>,
    pub access: AccessFlags,
    pub concrete: bool,
    pub fields: IndexMap<String, Field>,
    #[serde(with = "method_table")]
    pub methods: IndexMap<MethodSig, Method>,
}

impl ClassUnit {
    pub fn new(name: impl Into<String>, super_class: Option<String>, concrete: bool) -> Self {
        Self {
            name: name.into(),
            super_class,
            access: AccessFlags::PUBLIC,
            concrete,
            fields: IndexMap::new(),
            methods: IndexMap::new(),
        }
    }

    pub fn package(&self) -> &str {
        package_of(&self.name)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn method(&self, sig: &MethodSig) -> Option<&Method> {
        self.methods.get(sig)
    }
}

/// Methods serialize as a sequence; signatures are not string keys.
mod method_table {
    use super::{Method, MethodSig};
    use indexmap::IndexMap;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(methods: &IndexMap<MethodSig, Method>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(methods.values())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<IndexMap<MethodSig, Method>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let methods = Vec::<Method>::deserialize(deserializer)?;
        Ok(methods.into_iter().map(|m| (m.sig.clone(), m)).collect())
    }
}
