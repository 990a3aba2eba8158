//! Helpers for bytecode type descriptors.
//!
//! Class and field types are carried around as raw descriptor strings
//! (`I`, `J`, `Lcom/example/Alpha;`, `[I`). The optimizer only needs to know
//! which register kind a value occupies and which package a class lives in.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Register category of a value, as encoded in the opcode variants of field
/// access, move and return instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ValueKind {
    /// 32-bit scalars: `I`, `Z`, `B`, `C`, `S`, `F`
    Int,
    /// 64-bit scalars occupying a register pair: `J`, `D`
    Wide,
    /// References: `L...;` and arrays
    Object,
    /// `V`, only meaningful as a return type
    Void,
}

impl ValueKind {
    /// Classify a descriptor. Returns `None` for malformed descriptors.
    pub fn of(descriptor: &str) -> Option<ValueKind> {
        match descriptor.as_bytes().first()? {
            b'I' | b'Z' | b'B' | b'C' | b'S' | b'F' if descriptor.len() == 1 => {
                Some(ValueKind::Int)
            }
            b'J' | b'D' if descriptor.len() == 1 => Some(ValueKind::Wide),
            b'V' if descriptor.len() == 1 => Some(ValueKind::Void),
            b'L' if descriptor.len() > 2 && descriptor.ends_with(';') => Some(ValueKind::Object),
            b'[' if descriptor.len() > 1 => Some(ValueKind::Object),
            _ => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueKind::Int => "int",
            ValueKind::Wide => "wide",
            ValueKind::Object => "object",
            ValueKind::Void => "void",
        };
        f.write_str(s)
    }
}

/// Package portion of a class descriptor: `Lcom/example/Alpha$Beta;` is in
/// `com/example`. Classes in the default package return an empty string.
pub fn package_of(class: &str) -> &str {
    let inner = class
        .strip_prefix('L')
        .and_then(|s| s.strip_suffix(';'))
        .unwrap_or(class);
    match inner.rfind('/') {
        Some(idx) => &inner[..idx],
        None => "",
    }
}
