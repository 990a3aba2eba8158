//! In-memory program model.
//!
//! A `Program` is the whole-program snapshot handed over by a loader: every
//! class it knows about, with concreteness already decided. Library classes
//! appear as non-concrete stubs whose member lists may be partial or empty.

pub mod class;
pub mod descriptor;
pub mod instruction;

pub use class::{AccessFlags, ClassUnit, Field, FieldRef, Method, MethodRef, MethodSig, Visibility};
pub use descriptor::{package_of, ValueKind};
pub use instruction::{BinOp, Instruction, InvokeKind, LabelId, Reg, ZeroTest};

use crate::errors::{Result, SynthError};
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub classes: IndexMap<String, ClassUnit>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a class, replacing any previous class of the same name.
    pub fn add_class(&mut self, class: ClassUnit) -> Option<ClassUnit> {
        self.classes.insert(class.name.clone(), class)
    }

    pub fn class(&self, name: &str) -> Option<&ClassUnit> {
        self.classes.get(name)
    }

    pub fn class_mut(&mut self, name: &str) -> Option<&mut ClassUnit> {
        self.classes.get_mut(name)
    }

    pub fn method(&self, method: &MethodRef) -> Option<&Method> {
        self.class(&method.owner)?.method(&method.sig)
    }

    pub fn method_mut(&mut self, method: &MethodRef) -> Option<&mut Method> {
        self.class_mut(&method.owner)?.methods.get_mut(&method.sig)
    }

    pub fn contains_method(&self, method: &MethodRef) -> bool {
        self.method(method).is_some()
    }

    /// Every method of every class, in snapshot order.
    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.classes.values().flat_map(|c| c.methods.values())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| SynthError::MalformedProgram(e.to_string()))
    }

    /// Content hash of the snapshot, used to record input/output identity.
    pub fn fingerprint(&self) -> String {
        let bytes = bincode::serialize(self).unwrap_or_default();
        blake3::hash(&bytes).to_hex().to_string()
    }

    /// Reject snapshots the pass cannot reason about. Hierarchy cycles are not
    /// checked here; the resolver reports them as warnings.
    pub fn validate(&self) -> Result<()> {
        for (key, class) in &self.classes {
            if key != &class.name {
                return Err(malformed(format!(
                    "class stored under `{key}` is named `{}`",
                    class.name
                )));
            }

            for (name, field) in &class.fields {
                if name != &field.name || field.owner != class.name {
                    return Err(malformed(format!(
                        "field `{name}` of {} names {}.{}",
                        class.name, field.owner, field.name
                    )));
                }
                if ValueKind::of(&field.ty).is_none() {
                    return Err(malformed(format!(
                        "field {}.{} has invalid type `{}`",
                        class.name, field.name, field.ty
                    )));
                }
            }

            for (sig, method) in &class.methods {
                if sig != &method.sig || method.owner != class.name {
                    return Err(malformed(format!(
                        "method {sig} of {} is owned by {}",
                        class.name, method.owner
                    )));
                }
                validate_body(method)?;
            }
        }
        Ok(())
    }
}

fn validate_body(method: &Method) -> Result<()> {
    let Some(code) = &method.code else {
        return Ok(());
    };

    let arity = method.param_types().len();
    let mut labels = FxHashSet::default();
    for insn in code {
        if let Instruction::Label(id) = insn {
            if !labels.insert(*id) {
                return Err(malformed(format!(
                    "label {id} defined twice in {}",
                    method.method_ref()
                )));
            }
        }
    }

    for (position, insn) in code.iter().enumerate() {
        if let Some(reg) = insn.registers().into_iter().find(|r| *r >= method.registers) {
            return Err(malformed(format!(
                "{}@{position} uses v{reg} but only {} registers are declared",
                method.method_ref(),
                method.registers
            )));
        }
        if let Instruction::LoadParam { index, .. } = insn {
            if usize::from(*index) >= arity {
                return Err(malformed(format!(
                    "{}@{position} loads parameter {index} of {arity}",
                    method.method_ref()
                )));
            }
        }
        if let Some(target) = insn.branch_target() {
            if !labels.contains(&target) {
                return Err(malformed(format!(
                    "{}@{position} branches to undefined label {target}",
                    method.method_ref()
                )));
            }
        }
    }
    Ok(())
}

fn malformed(message: String) -> SynthError {
    SynthError::MalformedProgram(message)
}
