//! Register-based instruction set.
//!
//! Only field accesses and invocations are interpreted by the optimizer; the
//! remaining opcodes exist so method bodies around them can be represented,
//! executed by test interpreters, and validated. Branch targets are label ids
//! rather than positions, so splicing instructions never invalidates them.

use super::class::{FieldRef, MethodRef};
use super::descriptor::ValueKind;
use serde::{Deserialize, Serialize};

pub type Reg = u16;
pub type LabelId = u32;

/// Dispatch kind of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InvokeKind {
    Static,
    Direct,
    Virtual,
    Super,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZeroTest {
    Eq,
    Ne,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Instruction {
    /// Binds parameter `index` (the receiver is index 0 for instance methods)
    LoadParam {
        kind: ValueKind,
        dest: Reg,
        index: u16,
    },
    Const {
        dest: Reg,
        value: i64,
    },
    ConstString {
        dest: Reg,
        value: String,
    },
    Move {
        kind: ValueKind,
        dest: Reg,
        src: Reg,
    },
    BinOp {
        op: BinOp,
        dest: Reg,
        lhs: Reg,
        rhs: Reg,
    },
    NewInstance {
        dest: Reg,
        class: String,
    },
    IGet {
        kind: ValueKind,
        dest: Reg,
        object: Reg,
        field: FieldRef,
    },
    IPut {
        kind: ValueKind,
        src: Reg,
        object: Reg,
        field: FieldRef,
    },
    SGet {
        kind: ValueKind,
        dest: Reg,
        field: FieldRef,
    },
    SPut {
        kind: ValueKind,
        src: Reg,
        field: FieldRef,
    },
    Invoke {
        kind: InvokeKind,
        method: MethodRef,
        args: Vec<Reg>,
    },
    MoveResult {
        kind: ValueKind,
        dest: Reg,
    },
    Return {
        kind: ValueKind,
        src: Reg,
    },
    ReturnVoid,
    Label(LabelId),
    Goto(LabelId),
    IfZero {
        test: ZeroTest,
        reg: Reg,
        target: LabelId,
    },
    /// Debug line position; carries no semantics
    Position(u32),
}

impl Instruction {
    /// Pseudo-instructions occupy a slot but execute nothing.
    pub fn is_pseudo(&self) -> bool {
        matches!(self, Instruction::Label(_) | Instruction::Position(_))
    }

    pub fn is_field_access(&self) -> bool {
        self.field().is_some()
    }

    /// Field referenced by a field access instruction.
    pub fn field(&self) -> Option<&FieldRef> {
        match self {
            Instruction::IGet { field, .. }
            | Instruction::IPut { field, .. }
            | Instruction::SGet { field, .. }
            | Instruction::SPut { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Method invoked by an invoke instruction.
    pub fn invoked(&self) -> Option<&MethodRef> {
        match self {
            Instruction::Invoke { method, .. } => Some(method),
            _ => None,
        }
    }

    /// Registers this instruction reads or writes.
    pub fn registers(&self) -> Vec<Reg> {
        match self {
            Instruction::LoadParam { dest, .. }
            | Instruction::Const { dest, .. }
            | Instruction::ConstString { dest, .. }
            | Instruction::NewInstance { dest, .. }
            | Instruction::SGet { dest, .. }
            | Instruction::MoveResult { dest, .. } => vec![*dest],
            Instruction::Move { dest, src, .. } => vec![*dest, *src],
            Instruction::BinOp { dest, lhs, rhs, .. } => vec![*dest, *lhs, *rhs],
            Instruction::IGet { dest, object, .. } => vec![*dest, *object],
            Instruction::IPut { src, object, .. } => vec![*src, *object],
            Instruction::SPut { src, .. } | Instruction::Return { src, .. } => vec![*src],
            Instruction::Invoke { args, .. } => args.clone(),
            Instruction::IfZero { reg, .. } => vec![*reg],
            Instruction::ReturnVoid
            | Instruction::Label(_)
            | Instruction::Goto(_)
            | Instruction::Position(_) => Vec::new(),
        }
    }

    /// Label targeted by a branch.
    pub fn branch_target(&self) -> Option<LabelId> {
        match self {
            Instruction::Goto(target) | Instruction::IfZero { target, .. } => Some(*target),
            _ => None,
        }
    }
}
