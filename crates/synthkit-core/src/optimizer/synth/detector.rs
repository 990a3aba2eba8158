//! Structural detection of synthesized field accessors.
//!
//! An accessor is recognized by shape, never by name: parameter setup, one
//! field access that consumes exactly those parameters, and a return. Four
//! shapes qualify:
//!
//! ```text
//! static read      sget v0, Outer.x        ; return v0
//! instance read    load-param v1, #0       ; iget v0, v1, Outer.f ; return v0
//! static write     load-param v0, #0       ; sput v0, Outer.x     ; return-void
//! instance write   load-param v0, #0 ; load-param v1, #1 ; iput v1, v0, Outer.f ; return-void
//! ```
//!
//! Debug positions are ignored. Anything else in the body (extra arithmetic,
//! calls, a second field touch) disqualifies the method.

use crate::config::ExclusionFilter;
use crate::ir::{
    AccessFlags, FieldRef, Instruction, Method, MethodRef, Program, Reg, ValueKind, Visibility,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AccessKind {
    Read,
    Write,
}

/// A method believed to be compiler-synthesized, with the single field it
/// touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessorCandidate {
    pub method: MethodRef,
    pub field: FieldRef,
    pub kind: AccessKind,
    pub value_kind: ValueKind,
    /// True for `sget`/`sput` accessors
    pub static_field: bool,
    /// Parameter index of the object whose field is accessed
    pub instance_param: Option<usize>,
    /// Parameter index of the stored value (writes only)
    pub value_param: Option<usize>,
    /// Parameter types as seen by the body, receiver first for instance methods
    pub param_types: Vec<String>,
    /// The accessor itself is an instance method, reached via invoke-direct
    pub instance_method: bool,
}

impl AccessorCandidate {
    pub fn arity(&self) -> usize {
        self.param_types.len()
    }
}

/// Why a method does not have accessor shape. Never surfaced in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeMismatch {
    NoCode,
    Constructor,
    NotBridgeScoped,
    NotSynthetic,
    ParameterSetup,
    NoFieldAccess,
    OperandMismatch,
    TypeMismatch,
    ExtraInstructions,
}

pub struct AccessorDetector<'a> {
    filter: &'a ExclusionFilter,
    require_synthetic: bool,
}

impl<'a> AccessorDetector<'a> {
    pub fn new(filter: &'a ExclusionFilter, require_synthetic: bool) -> Self {
        Self {
            filter,
            require_synthetic,
        }
    }

    /// Scan every concrete, non-excluded class. Classes are scanned in
    /// parallel and the result is sorted by accessor.
    pub fn detect(&self, program: &Program) -> Vec<AccessorCandidate> {
        let filter = self.filter;
        let require_synthetic = self.require_synthetic;
        let mut candidates: Vec<AccessorCandidate> = program
            .classes
            .par_values()
            .filter(|class| class.concrete && !filter.is_excluded(&class.name))
            .flat_map_iter(move |class| {
                class.methods.values().filter_map(move |method| {
                    match match_accessor(method, require_synthetic) {
                        Ok(candidate) => Some(candidate),
                        Err(mismatch) => {
                            trace!("{} is not an accessor: {:?}", method.method_ref(), mismatch);
                            None
                        }
                    }
                })
            })
            .collect();
        candidates.sort_by(|a, b| a.method.cmp(&b.method));
        candidates
    }
}

/// Match a single method against the accessor shapes.
pub fn match_accessor(
    method: &Method,
    require_synthetic: bool,
) -> Result<AccessorCandidate, ShapeMismatch> {
    let Some(code) = &method.code else {
        return Err(ShapeMismatch::NoCode);
    };
    if method.is_constructor() {
        return Err(ShapeMismatch::Constructor);
    }
    if method
        .access
        .intersects(AccessFlags::ABSTRACT | AccessFlags::NATIVE)
        || matches!(
            method.access.visibility(),
            Visibility::Public | Visibility::Protected
        )
    {
        return Err(ShapeMismatch::NotBridgeScoped);
    }
    if require_synthetic && !method.access.contains(AccessFlags::SYNTHETIC) {
        return Err(ShapeMismatch::NotSynthetic);
    }

    let body: Vec<&Instruction> = code
        .iter()
        .filter(|insn| !matches!(insn, Instruction::Position(_)))
        .collect();
    let param_types = method.param_types();
    let arity = param_types.len();

    // Every parameter bound exactly once, in order, into distinct registers.
    if body.len() < arity {
        return Err(ShapeMismatch::ParameterSetup);
    }
    let mut param_regs: Vec<Reg> = Vec::with_capacity(arity);
    for (i, insn) in body[..arity].iter().enumerate() {
        match insn {
            Instruction::LoadParam { kind, dest, index }
                if usize::from(*index) == i
                    && Some(*kind) == ValueKind::of(param_types[i])
                    && !param_regs.contains(dest) =>
            {
                param_regs.push(*dest);
            }
            _ => return Err(ShapeMismatch::ParameterSetup),
        }
    }

    let rest = &body[arity..];
    let (access, ret) = match rest {
        [access, ret] => (*access, *ret),
        [] | [_] => return Err(ShapeMismatch::NoFieldAccess),
        _ => return Err(ShapeMismatch::ExtraInstructions),
    };

    let shape = match access {
        Instruction::SGet { kind, dest, field } => {
            expect_return(ret, *kind, *dest)?;
            if arity != 0 {
                return Err(ShapeMismatch::OperandMismatch);
            }
            expect_types(*kind, field, &method.sig.ret)?;
            Shape::new(AccessKind::Read, *kind, field, true, None, None)
        }
        Instruction::IGet {
            kind,
            dest,
            object,
            field,
        } => {
            expect_return(ret, *kind, *dest)?;
            if arity != 1 || *object != param_regs[0] {
                return Err(ShapeMismatch::OperandMismatch);
            }
            expect_object_param(param_types[0])?;
            expect_types(*kind, field, &method.sig.ret)?;
            Shape::new(AccessKind::Read, *kind, field, false, Some(0), None)
        }
        Instruction::SPut { kind, src, field } => {
            expect_return_void(ret)?;
            if arity != 1 || *src != param_regs[0] {
                return Err(ShapeMismatch::OperandMismatch);
            }
            expect_types(*kind, field, param_types[0])?;
            expect_void(&method.sig.ret)?;
            Shape::new(AccessKind::Write, *kind, field, true, None, Some(0))
        }
        Instruction::IPut {
            kind,
            src,
            object,
            field,
        } => {
            expect_return_void(ret)?;
            if arity != 2 || *object != param_regs[0] || *src != param_regs[1] {
                return Err(ShapeMismatch::OperandMismatch);
            }
            expect_object_param(param_types[0])?;
            expect_types(*kind, field, param_types[1])?;
            expect_void(&method.sig.ret)?;
            Shape::new(AccessKind::Write, *kind, field, false, Some(0), Some(1))
        }
        _ => return Err(ShapeMismatch::NoFieldAccess),
    };

    Ok(AccessorCandidate {
        method: method.method_ref(),
        field: shape.field.clone(),
        kind: shape.kind,
        value_kind: shape.value_kind,
        static_field: shape.static_field,
        instance_param: shape.instance_param,
        value_param: shape.value_param,
        param_types: param_types.iter().map(|t| t.to_string()).collect(),
        instance_method: !method.is_static(),
    })
}

struct Shape<'m> {
    kind: AccessKind,
    value_kind: ValueKind,
    field: &'m FieldRef,
    static_field: bool,
    instance_param: Option<usize>,
    value_param: Option<usize>,
}

impl<'m> Shape<'m> {
    fn new(
        kind: AccessKind,
        value_kind: ValueKind,
        field: &'m FieldRef,
        static_field: bool,
        instance_param: Option<usize>,
        value_param: Option<usize>,
    ) -> Self {
        Self {
            kind,
            value_kind,
            field,
            static_field,
            instance_param,
            value_param,
        }
    }
}

fn expect_return(insn: &Instruction, kind: ValueKind, reg: Reg) -> Result<(), ShapeMismatch> {
    match insn {
        Instruction::Return { kind: k, src } if *k == kind && *src == reg => Ok(()),
        Instruction::Return { .. } => Err(ShapeMismatch::OperandMismatch),
        _ => Err(ShapeMismatch::ExtraInstructions),
    }
}

fn expect_return_void(insn: &Instruction) -> Result<(), ShapeMismatch> {
    match insn {
        Instruction::ReturnVoid => Ok(()),
        _ => Err(ShapeMismatch::ExtraInstructions),
    }
}

/// The opcode kind, the field type and the type flowing in or out of the
/// accessor must all agree.
fn expect_types(kind: ValueKind, field: &FieldRef, outer: &str) -> Result<(), ShapeMismatch> {
    if field.value_kind() != Some(kind) || field.ty != outer {
        return Err(ShapeMismatch::TypeMismatch);
    }
    Ok(())
}

fn expect_void(ret: &str) -> Result<(), ShapeMismatch> {
    if ret != "V" {
        return Err(ShapeMismatch::TypeMismatch);
    }
    Ok(())
}

fn expect_object_param(ty: &str) -> Result<(), ShapeMismatch> {
    if ValueKind::of(ty) != Some(ValueKind::Object) {
        return Err(ShapeMismatch::TypeMismatch);
    }
    Ok(())
}
