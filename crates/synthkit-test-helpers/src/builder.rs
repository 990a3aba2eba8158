//! Builders for hand-assembled test programs.

use synthkit_core::ir::{
    AccessFlags, ClassUnit, Field, FieldRef, Instruction, InvokeKind, Method, MethodRef, MethodSig,
    Program, Reg, ValueKind,
};

/// Builder for a single class.
///
/// # Example
///
/// ```ignore
/// let outer = ClassBuilder::concrete("Lcom/example/Outer;")
///     .field("x", "I", AccessFlags::PRIVATE | AccessFlags::STATIC)
///     .build();
/// ```
pub struct ClassBuilder {
    unit: ClassUnit,
}

impl ClassBuilder {
    /// A class whose full definition is part of the program.
    pub fn concrete(name: &str) -> Self {
        Self {
            unit: ClassUnit::new(name, None, true),
        }
    }

    /// A library stub: known by reference only.
    pub fn external(name: &str) -> Self {
        Self {
            unit: ClassUnit::new(name, None, false),
        }
    }

    pub fn extends(mut self, parent: &str) -> Self {
        self.unit.super_class = Some(parent.to_string());
        self
    }

    pub fn access(mut self, access: AccessFlags) -> Self {
        self.unit.access = access;
        self
    }

    pub fn field(mut self, name: &str, ty: &str, access: AccessFlags) -> Self {
        self.unit.fields.insert(
            name.to_string(),
            Field {
                owner: self.unit.name.clone(),
                name: name.to_string(),
                ty: ty.to_string(),
                access,
            },
        );
        self
    }

    /// Add a method with a body. `registers` is the frame size.
    pub fn method(
        mut self,
        name: &str,
        params: &[&str],
        ret: &str,
        access: AccessFlags,
        registers: Reg,
        code: Vec<Instruction>,
    ) -> Self {
        let sig = MethodSig::new(name, params.iter().copied(), ret);
        self.unit.methods.insert(
            sig.clone(),
            Method {
                owner: self.unit.name.clone(),
                sig,
                access,
                registers,
                code: Some(code),
            },
        );
        self
    }

    /// Add a method declared without a body, as stub classes carry.
    pub fn declared_method(mut self, name: &str, params: &[&str], ret: &str, access: AccessFlags) -> Self {
        let sig = MethodSig::new(name, params.iter().copied(), ret);
        self.unit.methods.insert(
            sig.clone(),
            Method {
                owner: self.unit.name.clone(),
                sig,
                access,
                registers: 0,
                code: None,
            },
        );
        self
    }

    pub fn build(self) -> ClassUnit {
        self.unit
    }
}

#[derive(Default)]
pub struct ProgramBuilder {
    program: Program,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn class(mut self, class: ClassBuilder) -> Self {
        self.program.add_class(class.build());
        self
    }

    pub fn build(self) -> Program {
        self.program
    }
}

pub fn method_ref(owner: &str, name: &str, params: &[&str], ret: &str) -> MethodRef {
    MethodRef::new(owner, MethodSig::new(name, params.iter().copied(), ret))
}

pub fn field_ref(owner: &str, name: &str, ty: &str) -> FieldRef {
    FieldRef::new(owner, name, ty)
}

pub fn load_param(kind: ValueKind, dest: Reg, index: u16) -> Instruction {
    Instruction::LoadParam { kind, dest, index }
}

pub fn invoke(kind: InvokeKind, method: MethodRef, args: &[Reg]) -> Instruction {
    Instruction::Invoke {
        kind,
        method,
        args: args.to_vec(),
    }
}

pub fn move_result(kind: ValueKind, dest: Reg) -> Instruction {
    Instruction::MoveResult { kind, dest }
}

pub fn ret(kind: ValueKind, src: Reg) -> Instruction {
    Instruction::Return { kind, src }
}
