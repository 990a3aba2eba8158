//! A small register-machine interpreter for test programs.
//!
//! Executes method bodies so tests can check observable behaviour before and
//! after the pass. Field accesses are checked against the declaring field's
//! visibility, so an inlined access the real verifier would reject fails
//! here too. Library classes are stubs; their behaviour comes from host
//! builtins registered by class and method name.

use anyhow::{anyhow, bail, Context, Result};
use rustc_hash::FxHashMap;
use synthkit_core::ir::{
    BinOp, Field, FieldRef, Instruction, InvokeKind, LabelId, Method, MethodRef, Program,
    Visibility, ZeroTest,
};
use synthkit_core::optimizer::analysis::ClassHierarchy;

const STEP_LIMIT: usize = 100_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Str(String),
    Ref(usize),
    Null,
    Void,
}

impl Value {
    pub fn as_int(&self) -> Result<i64> {
        match self {
            Value::Int(v) => Ok(*v),
            other => bail!("expected int, found {other:?}"),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Value::Str(s) => Ok(s),
            other => bail!("expected string, found {other:?}"),
        }
    }

    fn as_object(&self) -> Result<usize> {
        match self {
            Value::Ref(id) => Ok(*id),
            Value::Null => bail!("null dereference"),
            other => bail!("expected object reference, found {other:?}"),
        }
    }

    fn is_zero(&self) -> bool {
        matches!(self, Value::Int(0) | Value::Null)
    }
}

#[derive(Debug)]
struct Object {
    class: String,
    fields: FxHashMap<String, Value>,
    /// Character buffer for writer builtins
    text: String,
}

type Builtin = fn(&mut Interpreter<'_>, &[Value]) -> Result<Value>;

pub struct Interpreter<'p> {
    program: &'p Program,
    hierarchy: ClassHierarchy,
    heap: Vec<Object>,
    statics: FxHashMap<String, Value>,
    builtins: FxHashMap<(String, String), Builtin>,
    steps: usize,
}

impl<'p> Interpreter<'p> {
    /// Interpreter with the `java.io` writer builtins installed.
    pub fn new(program: &'p Program) -> Self {
        let mut interpreter = Self {
            program,
            hierarchy: ClassHierarchy::build(program),
            heap: Vec::new(),
            statics: FxHashMap::default(),
            builtins: FxHashMap::default(),
            steps: 0,
        };
        interpreter.register_builtin("Ljava/lang/Object;", "<init>", |_, _| Ok(Value::Void));
        interpreter.register_builtin("Ljava/io/StringWriter;", "<init>", |vm, args| {
            vm.object_mut(receiver(args)?)?.text.clear();
            Ok(Value::Void)
        });
        interpreter.register_builtin("Ljava/io/StringWriter;", "write", |vm, args| {
            let text = args.get(1).context("write() without argument")?.as_str()?.to_string();
            vm.object_mut(receiver(args)?)?.text.push_str(&text);
            Ok(Value::Void)
        });
        interpreter.register_builtin("Ljava/io/StringWriter;", "toString", |vm, args| {
            Ok(Value::Str(vm.object(receiver(args)?)?.text.clone()))
        });
        interpreter.register_builtin("Ljava/io/FilterWriter;", "<init>", |vm, args| {
            let out = args.get(1).context("FilterWriter() without writer")?.clone();
            vm.object_mut(receiver(args)?)?
                .fields
                .insert("Ljava/io/FilterWriter;.out".to_string(), out);
            Ok(Value::Void)
        });
        interpreter
    }

    pub fn register_builtin(&mut self, class: &str, name: &str, builtin: Builtin) {
        self.builtins
            .insert((class.to_string(), name.to_string()), builtin);
    }

    /// Invoke a static method by reference.
    pub fn call_static(&mut self, method: &MethodRef, args: Vec<Value>) -> Result<Value> {
        self.invoke(InvokeKind::Static, method, args)
    }

    /// Content of a writer-like object's character buffer.
    pub fn text_of(&self, value: &Value) -> Result<&str> {
        Ok(&self.object(value.as_object()?)?.text)
    }

    fn object(&self, id: usize) -> Result<&Object> {
        self.heap.get(id).ok_or_else(|| anyhow!("dangling reference #{id}"))
    }

    fn object_mut(&mut self, id: usize) -> Result<&mut Object> {
        self.heap
            .get_mut(id)
            .ok_or_else(|| anyhow!("dangling reference #{id}"))
    }

    fn invoke(&mut self, kind: InvokeKind, method: &MethodRef, args: Vec<Value>) -> Result<Value> {
        let start = match kind {
            InvokeKind::Virtual => {
                let id = receiver(&args)?;
                self.object(id)?.class.clone()
            }
            InvokeKind::Static | InvokeKind::Direct | InvokeKind::Super => method.owner.clone(),
        };

        let program = self.program;
        let mut current = Some(start);
        while let Some(class_name) = current {
            if let Some(builtin) = self
                .builtins
                .get(&(class_name.clone(), method.sig.name.clone()))
                .copied()
            {
                return builtin(self, &args);
            }
            let class = program
                .class(&class_name)
                .ok_or_else(|| anyhow!("NoClassDefFoundError: {class_name}"))?;
            if let Some(target) = class.method(&method.sig) {
                if target.code.is_some() {
                    return self
                        .execute(target, args)
                        .with_context(|| format!("in {}", target.method_ref()));
                }
            }
            current = class.super_class.clone();
        }
        bail!("NoSuchMethodError: {method}")
    }

    fn execute(&mut self, method: &'p Method, args: Vec<Value>) -> Result<Value> {
        let code = method.instructions();
        let labels: FxHashMap<LabelId, usize> = code
            .iter()
            .enumerate()
            .filter_map(|(pc, insn)| match insn {
                Instruction::Label(id) => Some((*id, pc)),
                _ => None,
            })
            .collect();
        let mut regs = vec![Value::Null; usize::from(method.registers)];
        let mut last_result: Option<Value> = None;
        let mut pc = 0;

        while let Some(insn) = code.get(pc) {
            self.steps += 1;
            if self.steps > STEP_LIMIT {
                bail!("step limit exceeded");
            }
            pc += 1;

            match insn {
                Instruction::LoadParam { dest, index, .. } => {
                    let value = args
                        .get(usize::from(*index))
                        .with_context(|| format!("missing argument {index}"))?;
                    regs[usize::from(*dest)] = value.clone();
                }
                Instruction::Const { dest, value } => regs[usize::from(*dest)] = Value::Int(*value),
                Instruction::ConstString { dest, value } => {
                    regs[usize::from(*dest)] = Value::Str(value.clone())
                }
                Instruction::Move { dest, src, .. } => {
                    regs[usize::from(*dest)] = regs[usize::from(*src)].clone()
                }
                Instruction::BinOp { op, dest, lhs, rhs } => {
                    let a = regs[usize::from(*lhs)].as_int()?;
                    let b = regs[usize::from(*rhs)].as_int()?;
                    let value = match op {
                        BinOp::Add => a.wrapping_add(b),
                        BinOp::Sub => a.wrapping_sub(b),
                        BinOp::Mul => a.wrapping_mul(b),
                        BinOp::Div if b == 0 => bail!("ArithmeticException: divide by zero"),
                        BinOp::Div => a.wrapping_div(b),
                    };
                    regs[usize::from(*dest)] = Value::Int(value);
                }
                Instruction::NewInstance { dest, class } => {
                    self.heap.push(Object {
                        class: class.clone(),
                        fields: FxHashMap::default(),
                        text: String::new(),
                    });
                    regs[usize::from(*dest)] = Value::Ref(self.heap.len() - 1);
                }
                Instruction::IGet {
                    dest,
                    object,
                    field,
                    ..
                } => {
                    let key = self.checked_field(&method.owner, field, false)?;
                    let id = regs[usize::from(*object)].as_object()?;
                    let value = self.object(id)?.fields.get(&key).cloned();
                    regs[usize::from(*dest)] = value.unwrap_or_else(|| default_for(field));
                }
                Instruction::IPut {
                    src, object, field, ..
                } => {
                    let key = self.checked_field(&method.owner, field, false)?;
                    let id = regs[usize::from(*object)].as_object()?;
                    let value = regs[usize::from(*src)].clone();
                    self.object_mut(id)?.fields.insert(key, value);
                }
                Instruction::SGet { dest, field, .. } => {
                    let key = self.checked_field(&method.owner, field, true)?;
                    let value = self.statics.get(&key).cloned();
                    regs[usize::from(*dest)] = value.unwrap_or_else(|| default_for(field));
                }
                Instruction::SPut { src, field, .. } => {
                    let key = self.checked_field(&method.owner, field, true)?;
                    self.statics.insert(key, regs[usize::from(*src)].clone());
                }
                Instruction::Invoke {
                    kind,
                    method: callee,
                    args: arg_regs,
                } => {
                    let values = arg_regs
                        .iter()
                        .map(|r| regs[usize::from(*r)].clone())
                        .collect();
                    last_result = Some(self.invoke(*kind, callee, values)?);
                }
                Instruction::MoveResult { dest, .. } => {
                    regs[usize::from(*dest)] = last_result
                        .take()
                        .context("move-result without a preceding invoke")?;
                }
                Instruction::Return { src, .. } => return Ok(regs[usize::from(*src)].clone()),
                Instruction::ReturnVoid => return Ok(Value::Void),
                Instruction::Label(_) | Instruction::Position(_) => {}
                Instruction::Goto(target) => pc = jump(&labels, *target)?,
                Instruction::IfZero { test, reg, target } => {
                    let zero = regs[usize::from(*reg)].is_zero();
                    let taken = match test {
                        ZeroTest::Eq => zero,
                        ZeroTest::Ne => !zero,
                    };
                    if taken {
                        pc = jump(&labels, *target)?;
                    }
                }
            }
        }
        bail!("fell off the end of {}", method.method_ref())
    }

    /// Resolve `field` the way the runtime linker does and check that `from`
    /// may access it. Returns the storage key of the declaration.
    fn checked_field(&self, from: &str, field: &FieldRef, is_static: bool) -> Result<String> {
        let declared = self.resolve_field(field)?;
        if declared.is_static() != is_static {
            bail!("IncompatibleClassChangeError: {field}");
        }
        if !self.may_access(from, declared) {
            bail!(
                "IllegalAccessError: {from} cannot access {:?} field {}",
                declared.visibility(),
                declared.to_ref()
            );
        }
        Ok(format!("{}.{}", declared.owner, declared.name))
    }

    fn resolve_field(&self, field: &FieldRef) -> Result<&'p Field> {
        let program = self.program;
        let mut current = Some(field.owner.as_str());
        let mut depth = 0;
        while let Some(name) = current {
            depth += 1;
            if depth > program.classes.len() + 1 {
                bail!("ClassCircularityError: {}", field.owner);
            }
            let class = program
                .class(name)
                .ok_or_else(|| anyhow!("NoClassDefFoundError: {name}"))?;
            if let Some(declared) = class.field(&field.name) {
                return Ok(declared);
            }
            current = class.super_class.as_deref();
        }
        bail!("NoSuchFieldError: {field}")
    }

    fn may_access(&self, from: &str, field: &Field) -> bool {
        match field.visibility() {
            Visibility::Public => true,
            Visibility::Private => from == field.owner,
            Visibility::Package => self.hierarchy.same_package(from, &field.owner),
            Visibility::Protected => {
                self.hierarchy.same_package(from, &field.owner)
                    || self.hierarchy.is_subclass_of(from, &field.owner)
            }
        }
    }
}

fn receiver(args: &[Value]) -> Result<usize> {
    args.first().context("missing receiver")?.as_object()
}

fn jump(labels: &FxHashMap<LabelId, usize>, target: LabelId) -> Result<usize> {
    labels
        .get(&target)
        .copied()
        .ok_or_else(|| anyhow!("undefined label {target}"))
}

fn default_for(field: &FieldRef) -> Value {
    if field.ty.starts_with('L') || field.ty.starts_with('[') {
        Value::Null
    } else {
        Value::Int(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{load_param, method_ref, ret, ClassBuilder, ProgramBuilder};
    use synthkit_core::ir::{AccessFlags, ValueKind};

    const CALC: &str = "Lcom/example/Calc;";

    #[test]
    fn test_loop_with_branches() {
        // sum = 0; while (n != 0) { sum += n; n -= 1 }; return sum
        let program = ProgramBuilder::new()
            .class(ClassBuilder::concrete(CALC).method(
                "sum",
                &["I"],
                "I",
                AccessFlags::PUBLIC | AccessFlags::STATIC,
                4,
                vec![
                    load_param(ValueKind::Int, 0, 0),
                    Instruction::Const { dest: 1, value: 0 },
                    Instruction::Const { dest: 2, value: 1 },
                    Instruction::Label(1),
                    Instruction::IfZero {
                        test: ZeroTest::Eq,
                        reg: 0,
                        target: 2,
                    },
                    Instruction::BinOp {
                        op: BinOp::Add,
                        dest: 1,
                        lhs: 1,
                        rhs: 0,
                    },
                    Instruction::BinOp {
                        op: BinOp::Sub,
                        dest: 0,
                        lhs: 0,
                        rhs: 2,
                    },
                    Instruction::Goto(1),
                    Instruction::Label(2),
                    ret(ValueKind::Int, 1),
                ],
            ))
            .build();

        let mut vm = Interpreter::new(&program);
        let result = vm
            .call_static(&method_ref(CALC, "sum", &["I"], "I"), vec![Value::Int(4)])
            .unwrap();
        assert_eq!(result, Value::Int(10));
    }

    #[test]
    fn test_private_field_rejected_from_other_class() {
        let program = ProgramBuilder::new()
            .class(ClassBuilder::concrete(CALC).field(
                "secret",
                "I",
                AccessFlags::PRIVATE | AccessFlags::STATIC,
            ))
            .class(ClassBuilder::concrete("Lcom/example/Spy;").method(
                "peek",
                &[],
                "I",
                AccessFlags::PUBLIC | AccessFlags::STATIC,
                1,
                vec![
                    Instruction::SGet {
                        kind: ValueKind::Int,
                        dest: 0,
                        field: FieldRef::new(CALC, "secret", "I"),
                    },
                    ret(ValueKind::Int, 0),
                ],
            ))
            .build();

        let mut vm = Interpreter::new(&program);
        let err = vm
            .call_static(&method_ref("Lcom/example/Spy;", "peek", &[], "I"), vec![])
            .unwrap_err();
        assert!(format!("{err:#}").contains("IllegalAccessError"));
    }
}
