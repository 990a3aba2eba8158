//! Reference programs.
//!
//! `Alpha`/`Beta`: an inner class reads a private static field of its outer
//! class through a synthesized getter. The field is concrete, so the getter
//! can go.
//!
//! `Gamma`/`Delta`: an inner class reads the protected `out` field that
//! `Gamma` inherits from the library class `java.io.FilterWriter`. The
//! getter must stay: inlined into `Delta`, the access would be illegal.
//!
//! `Scenario` holds static entry points that drive both.

use crate::builder::{
    field_ref, invoke, load_param, method_ref, move_result, ret, ClassBuilder, ProgramBuilder,
};
use synthkit_core::ir::{
    AccessFlags, BinOp, Instruction, InvokeKind, MethodRef, Program, ValueKind,
};

pub const OBJECT: &str = "Ljava/lang/Object;";
pub const STRING: &str = "Ljava/lang/String;";
pub const WRITER: &str = "Ljava/io/Writer;";
pub const FILTER_WRITER: &str = "Ljava/io/FilterWriter;";
pub const STRING_WRITER: &str = "Ljava/io/StringWriter;";

pub const ALPHA: &str = "Lcom/example/Alpha;";
pub const BETA: &str = "Lcom/example/Alpha$Beta;";
pub const GAMMA: &str = "Lcom/example/Gamma;";
pub const DELTA: &str = "Lcom/example/Gamma$Delta;";
pub const SCENARIO: &str = "Lcom/example/Scenario;";

fn ctor() -> AccessFlags {
    AccessFlags::PUBLIC | AccessFlags::CONSTRUCTOR
}

fn accessor_flags() -> AccessFlags {
    AccessFlags::STATIC | AccessFlags::SYNTHETIC
}

fn entry_flags() -> AccessFlags {
    AccessFlags::PUBLIC | AccessFlags::STATIC
}

/// Library stubs: `Object`, `Writer`, `FilterWriter` and `StringWriter`.
pub fn java_io_stubs() -> Vec<ClassBuilder> {
    vec![
        ClassBuilder::external(OBJECT).declared_method("<init>", &[], "V", ctor()),
        ClassBuilder::external(WRITER)
            .extends(OBJECT)
            .access(AccessFlags::PUBLIC | AccessFlags::ABSTRACT)
            .declared_method("toString", &[], STRING, AccessFlags::PUBLIC),
        ClassBuilder::external(FILTER_WRITER)
            .extends(WRITER)
            .access(AccessFlags::PUBLIC | AccessFlags::ABSTRACT)
            .field("out", WRITER, AccessFlags::PROTECTED)
            .declared_method("<init>", &[WRITER], "V", AccessFlags::PROTECTED | AccessFlags::CONSTRUCTOR),
        ClassBuilder::external(STRING_WRITER)
            .extends(WRITER)
            .declared_method("<init>", &[], "V", ctor())
            .declared_method("write", &[STRING], "V", AccessFlags::PUBLIC)
            .declared_method("toString", &[], STRING, AccessFlags::PUBLIC),
    ]
}

pub fn alpha_accessor() -> MethodRef {
    method_ref(ALPHA, "access$000", &[], "I")
}

pub fn gamma_accessor() -> MethodRef {
    method_ref(GAMMA, "access$000", &[GAMMA], WRITER)
}

/// `Scenario.alphaBeta()`: `new Alpha(12).new Beta().doublex()`.
pub fn alpha_entry() -> MethodRef {
    method_ref(SCENARIO, "alphaBeta", &[], "I")
}

/// `Scenario.gammaDelta()`: writes "hello" to a `StringWriter`, wraps it in
/// a `Gamma` and returns `getWriter().toString()` through a `Delta`.
pub fn gamma_entry() -> MethodRef {
    method_ref(SCENARIO, "gammaDelta", &[], STRING)
}

pub fn alpha_classes() -> Vec<ClassBuilder> {
    let alpha = ClassBuilder::concrete(ALPHA)
        .extends(OBJECT)
        .field("x", "I", AccessFlags::PRIVATE | AccessFlags::STATIC)
        .method(
            "<init>",
            &["I"],
            "V",
            ctor(),
            2,
            vec![
                load_param(ValueKind::Object, 0, 0),
                load_param(ValueKind::Int, 1, 1),
                invoke(InvokeKind::Direct, method_ref(OBJECT, "<init>", &[], "V"), &[0]),
                Instruction::SPut {
                    kind: ValueKind::Int,
                    src: 1,
                    field: field_ref(ALPHA, "x", "I"),
                },
                Instruction::ReturnVoid,
            ],
        )
        .method(
            "access$000",
            &[],
            "I",
            accessor_flags(),
            1,
            vec![
                Instruction::SGet {
                    kind: ValueKind::Int,
                    dest: 0,
                    field: field_ref(ALPHA, "x", "I"),
                },
                ret(ValueKind::Int, 0),
            ],
        );

    let beta = ClassBuilder::concrete(BETA)
        .extends(OBJECT)
        .field("this$0", ALPHA, AccessFlags::FINAL | AccessFlags::SYNTHETIC)
        .method(
            "<init>",
            &[ALPHA],
            "V",
            ctor(),
            2,
            vec![
                load_param(ValueKind::Object, 0, 0),
                load_param(ValueKind::Object, 1, 1),
                Instruction::IPut {
                    kind: ValueKind::Object,
                    src: 1,
                    object: 0,
                    field: field_ref(BETA, "this$0", ALPHA),
                },
                invoke(InvokeKind::Direct, method_ref(OBJECT, "<init>", &[], "V"), &[0]),
                Instruction::ReturnVoid,
            ],
        )
        .method(
            "doublex",
            &[],
            "I",
            AccessFlags::PUBLIC,
            3,
            vec![
                load_param(ValueKind::Object, 2, 0),
                Instruction::Position(31),
                invoke(InvokeKind::Static, alpha_accessor(), &[]),
                move_result(ValueKind::Int, 0),
                Instruction::Const { dest: 1, value: 2 },
                Instruction::BinOp {
                    op: BinOp::Mul,
                    dest: 0,
                    lhs: 1,
                    rhs: 0,
                },
                ret(ValueKind::Int, 0),
            ],
        );

    vec![alpha, beta]
}

pub fn gamma_classes() -> Vec<ClassBuilder> {
    let gamma = ClassBuilder::concrete(GAMMA)
        .extends(FILTER_WRITER)
        .method(
            "<init>",
            &[WRITER],
            "V",
            ctor(),
            2,
            vec![
                load_param(ValueKind::Object, 0, 0),
                load_param(ValueKind::Object, 1, 1),
                invoke(
                    InvokeKind::Direct,
                    method_ref(FILTER_WRITER, "<init>", &[WRITER], "V"),
                    &[0, 1],
                ),
                Instruction::ReturnVoid,
            ],
        )
        .method(
            "access$000",
            &[GAMMA],
            WRITER,
            accessor_flags(),
            2,
            vec![
                load_param(ValueKind::Object, 1, 0),
                Instruction::IGet {
                    kind: ValueKind::Object,
                    dest: 0,
                    object: 1,
                    field: field_ref(GAMMA, "out", WRITER),
                },
                ret(ValueKind::Object, 0),
            ],
        );

    let delta = ClassBuilder::concrete(DELTA)
        .extends(OBJECT)
        .field("this$0", GAMMA, AccessFlags::FINAL | AccessFlags::SYNTHETIC)
        .method(
            "<init>",
            &[GAMMA],
            "V",
            ctor(),
            2,
            vec![
                load_param(ValueKind::Object, 0, 0),
                load_param(ValueKind::Object, 1, 1),
                Instruction::IPut {
                    kind: ValueKind::Object,
                    src: 1,
                    object: 0,
                    field: field_ref(DELTA, "this$0", GAMMA),
                },
                invoke(InvokeKind::Direct, method_ref(OBJECT, "<init>", &[], "V"), &[0]),
                Instruction::ReturnVoid,
            ],
        )
        .method(
            "getWriter",
            &[],
            WRITER,
            AccessFlags::PUBLIC,
            2,
            vec![
                load_param(ValueKind::Object, 1, 0),
                Instruction::IGet {
                    kind: ValueKind::Object,
                    dest: 0,
                    object: 1,
                    field: field_ref(DELTA, "this$0", GAMMA),
                },
                invoke(InvokeKind::Static, gamma_accessor(), &[0]),
                move_result(ValueKind::Object, 0),
                ret(ValueKind::Object, 0),
            ],
        );

    vec![gamma, delta]
}

fn scenario_class() -> ClassBuilder {
    ClassBuilder::concrete(SCENARIO)
        .extends(OBJECT)
        .method(
            "alphaBeta",
            &[],
            "I",
            entry_flags(),
            4,
            vec![
                Instruction::NewInstance {
                    dest: 0,
                    class: ALPHA.to_string(),
                },
                Instruction::Const { dest: 1, value: 12 },
                invoke(InvokeKind::Direct, method_ref(ALPHA, "<init>", &["I"], "V"), &[0, 1]),
                Instruction::NewInstance {
                    dest: 2,
                    class: BETA.to_string(),
                },
                invoke(InvokeKind::Direct, method_ref(BETA, "<init>", &[ALPHA], "V"), &[2, 0]),
                invoke(InvokeKind::Virtual, method_ref(BETA, "doublex", &[], "I"), &[2]),
                move_result(ValueKind::Int, 3),
                ret(ValueKind::Int, 3),
            ],
        )
        .method(
            "gammaDelta",
            &[],
            STRING,
            entry_flags(),
            5,
            vec![
                Instruction::NewInstance {
                    dest: 0,
                    class: STRING_WRITER.to_string(),
                },
                invoke(InvokeKind::Direct, method_ref(STRING_WRITER, "<init>", &[], "V"), &[0]),
                Instruction::ConstString {
                    dest: 1,
                    value: "hello".to_string(),
                },
                invoke(
                    InvokeKind::Virtual,
                    method_ref(WRITER, "write", &[STRING], "V"),
                    &[0, 1],
                ),
                Instruction::NewInstance {
                    dest: 2,
                    class: GAMMA.to_string(),
                },
                invoke(InvokeKind::Direct, method_ref(GAMMA, "<init>", &[WRITER], "V"), &[2, 0]),
                Instruction::NewInstance {
                    dest: 3,
                    class: DELTA.to_string(),
                },
                invoke(InvokeKind::Direct, method_ref(DELTA, "<init>", &[GAMMA], "V"), &[3, 2]),
                invoke(InvokeKind::Virtual, method_ref(DELTA, "getWriter", &[], WRITER), &[3]),
                move_result(ValueKind::Object, 4),
                invoke(InvokeKind::Virtual, method_ref(OBJECT, "toString", &[], STRING), &[4]),
                move_result(ValueKind::Object, 4),
                ret(ValueKind::Object, 4),
            ],
        )
}

/// Both scenarios in one program, with library stubs.
pub fn safe_synth_getter_removal() -> Program {
    let mut builder = ProgramBuilder::new();
    for class in java_io_stubs()
        .into_iter()
        .chain(alpha_classes())
        .chain(gamma_classes())
        .chain([scenario_class()])
    {
        builder = builder.class(class);
    }
    builder.build()
}
