//! Chained accessors: an accessor that only forwards to another accessor
//! becomes a plain accessor once the inner one is inlined.

use synthkit_core::ir::{AccessFlags, Instruction, InvokeKind, MethodRef, ValueKind};
use synthkit_core::optimizer::synth::report::METRIC_PASSES;
use synthkit_core::{run, Program, SynthConfig};
use synthkit_test_helpers::builder::{field_ref, invoke, method_ref, move_result, ret};
use synthkit_test_helpers::{ClassBuilder, Interpreter, ProgramBuilder, Value};

const OUTER: &str = "Lcom/example/Outer;";
const INNER: &str = "Lcom/example/Outer$Inner;";

fn inner_accessor() -> MethodRef {
    method_ref(OUTER, "access$000", &[], "I")
}

fn forwarding_accessor() -> MethodRef {
    method_ref(OUTER, "access$100", &[], "I")
}

fn read() -> MethodRef {
    method_ref(INNER, "read", &[], "I")
}

fn chained() -> Program {
    let synthetic = AccessFlags::STATIC | AccessFlags::SYNTHETIC;
    ProgramBuilder::new()
        .class(
            ClassBuilder::concrete(OUTER)
                .field("x", "I", AccessFlags::PRIVATE | AccessFlags::STATIC)
                .method(
                    "<clinit>",
                    &[],
                    "V",
                    AccessFlags::STATIC | AccessFlags::CONSTRUCTOR,
                    1,
                    vec![
                        Instruction::Const { dest: 0, value: 7 },
                        Instruction::SPut {
                            kind: ValueKind::Int,
                            src: 0,
                            field: field_ref(OUTER, "x", "I"),
                        },
                        Instruction::ReturnVoid,
                    ],
                )
                .method(
                    "access$000",
                    &[],
                    "I",
                    synthetic,
                    1,
                    vec![
                        Instruction::SGet {
                            kind: ValueKind::Int,
                            dest: 0,
                            field: field_ref(OUTER, "x", "I"),
                        },
                        ret(ValueKind::Int, 0),
                    ],
                )
                .method(
                    "access$100",
                    &[],
                    "I",
                    synthetic,
                    1,
                    vec![
                        invoke(InvokeKind::Static, inner_accessor(), &[]),
                        move_result(ValueKind::Int, 0),
                        ret(ValueKind::Int, 0),
                    ],
                ),
        )
        .class(ClassBuilder::concrete(INNER).method(
            "read",
            &[],
            "I",
            AccessFlags::PUBLIC | AccessFlags::STATIC,
            2,
            vec![
                invoke(
                    InvokeKind::Static,
                    method_ref(OUTER, "<clinit>", &[], "V"),
                    &[],
                ),
                invoke(InvokeKind::Static, forwarding_accessor(), &[]),
                move_result(ValueKind::Int, 1),
                ret(ValueKind::Int, 1),
            ],
        ))
        .build()
}

fn read_value(program: &Program) -> Value {
    Interpreter::new(program).call_static(&read(), vec![]).unwrap()
}

#[test]
fn test_single_pass_leaves_forwarding_accessor() {
    let before = chained();
    assert_eq!(read_value(&before), Value::Int(7));

    let (after, report) = run(before, &SynthConfig::default()).unwrap();
    assert_eq!(report.passes, 1);
    assert!(!after.contains_method(&inner_accessor()));
    assert!(after.contains_method(&forwarding_accessor()));
    assert!(report.outcome(&forwarding_accessor()).is_none());
    assert_eq!(read_value(&after), Value::Int(7));
}

#[test]
fn test_fixpoint_removes_the_whole_chain() {
    let config = SynthConfig {
        iterate_to_fixpoint: true,
        ..SynthConfig::default()
    };
    let (after, report) = run(chained(), &config).unwrap();

    assert!(!after.contains_method(&inner_accessor()));
    assert!(!after.contains_method(&forwarding_accessor()));
    assert_eq!(report.outcome(&inner_accessor()).map(|o| o.pass), Some(1));
    assert_eq!(report.outcome(&forwarding_accessor()).map(|o| o.pass), Some(2));
    assert_eq!(report.approved(), 2);
    assert_eq!(report.passes, 3);
    assert_eq!(report.metric(METRIC_PASSES), 3);
    assert_eq!(read_value(&after), Value::Int(7));
}

#[test]
fn test_max_passes_bounds_iteration() {
    let config = SynthConfig {
        iterate_to_fixpoint: true,
        max_passes: 1,
        ..SynthConfig::default()
    };
    let (after, report) = run(chained(), &config).unwrap();
    assert_eq!(report.passes, 1);
    assert!(after.contains_method(&forwarding_accessor()));
}
