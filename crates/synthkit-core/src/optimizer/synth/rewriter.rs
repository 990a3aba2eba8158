//! Call-site rewriting and accessor cleanup.
//!
//! Rewrites are transactional per candidate. `stage` only reads the program
//! and produces every edit the candidate needs, or the reason it cannot be
//! done; nothing is touched until `commit`. Commit groups the edits of all
//! staged candidates by caller method and rebuilds each affected body once,
//! so positions recorded at staging time stay valid.

use super::classifier::Approval;
use super::detector::AccessKind;
use crate::config::ExclusionFilter;
use crate::errors::RewriteError;
use crate::ir::{FieldRef, Instruction, MethodRef, MethodSig, Program, Visibility};
use crate::optimizer::analysis::{CallSiteIndex, ClassHierarchy};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tracing::debug;

/// Replacement of one invoke (and its move-result, for reads).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSiteEdit {
    pub caller: MethodRef,
    pub position: usize,
    /// Position of the consumed move-result, if any
    pub move_result: Option<usize>,
    pub replacement: Instruction,
}

/// Every edit one approved candidate needs, verified but not yet applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedRewrite {
    pub accessor: MethodRef,
    pub edits: Vec<CallSiteEdit>,
    pub relax: Option<(FieldRef, Visibility)>,
}

/// What a commit changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    pub call_sites_rewritten: FxHashMap<MethodRef, usize>,
    pub fields_relaxed: usize,
}

pub struct AccessorRewriter<'a> {
    program: &'a Program,
    hierarchy: &'a ClassHierarchy,
    call_sites: &'a CallSiteIndex,
    filter: &'a ExclusionFilter,
}

impl<'a> AccessorRewriter<'a> {
    pub fn new(
        program: &'a Program,
        hierarchy: &'a ClassHierarchy,
        call_sites: &'a CallSiteIndex,
        filter: &'a ExclusionFilter,
    ) -> Self {
        Self {
            program,
            hierarchy,
            call_sites,
            filter,
        }
    }

    /// Build and verify the edits for one candidate. Call sites inside
    /// excluded or non-concrete classes are never edited; the classifier
    /// rejects candidates that have any.
    pub fn stage(&self, approval: &Approval) -> Result<StagedRewrite, RewriteError> {
        let candidate = &approval.candidate;

        if let Some(index) = candidate.instance_param {
            let object_type = &candidate.param_types[index];
            if !self
                .hierarchy
                .is_subclass_of(object_type, &candidate.field.owner)
            {
                return Err(RewriteError::ObjectTypeMismatch {
                    expected: candidate.field.owner.clone(),
                    found: object_type.clone(),
                });
            }
        }

        let mut edits = Vec::new();
        for site in self.call_sites.sites(&candidate.method) {
            if self.filter.is_excluded(&site.caller.owner)
                || !self.hierarchy.is_concrete(&site.caller.owner)
            {
                continue;
            }
            let caller_name = site.caller.to_string();
            let stale = || RewriteError::StaleCallSite {
                caller: caller_name.clone(),
                position: site.position,
            };

            let caller = self.program.method(&site.caller).ok_or_else(stale)?;
            let code = caller.instructions();
            let args = match code.get(site.position) {
                Some(Instruction::Invoke { method, args, .. }) if method == &candidate.method => {
                    args
                }
                _ => return Err(stale()),
            };

            if args.len() != candidate.arity() {
                return Err(RewriteError::ArityMismatch {
                    caller: caller_name,
                    position: site.position,
                    expected: candidate.arity(),
                    found: args.len(),
                });
            }
            if let Some(&register) = args.iter().find(|r| **r >= caller.registers) {
                return Err(RewriteError::RegisterOutOfRange {
                    caller: caller_name,
                    position: site.position,
                    register,
                    registers: caller.registers,
                });
            }

            let object = candidate.instance_param.map(|i| args[i]);
            let field = candidate.field.clone();
            let kind = candidate.value_kind;

            let (replacement, move_result) = match candidate.kind {
                AccessKind::Read => {
                    let (mr_position, dest) = match next_real(code, site.position) {
                        Some((p, Instruction::MoveResult { kind: found, dest })) => {
                            if *found != kind {
                                return Err(RewriteError::ResultKindMismatch {
                                    caller: caller_name,
                                    position: site.position,
                                    expected: kind.to_string(),
                                    found: found.to_string(),
                                });
                            }
                            (p, *dest)
                        }
                        _ => {
                            return Err(RewriteError::DiscardedResult {
                                caller: caller_name,
                                position: site.position,
                            })
                        }
                    };
                    if dest >= caller.registers {
                        return Err(RewriteError::RegisterOutOfRange {
                            caller: caller_name,
                            position: mr_position,
                            register: dest,
                            registers: caller.registers,
                        });
                    }
                    let insn = match object {
                        Some(object) => Instruction::IGet {
                            kind,
                            dest,
                            object,
                            field,
                        },
                        None => Instruction::SGet { kind, dest, field },
                    };
                    (insn, Some(mr_position))
                }
                AccessKind::Write => {
                    let src = match candidate.value_param {
                        Some(index) => args[index],
                        None => {
                            return Err(RewriteError::MissingValueOperand {
                                accessor: candidate.method.to_string(),
                            })
                        }
                    };
                    let insn = match object {
                        Some(object) => Instruction::IPut {
                            kind,
                            src,
                            object,
                            field,
                        },
                        None => Instruction::SPut { kind, src, field },
                    };
                    (insn, None)
                }
            };

            edits.push(CallSiteEdit {
                caller: site.caller.clone(),
                position: site.position,
                move_result,
                replacement,
            });
        }

        Ok(StagedRewrite {
            accessor: candidate.method.clone(),
            edits,
            relax: approval
                .relax_to
                .map(|visibility| (approval.declared.clone(), visibility)),
        })
    }
}

/// Next non-position instruction after `position`.
fn next_real(code: &[Instruction], position: usize) -> Option<(usize, &Instruction)> {
    code.iter()
        .enumerate()
        .skip(position + 1)
        .find(|(_, insn)| !matches!(insn, Instruction::Position(_)))
}

/// Apply staged rewrites. Each caller body is rebuilt once with all of its
/// edits; caller classes are processed in parallel.
pub fn commit(program: &mut Program, staged: &[StagedRewrite]) -> CommitSummary {
    let mut by_class: FxHashMap<&str, FxHashMap<&MethodSig, Vec<&CallSiteEdit>>> =
        FxHashMap::default();
    let mut summary = CommitSummary::default();

    for rewrite in staged {
        summary
            .call_sites_rewritten
            .insert(rewrite.accessor.clone(), rewrite.edits.len());
        for edit in &rewrite.edits {
            by_class
                .entry(edit.caller.owner.as_str())
                .or_default()
                .entry(&edit.caller.sig)
                .or_default()
                .push(edit);
        }
    }

    program.classes.par_values_mut().for_each(|class| {
        let Some(methods) = by_class.get(class.name.as_str()) else {
            return;
        };
        for (sig, edits) in methods {
            if let Some(code) = class
                .methods
                .get_mut(*sig)
                .and_then(|method| method.code.as_mut())
            {
                apply_edits(code, edits);
            }
        }
    });

    for rewrite in staged {
        let Some((field, visibility)) = &rewrite.relax else {
            continue;
        };
        let Some(declared) = program
            .class_mut(&field.owner)
            .and_then(|class| class.fields.get_mut(&field.name))
        else {
            continue;
        };
        if declared.visibility() < *visibility {
            debug!("widening {} to {:?}", field, visibility);
            declared.access = declared.access.with_visibility(*visibility);
            summary.fields_relaxed += 1;
        }
    }

    summary
}

/// Rebuild one body with all of its edits in a single sweep.
fn apply_edits(code: &mut Vec<Instruction>, edits: &[&CallSiteEdit]) {
    let replace: FxHashMap<usize, &Instruction> = edits
        .iter()
        .map(|edit| (edit.position, &edit.replacement))
        .collect();
    let consumed: Vec<usize> = edits.iter().filter_map(|edit| edit.move_result).collect();

    let old = std::mem::take(code);
    code.reserve(old.len());
    for (position, insn) in old.into_iter().enumerate() {
        if let Some(replacement) = replace.get(&position) {
            code.push((*replacement).clone());
        } else if !consumed.contains(&position) {
            code.push(insn);
        }
    }
}

/// Delete accessors that no longer have any call site. Returns the removed
/// methods in the order given.
pub fn remove_dead_accessors(program: &mut Program, accessors: &[MethodRef]) -> Vec<MethodRef> {
    let index = CallSiteIndex::build(program);
    let mut removed = Vec::new();
    for accessor in accessors {
        if index.count(accessor) > 0 {
            continue;
        }
        if let Some(class) = program.class_mut(&accessor.owner) {
            if class.methods.shift_remove(&accessor.sig).is_some() {
                debug!("removed dead accessor {}", accessor);
                removed.push(accessor.clone());
            }
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{AccessFlags, ClassUnit, Field, InvokeKind, Method, ValueKind};
    use crate::optimizer::synth::classifier::Approval;
    use crate::optimizer::synth::detector::match_accessor;

    const OUTER: &str = "Lcom/example/Outer;";
    const INNER: &str = "Lcom/example/Outer$Inner;";

    fn getter_sig() -> MethodSig {
        MethodSig::new("access$000", [OUTER], "I")
    }

    fn setter_sig() -> MethodSig {
        MethodSig::new("access$002", [OUTER, "I"], "V")
    }

    fn field_ref() -> FieldRef {
        FieldRef::new(OUTER, "f", "I")
    }

    fn outer() -> ClassUnit {
        let mut outer = ClassUnit::new(OUTER, None, true);
        outer.fields.insert(
            "f".to_string(),
            Field {
                owner: OUTER.to_string(),
                name: "f".to_string(),
                ty: "I".to_string(),
                access: AccessFlags::PRIVATE,
            },
        );
        outer.methods.insert(
            getter_sig(),
            Method {
                owner: OUTER.to_string(),
                sig: getter_sig(),
                access: AccessFlags::STATIC | AccessFlags::SYNTHETIC,
                registers: 2,
                code: Some(vec![
                    Instruction::LoadParam {
                        kind: ValueKind::Object,
                        dest: 1,
                        index: 0,
                    },
                    Instruction::IGet {
                        kind: ValueKind::Int,
                        dest: 0,
                        object: 1,
                        field: field_ref(),
                    },
                    Instruction::Return {
                        kind: ValueKind::Int,
                        src: 0,
                    },
                ]),
            },
        );
        outer.methods.insert(
            setter_sig(),
            Method {
                owner: OUTER.to_string(),
                sig: setter_sig(),
                access: AccessFlags::STATIC | AccessFlags::SYNTHETIC,
                registers: 2,
                code: Some(vec![
                    Instruction::LoadParam {
                        kind: ValueKind::Object,
                        dest: 0,
                        index: 0,
                    },
                    Instruction::LoadParam {
                        kind: ValueKind::Int,
                        dest: 1,
                        index: 1,
                    },
                    Instruction::IPut {
                        kind: ValueKind::Int,
                        src: 1,
                        object: 0,
                        field: field_ref(),
                    },
                    Instruction::ReturnVoid,
                ]),
            },
        );
        outer
    }

    fn inner(body: Vec<Instruction>) -> ClassUnit {
        let mut inner = ClassUnit::new(INNER, None, true);
        let sig = MethodSig::new("run", [OUTER], "I");
        inner.methods.insert(
            sig.clone(),
            Method {
                owner: INNER.to_string(),
                sig,
                access: AccessFlags::PUBLIC | AccessFlags::STATIC,
                registers: 4,
                code: Some(body),
            },
        );
        inner
    }

    fn invoke(sig: MethodSig, args: Vec<u16>) -> Instruction {
        Instruction::Invoke {
            kind: InvokeKind::Static,
            method: MethodRef::new(OUTER, sig),
            args,
        }
    }

    fn approval(program: &Program, sig: MethodSig) -> Approval {
        let method = program.method(&MethodRef::new(OUTER, sig)).unwrap();
        Approval {
            candidate: match_accessor(method, false).unwrap(),
            declared: field_ref(),
            relax_to: Some(Visibility::Package),
        }
    }

    fn run_body() -> Vec<Instruction> {
        vec![
            Instruction::LoadParam {
                kind: ValueKind::Object,
                dest: 0,
                index: 0,
            },
            Instruction::Const { dest: 1, value: 5 },
            invoke(setter_sig(), vec![0, 1]),
            Instruction::Position(42),
            invoke(getter_sig(), vec![0]),
            Instruction::Position(43),
            Instruction::MoveResult {
                kind: ValueKind::Int,
                dest: 2,
            },
            Instruction::Return {
                kind: ValueKind::Int,
                src: 2,
            },
        ]
    }

    #[test]
    fn test_stage_and_commit_both_accessors_in_one_body() {
        let mut program = Program::new();
        program.add_class(outer());
        program.add_class(inner(run_body()));

        let hierarchy = ClassHierarchy::build(&program);
        let call_sites = CallSiteIndex::build(&program);
        let filter = ExclusionFilter::default();
        let rewriter = AccessorRewriter::new(&program, &hierarchy, &call_sites, &filter);

        let staged = vec![
            rewriter.stage(&approval(&program, getter_sig())).unwrap(),
            rewriter.stage(&approval(&program, setter_sig())).unwrap(),
        ];

        let summary = commit(&mut program, &staged);
        assert_eq!(summary.fields_relaxed, 1);

        let run = program
            .method(&MethodRef::new(INNER, MethodSig::new("run", [OUTER], "I")))
            .unwrap();
        assert_eq!(
            run.instructions(),
            &[
                Instruction::LoadParam {
                    kind: ValueKind::Object,
                    dest: 0,
                    index: 0,
                },
                Instruction::Const { dest: 1, value: 5 },
                Instruction::IPut {
                    kind: ValueKind::Int,
                    src: 1,
                    object: 0,
                    field: field_ref(),
                },
                Instruction::Position(42),
                Instruction::IGet {
                    kind: ValueKind::Int,
                    dest: 2,
                    object: 0,
                    field: field_ref(),
                },
                Instruction::Position(43),
                Instruction::Return {
                    kind: ValueKind::Int,
                    src: 2,
                },
            ]
        );

        let field = program.class(OUTER).unwrap().field("f").unwrap();
        assert_eq!(field.visibility(), Visibility::Package);

        let removed = remove_dead_accessors(
            &mut program,
            &[
                MethodRef::new(OUTER, getter_sig()),
                MethodRef::new(OUTER, setter_sig()),
            ],
        );
        assert_eq!(removed.len(), 2);
        assert!(program.class(OUTER).unwrap().methods.is_empty());
    }

    #[test]
    fn test_discarded_read_result_fails_staging() {
        let mut program = Program::new();
        program.add_class(outer());
        program.add_class(inner(vec![
            Instruction::LoadParam {
                kind: ValueKind::Object,
                dest: 0,
                index: 0,
            },
            invoke(getter_sig(), vec![0]),
            Instruction::Const { dest: 1, value: 0 },
            Instruction::Return {
                kind: ValueKind::Int,
                src: 1,
            },
        ]));

        let hierarchy = ClassHierarchy::build(&program);
        let call_sites = CallSiteIndex::build(&program);
        let filter = ExclusionFilter::default();
        let rewriter = AccessorRewriter::new(&program, &hierarchy, &call_sites, &filter);
        let err = rewriter
            .stage(&approval(&program, getter_sig()))
            .unwrap_err();
        assert!(matches!(err, RewriteError::DiscardedResult { .. }));
    }

    #[test]
    fn test_result_kind_mismatch_fails_staging() {
        let mut program = Program::new();
        program.add_class(outer());
        program.add_class(inner(vec![
            Instruction::LoadParam {
                kind: ValueKind::Object,
                dest: 0,
                index: 0,
            },
            invoke(getter_sig(), vec![0]),
            Instruction::MoveResult {
                kind: ValueKind::Wide,
                dest: 2,
            },
            Instruction::Return {
                kind: ValueKind::Int,
                src: 2,
            },
        ]));

        let hierarchy = ClassHierarchy::build(&program);
        let call_sites = CallSiteIndex::build(&program);
        let filter = ExclusionFilter::default();
        let rewriter = AccessorRewriter::new(&program, &hierarchy, &call_sites, &filter);
        let err = rewriter
            .stage(&approval(&program, getter_sig()))
            .unwrap_err();
        assert!(matches!(err, RewriteError::ResultKindMismatch { .. }));
    }

    #[test]
    fn test_arity_mismatch_fails_staging() {
        let mut program = Program::new();
        program.add_class(outer());
        program.add_class(inner(vec![
            invoke(getter_sig(), vec![]),
            Instruction::MoveResult {
                kind: ValueKind::Int,
                dest: 2,
            },
            Instruction::Return {
                kind: ValueKind::Int,
                src: 2,
            },
        ]));

        let hierarchy = ClassHierarchy::build(&program);
        let call_sites = CallSiteIndex::build(&program);
        let filter = ExclusionFilter::default();
        let rewriter = AccessorRewriter::new(&program, &hierarchy, &call_sites, &filter);
        let err = rewriter
            .stage(&approval(&program, getter_sig()))
            .unwrap_err();
        assert!(matches!(
            err,
            RewriteError::ArityMismatch {
                expected: 1,
                found: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_write_without_value_operand_fails_staging() {
        let mut program = Program::new();
        program.add_class(outer());
        program.add_class(inner(run_body()));

        let hierarchy = ClassHierarchy::build(&program);
        let call_sites = CallSiteIndex::build(&program);
        let filter = ExclusionFilter::default();
        let rewriter = AccessorRewriter::new(&program, &hierarchy, &call_sites, &filter);
        let mut approval = approval(&program, setter_sig());
        approval.candidate.value_param = None;
        let err = rewriter.stage(&approval).unwrap_err();
        assert!(matches!(err, RewriteError::MissingValueOperand { .. }));
    }

    #[test]
    fn test_non_concrete_caller_is_not_edited() {
        let mut program = Program::new();
        program.add_class(outer());
        let mut stub = inner(run_body());
        stub.concrete = false;
        program.add_class(stub);
        let before = program.clone();

        let hierarchy = ClassHierarchy::build(&program);
        let call_sites = CallSiteIndex::build(&program);
        let filter = ExclusionFilter::default();
        let rewriter = AccessorRewriter::new(&program, &hierarchy, &call_sites, &filter);
        let mut staged = rewriter.stage(&approval(&program, getter_sig())).unwrap();
        assert!(staged.edits.is_empty());

        staged.relax = None;
        commit(&mut program, &[staged]);
        assert_eq!(program, before);
    }

    #[test]
    fn test_excluded_caller_is_not_edited() {
        let mut program = Program::new();
        program.add_class(outer());
        program.add_class(inner(run_body()));

        let hierarchy = ClassHierarchy::build(&program);
        let call_sites = CallSiteIndex::build(&program);
        let filter = ExclusionFilter::new(&[INNER.to_string()]).unwrap();
        let rewriter = AccessorRewriter::new(&program, &hierarchy, &call_sites, &filter);
        let staged = rewriter.stage(&approval(&program, getter_sig())).unwrap();
        assert!(staged.edits.is_empty());

        commit(&mut program, &[staged]);
        let removed = remove_dead_accessors(&mut program, &[MethodRef::new(OUTER, getter_sig())]);
        assert!(removed.is_empty());
    }
}
