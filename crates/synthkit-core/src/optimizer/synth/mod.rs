//! Synthetic accessor removal.
//!
//! Each pass builds the class hierarchy and call-site index once, detects
//! accessor candidates, classifies them against the resolver, and rewrites
//! the approved ones. Detection and classification are read-only and run in
//! parallel; rewriting is staged per candidate and committed in one batch.

pub mod classifier;
pub mod detector;
pub mod report;
pub mod resolver;
pub mod rewriter;

pub use classifier::{Approval, Classification, SafetyClassifier};
pub use detector::{match_accessor, AccessKind, AccessorCandidate, AccessorDetector, ShapeMismatch};
pub use report::{AnalysisWarning, CandidateOutcome, Disposition, ReasonCode, SynthReport};
pub use resolver::{ExternalCause, FieldResolution, FieldResolver};
pub use rewriter::{AccessorRewriter, CallSiteEdit, CommitSummary, StagedRewrite};

use super::analysis::{CallSiteIndex, ClassHierarchy};
use super::ProgramPass;
use crate::config::{ExclusionFilter, SynthConfig};
use crate::errors::{Result, SynthError};
use crate::ir::{MethodRef, Program};
use rayon::prelude::*;
use report::{
    METRIC_ACCESSORS_REMOVED, METRIC_APPROVED, METRIC_CALL_SITES_REWRITTEN, METRIC_CANDIDATES,
    METRIC_FAILED, METRIC_FIELDS_RELAXED, METRIC_PASSES, METRIC_REJECTED,
};
use rustc_hash::FxHashSet;
use tracing::{debug, info, warn};

pub struct SynthPass {
    config: SynthConfig,
    filter: ExclusionFilter,
    last_report: Option<SynthReport>,
}

impl SynthPass {
    pub fn new(config: SynthConfig) -> Result<Self> {
        config.validate()?;
        let filter = ExclusionFilter::new(&config.exclude_patterns)?;
        Ok(Self {
            config,
            filter,
            last_report: None,
        })
    }

    /// Report of the most recent `ProgramPass::run`.
    pub fn take_report(&mut self) -> Option<SynthReport> {
        self.last_report.take()
    }

    /// Run the pass over `program` in place.
    ///
    /// On error the program is left exactly as it was given.
    pub fn apply(&mut self, program: &mut Program) -> Result<SynthReport> {
        program.validate()?;

        let mut report = SynthReport {
            input_fingerprint: program.fingerprint(),
            ..SynthReport::default()
        };
        let limit = self.config.pass_limit();
        // Earlier passes are already committed when a later one aborts.
        let snapshot = (self.config.fail_fast && limit > 1).then(|| program.clone());
        let mut seen: FxHashSet<MethodRef> = FxHashSet::default();

        for pass in 1..=limit {
            let approved = match self.run_pass(program, pass, &mut seen, &mut report) {
                Ok(approved) => approved,
                Err(err) => {
                    if let Some(snapshot) = snapshot {
                        *program = snapshot;
                    }
                    return Err(err);
                }
            };
            report.passes = pass;
            if approved == 0 {
                break;
            }
            debug!("pass {} approved {} accessors", pass, approved);
        }

        report.incr_metric(METRIC_PASSES, u64::from(report.passes));
        report.warnings.sort();
        report.warnings.dedup();
        report.output_fingerprint = program.fingerprint();

        info!("synthetic accessor removal: {}", report.summary());
        self.last_report = Some(report.clone());
        Ok(report)
    }

    /// One detect, classify and rewrite round. Returns the number of
    /// approved candidates.
    fn run_pass(
        &self,
        program: &mut Program,
        pass: u32,
        seen: &mut FxHashSet<MethodRef>,
        report: &mut SynthReport,
    ) -> Result<usize> {
        let hierarchy = ClassHierarchy::build(program);
        let call_sites = CallSiteIndex::build(program);

        let candidates: Vec<AccessorCandidate> =
            AccessorDetector::new(&self.filter, self.config.require_synthetic_flag)
                .detect(program)
                .into_iter()
                .filter(|candidate| !seen.contains(&candidate.method))
                .collect();
        report.incr_metric(METRIC_CANDIDATES, candidates.len() as u64);
        if candidates.is_empty() {
            return Ok(0);
        }
        seen.extend(candidates.iter().map(|candidate| candidate.method.clone()));

        let classifier = SafetyClassifier::new(
            program,
            &hierarchy,
            &call_sites,
            &self.filter,
            self.config.relax_field_visibility,
        );
        let classified: Vec<Classification> = candidates
            .into_par_iter()
            .map(|candidate| classifier.classify(candidate))
            .collect();

        let stager = AccessorRewriter::new(program, &hierarchy, &call_sites, &self.filter);
        let mut outcomes = Vec::with_capacity(classified.len());
        let mut staged: Vec<StagedRewrite> = Vec::new();

        for classification in classified {
            match classification {
                Classification::Rejected {
                    candidate,
                    reason,
                    detail,
                } => {
                    if reason == ReasonCode::HierarchyCycle {
                        report.warnings.push(AnalysisWarning {
                            reason,
                            message: detail.clone(),
                        });
                    }
                    outcomes.push(outcome(&candidate, pass, Disposition::Rejected { reason, detail }));
                }
                Classification::Approved(approval) => match stager.stage(&approval) {
                    Ok(rewrite) => {
                        outcomes.push(outcome(
                            &approval.candidate,
                            pass,
                            Disposition::Approved {
                                call_sites_rewritten: rewrite.edits.len(),
                                removed: false,
                            },
                        ));
                        staged.push(rewrite);
                    }
                    Err(err) if self.config.fail_fast => {
                        return Err(SynthError::RewriteAborted {
                            accessor: approval.candidate.method.to_string(),
                            source: err,
                        });
                    }
                    Err(err) => {
                        warn!("rewrite of {} failed verification: {}", approval.candidate.method, err);
                        outcomes.push(outcome(
                            &approval.candidate,
                            pass,
                            Disposition::Failed {
                                reason: ReasonCode::RewriteVerificationFailure,
                                detail: err.to_string(),
                            },
                        ));
                    }
                },
            }
        }

        let summary = rewriter::commit(program, &staged);
        let accessors: Vec<MethodRef> = staged.iter().map(|s| s.accessor.clone()).collect();
        let removed: FxHashSet<MethodRef> = rewriter::remove_dead_accessors(program, &accessors)
            .into_iter()
            .collect();

        for outcome in &mut outcomes {
            if let Disposition::Approved { removed: flag, .. } = &mut outcome.disposition {
                *flag = removed.contains(&outcome.accessor);
            }
        }

        let approved = outcomes.iter().filter(|o| o.is_approved()).count();
        let rejected = outcomes.iter().filter(|o| o.is_rejected()).count();
        let failed = outcomes.iter().filter(|o| o.is_failed()).count();
        let rewritten: usize = summary.call_sites_rewritten.values().sum();

        report.incr_metric(METRIC_APPROVED, approved as u64);
        report.incr_metric(METRIC_REJECTED, rejected as u64);
        report.incr_metric(METRIC_FAILED, failed as u64);
        report.incr_metric(METRIC_CALL_SITES_REWRITTEN, rewritten as u64);
        report.incr_metric(METRIC_ACCESSORS_REMOVED, removed.len() as u64);
        report.incr_metric(METRIC_FIELDS_RELAXED, summary.fields_relaxed as u64);
        report.outcomes.extend(outcomes);

        Ok(approved)
    }
}

fn outcome(candidate: &AccessorCandidate, pass: u32, disposition: Disposition) -> CandidateOutcome {
    CandidateOutcome {
        accessor: candidate.method.clone(),
        field: candidate.field.clone(),
        kind: candidate.kind,
        pass,
        disposition,
    }
}

impl ProgramPass for SynthPass {
    fn name(&self) -> &'static str {
        "synthetic-accessor-removal"
    }

    fn run(&mut self, program: &mut Program) -> Result<bool> {
        let report = self.apply(program)?;
        Ok(report.input_fingerprint != report.output_fingerprint)
    }
}

/// Run the pass once with `config`, returning the rewritten program and
/// the report.
pub fn run(program: Program, config: &SynthConfig) -> Result<(Program, SynthReport)> {
    let mut program = program;
    let mut pass = SynthPass::new(config.clone())?;
    let report = pass.apply(&mut program)?;
    Ok((program, report))
}
