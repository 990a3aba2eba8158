//! Per-candidate outcomes and pass metrics.

use super::detector::AccessKind;
use crate::ir::{FieldRef, MethodRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const METRIC_CANDIDATES: &str = "num_candidates";
pub const METRIC_APPROVED: &str = "num_approved";
pub const METRIC_REJECTED: &str = "num_rejected";
pub const METRIC_FAILED: &str = "num_failed";
pub const METRIC_CALL_SITES_REWRITTEN: &str = "num_call_sites_rewritten";
pub const METRIC_ACCESSORS_REMOVED: &str = "num_accessors_removed";
pub const METRIC_FIELDS_RELAXED: &str = "num_fields_relaxed";
pub const METRIC_PASSES: &str = "num_passes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReasonCode {
    /// Hierarchy metadata could not be interpreted; treated as external.
    AmbiguousResolution,
    /// The field resolves through a class outside the analyzed program.
    UnsafeExternalField,
    /// The superclass chain of the field owner is cyclic.
    HierarchyCycle,
    /// The field's declaring class matches an exclusion pattern.
    ExcludedClass,
    /// The accessor is reached through virtual or super dispatch.
    NonDirectDispatch,
    /// A caller cannot reach the field and widening is disabled.
    InaccessibleField,
    /// Inlining would produce structurally invalid code.
    RewriteVerificationFailure,
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReasonCode::AmbiguousResolution => "ambiguous-resolution",
            ReasonCode::UnsafeExternalField => "unsafe-external-field",
            ReasonCode::HierarchyCycle => "hierarchy-cycle",
            ReasonCode::ExcludedClass => "excluded-class",
            ReasonCode::NonDirectDispatch => "non-direct-dispatch",
            ReasonCode::InaccessibleField => "inaccessible-field",
            ReasonCode::RewriteVerificationFailure => "rewrite-verification-failure",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disposition {
    Approved {
        call_sites_rewritten: usize,
        /// The accessor had no remaining call sites and was deleted
        removed: bool,
    },
    Rejected {
        reason: ReasonCode,
        detail: String,
    },
    Failed {
        reason: ReasonCode,
        detail: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateOutcome {
    pub accessor: MethodRef,
    pub field: FieldRef,
    pub kind: AccessKind,
    /// 1-based pass number in which the candidate was processed
    pub pass: u32,
    pub disposition: Disposition,
}

impl CandidateOutcome {
    pub fn is_approved(&self) -> bool {
        matches!(self.disposition, Disposition::Approved { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self.disposition, Disposition::Rejected { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.disposition, Disposition::Failed { .. })
    }

    pub fn reason(&self) -> Option<ReasonCode> {
        match &self.disposition {
            Disposition::Approved { .. } => None,
            Disposition::Rejected { reason, .. } | Disposition::Failed { reason, .. } => {
                Some(*reason)
            }
        }
    }
}

/// Non-fatal analysis problem, e.g. a cyclic hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnalysisWarning {
    pub reason: ReasonCode,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthReport {
    pub outcomes: Vec<CandidateOutcome>,
    pub warnings: Vec<AnalysisWarning>,
    pub metrics: BTreeMap<String, u64>,
    pub passes: u32,
    pub input_fingerprint: String,
    pub output_fingerprint: String,
}

impl SynthReport {
    pub fn approved(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_approved()).count()
    }

    pub fn rejected(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_rejected()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }

    pub fn outcome(&self, accessor: &MethodRef) -> Option<&CandidateOutcome> {
        self.outcomes.iter().find(|o| &o.accessor == accessor)
    }

    pub fn metric(&self, name: &str) -> u64 {
        self.metrics.get(name).copied().unwrap_or(0)
    }

    pub fn incr_metric(&mut self, name: &str, by: u64) {
        *self.metrics.entry(name.to_string()).or_insert(0) += by;
    }

    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        format!(
            "passes={} approved={} rejected={} failed={} call_sites_rewritten={} accessors_removed={} fields_relaxed={}",
            self.passes,
            self.approved(),
            self.rejected(),
            self.failed(),
            self.metric(METRIC_CALL_SITES_REWRITTEN),
            self.metric(METRIC_ACCESSORS_REMOVED),
            self.metric(METRIC_FIELDS_RELAXED),
        )
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::MethodSig;

    fn outcome(name: &str, disposition: Disposition) -> CandidateOutcome {
        CandidateOutcome {
            accessor: MethodRef::new("LA;", MethodSig::new(name, Vec::<String>::new(), "I")),
            field: FieldRef::new("LA;", "x", "I"),
            kind: AccessKind::Read,
            pass: 1,
            disposition,
        }
    }

    #[test]
    fn test_counts_and_reasons() {
        let mut report = SynthReport::default();
        report.outcomes.push(outcome(
            "a",
            Disposition::Approved {
                call_sites_rewritten: 2,
                removed: true,
            },
        ));
        report.outcomes.push(outcome(
            "b",
            Disposition::Rejected {
                reason: ReasonCode::UnsafeExternalField,
                detail: String::new(),
            },
        ));
        report.outcomes.push(outcome(
            "c",
            Disposition::Failed {
                reason: ReasonCode::RewriteVerificationFailure,
                detail: String::new(),
            },
        ));

        assert_eq!(report.approved(), 1);
        assert_eq!(report.rejected(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.outcomes[1].reason(), Some(ReasonCode::UnsafeExternalField));
        assert_eq!(report.outcomes[0].reason(), None);
    }

    #[test]
    fn test_metrics_accumulate() {
        let mut report = SynthReport::default();
        report.incr_metric(METRIC_CALL_SITES_REWRITTEN, 2);
        report.incr_metric(METRIC_CALL_SITES_REWRITTEN, 3);
        assert_eq!(report.metric(METRIC_CALL_SITES_REWRITTEN), 5);
        assert_eq!(report.metric(METRIC_FAILED), 0);
    }

    #[test]
    fn test_json_contains_reason_codes() {
        let mut report = SynthReport::default();
        report.outcomes.push(outcome(
            "b",
            Disposition::Rejected {
                reason: ReasonCode::HierarchyCycle,
                detail: "cycle".to_string(),
            },
        ));
        let json = report.to_json().unwrap();
        assert!(json.contains("HierarchyCycle"));
    }
}
