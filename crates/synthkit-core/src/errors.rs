//! Error types for the synthetic accessor pass.
//!
//! Candidate-level outcomes (rejections, contained rewrite failures) are data
//! in the report. Only run-level failures surface as `SynthError`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SynthError>;

#[derive(Debug, Error)]
pub enum SynthError {
    #[error("malformed program snapshot: {0}")]
    MalformedProgram(String),

    #[error("rewrite of {accessor} failed verification with fail_fast set: {source}")]
    RewriteAborted {
        accessor: String,
        #[source]
        source: RewriteError,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<serde_yaml::Error> for SynthError {
    fn from(err: serde_yaml::Error) -> Self {
        SynthError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for SynthError {
    fn from(err: serde_json::Error) -> Self {
        SynthError::Config(err.to_string())
    }
}

impl From<glob::PatternError> for SynthError {
    fn from(err: glob::PatternError) -> Self {
        SynthError::Config(format!("bad exclude pattern: {err}"))
    }
}

/// Why a staged rewrite would produce structurally invalid code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewriteError {
    #[error("{caller}@{position} passes {found} arguments, accessor takes {expected}")]
    ArityMismatch {
        caller: String,
        position: usize,
        expected: usize,
        found: usize,
    },

    #[error("{caller}@{position} uses v{register} but the method declares {registers} registers")]
    RegisterOutOfRange {
        caller: String,
        position: usize,
        register: u16,
        registers: u16,
    },

    #[error("{caller}@{position} discards the result of a field read")]
    DiscardedResult { caller: String, position: usize },

    #[error("{caller}@{position} moves a {found} result but the field holds {expected}")]
    ResultKindMismatch {
        caller: String,
        position: usize,
        expected: String,
        found: String,
    },

    #[error("object operand of type {found} cannot address a field of {expected}")]
    ObjectTypeMismatch { expected: String, found: String },

    #[error("write accessor {accessor} has no value parameter")]
    MissingValueOperand { accessor: String },

    #[error("{caller}@{position} no longer invokes the accessor")]
    StaleCallSite { caller: String, position: usize },
}
