//! Removal of compiler-synthesized field accessors from a whole-program
//! bytecode model.
//!
//! ```no_run
//! use synthkit_core::{run, Program, SynthConfig};
//!
//! # fn main() -> synthkit_core::Result<()> {
//! let program = Program::from_json_str("{\"classes\": {}}")?;
//! let (program, report) = run(program, &SynthConfig::default())?;
//! println!("{} ({} classes)", report.summary(), program.classes.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod ir;
pub mod optimizer;

pub use config::{ExclusionFilter, SynthConfig};
pub use errors::{Result, RewriteError, SynthError};
pub use ir::Program;
pub use optimizer::synth::{run, CandidateOutcome, Disposition, ReasonCode, SynthPass, SynthReport};
pub use optimizer::ProgramPass;
