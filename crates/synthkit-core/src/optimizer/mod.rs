//! Whole-program optimization passes over the bytecode model.

pub mod analysis;
pub mod synth;

use crate::errors::Result;
use crate::ir::Program;

/// A transformation that needs the whole program at once.
///
/// `run` returns whether the program changed.
pub trait ProgramPass {
    fn name(&self) -> &'static str;

    fn run(&mut self, program: &mut Program) -> Result<bool>;
}
