//! Test utilities for synthkit: program builders, reference fixtures and an
//! interpreter for checking behaviour across the pass.

pub mod builder;
pub mod fixtures;
pub mod interpreter;

pub use builder::{ClassBuilder, ProgramBuilder};
pub use interpreter::{Interpreter, Value};

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Install a fmt subscriber honouring `RUST_LOG`. Safe to call from every test.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
