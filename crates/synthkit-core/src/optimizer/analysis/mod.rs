//! Read-only whole-program analyses consumed by the optimizer.
//!
//! Both analyses are built once per pass iteration from the immutable
//! snapshot and shared across parallel detection and classification.

pub mod call_sites;
pub mod hierarchy;

pub use call_sites::{CallSite, CallSiteIndex};
pub use hierarchy::ClassHierarchy;
