//! # Orchestration
//!
//! Drives rebuild units after planning, as the build system reports
//! progress.

pub mod lifecycle;

pub use lifecycle::{BuildLifecycle, BuildUpdate};
