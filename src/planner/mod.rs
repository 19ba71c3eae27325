//! Dependency-aware planning of rebuild units.

pub mod build_planner;
pub mod pass;

pub use build_planner::BuildPlanner;
pub use pass::PlannedPass;
