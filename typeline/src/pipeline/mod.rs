//! Pipeline composition and execution.
//!
//! This module provides:
//! - The entry algebra (single step, parallel group, fork)
//! - The run loop over a fresh per-run store
//! - The optimizer that levels a flat step list into parallel groups

mod entry;
mod optimize;
mod runner;

pub use entry::{fork, parallel, Condition, Entry, ForkGroup};
pub use optimize::{optimize, plan, ExecutionPlan, PlannedStep};
pub use runner::{create_pipeline, Pipeline};
