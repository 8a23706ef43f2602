//! Testing utilities for typeline pipelines.
//!
//! Reusable step actions that count, fail, sleep, write fixed values or
//! record their start/finish into a shared log. Wrap them in an `Arc` to
//! keep a handle for assertions after the pipeline has built its steps.

mod mocks;

pub use mocks::{
    CountingAction, ExecutionLog, FailingAction, RecordingAction, SetValueAction, SlowAction,
};
