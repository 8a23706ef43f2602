//! # Typeline
//!
//! An in-process pipeline engine built around a typed, run-scoped store.
//!
//! Typeline provides:
//!
//! - **Typed keys**: identity tokens that carry their value type at compile time
//! - **Dependency validation**: steps declare the keys they require and are
//!   never started while one is missing
//! - **Composable plans**: single steps, parallel groups and conditional forks
//! - **Automatic parallelization**: [`optimize`](pipeline::optimize) levels a
//!   flat step list by its requires/provides relation
//! - **Diagnostic failures**: [`PipelineError`](errors::PipelineError) keeps
//!   the failing step, the cause chain and a snapshot of the store
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use typeline::prelude::*;
//!
//! struct Keys {
//!     a: Key<i64>,
//!     b: Key<i64>,
//! }
//!
//! let set_a = define_step(|k: &Keys| {
//!     let a = k.a.clone();
//!     Step::from_fn("SetA", move |store| {
//!         store.set(&a, 1);
//!         Ok(())
//!     })
//!     .provides(&k.a)
//! });
//!
//! let pipeline = create_pipeline(Keys { a: create_key("a"), b: create_key("b") });
//! let store = pipeline.run(&[set_a.into()]).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod errors;
pub mod events;
pub mod key;
pub mod observability;
pub mod pipeline;
pub mod step;
pub mod store;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::errors::{
        DependencyCycleError, MissingDependencyError, MissingKeyError, PipelineError,
        TypelineError, UnplacedStep,
    };
    pub use crate::events::{
        CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, PipelineEvent,
        PipelineEventKind,
    };
    pub use crate::key::{create_key, AnyKey, Key, KeyId};
    pub use crate::pipeline::{
        create_pipeline, fork, optimize, parallel, plan, Entry, ExecutionPlan, ForkGroup,
        Pipeline,
    };
    pub use crate::step::{define_step, Step, StepAction, StepFactory};
    pub use crate::store::{Store, StoreSnapshot};
}
