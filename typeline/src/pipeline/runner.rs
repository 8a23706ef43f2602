//! The run loop.
//!
//! Entries execute strictly in list order. A parallel group's members are
//! polled together on the run's task and the group settles only when every
//! member has finished; a fork evaluates its condition once against the
//! settled store and runs exactly one branch.

use super::entry::Entry;
use crate::errors::{MissingDependencyError, PipelineError};
use crate::events::{EventSink, NoOpEventSink, PipelineEvent, PipelineEventKind};
use crate::step::Step;
use crate::store::Store;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

tokio::task_local! {
    static ACTIVE_RUN: ActiveRun;
}

struct ActiveRun {
    pipeline_id: Uuid,
    store: Arc<Store>,
}

/// A key schema bound to a run loop.
pub struct Pipeline<K> {
    id: Uuid,
    name: String,
    keys: Arc<K>,
    event_sink: Arc<dyn EventSink>,
}

impl<K> Pipeline<K>
where
    K: Send + Sync,
{
    /// Creates a pipeline over a key schema.
    #[must_use]
    pub fn new(keys: K) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: "pipeline".to_string(),
            keys: Arc::new(keys),
            event_sink: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the pipeline name used in logs and events.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the key schema.
    #[must_use]
    pub fn keys(&self) -> &K {
        &self.keys
    }

    /// Returns the store of this pipeline's active run on the current task.
    ///
    /// `None` outside a run, inside a run of a different pipeline, and on
    /// tasks spawned by a step.
    #[must_use]
    pub fn current_store(&self) -> Option<Arc<Store>> {
        ACTIVE_RUN
            .try_with(|run| (run.pipeline_id == self.id).then(|| Arc::clone(&run.store)))
            .ok()
            .flatten()
    }

    /// Runs `entries` against a fresh store.
    ///
    /// On success the finished store is handed back to the caller.
    ///
    /// # Errors
    ///
    /// Returns a [`PipelineError`] for the first step that fails validation
    /// or whose action fails. No entry after the failure executes.
    pub async fn run(&self, entries: &[Entry<K>]) -> Result<Store, PipelineError> {
        let run_id = Uuid::new_v4();
        let store = Arc::new(Store::new());
        let span = info_span!("pipeline.run", pipeline = %self.name, %run_id);
        let started = Instant::now();

        self.emit(
            run_id,
            PipelineEventKind::RunStarted {
                pipeline: self.name.clone(),
            },
        );

        let active = ActiveRun {
            pipeline_id: self.id,
            store: Arc::clone(&store),
        };
        let result = ACTIVE_RUN
            .scope(active, self.run_entries(run_id, entries, &store))
            .instrument(span)
            .await;

        match &result {
            Ok(()) => {
                let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
                info!(pipeline = %self.name, %run_id, duration_ms, "Pipeline completed");
                self.emit(run_id, PipelineEventKind::RunCompleted { duration_ms });
            }
            Err(err) => {
                self.emit(
                    run_id,
                    PipelineEventKind::RunFailed {
                        step: err.step_name().to_string(),
                        error: err.cause().to_string(),
                    },
                );
            }
        }

        result.map(|()| store.take())
    }

    fn run_entries<'a>(
        &'a self,
        run_id: Uuid,
        entries: &'a [Entry<K>],
        store: &'a Store,
    ) -> BoxFuture<'a, Result<(), PipelineError>> {
        async move {
            for entry in entries {
                match entry {
                    Entry::Step(factory) => {
                        let step = factory.build(&self.keys);
                        self.validate(run_id, &step, store)?;
                        self.execute(run_id, &step, store).await?;
                    }
                    Entry::Parallel(factories) => {
                        let steps: Vec<Step> =
                            factories.iter().map(|f| f.build(&self.keys)).collect();
                        for step in &steps {
                            self.validate(run_id, step, store)?;
                        }
                        self.execute_parallel(run_id, &steps, store).await?;
                    }
                    Entry::Fork(group) => {
                        let taken = group.evaluate(store);
                        info!(branch = taken, "Fork: taking {} branch", taken);
                        self.emit(run_id, PipelineEventKind::ForkTaken { branch: taken });
                        self.run_entries(run_id, group.branch(taken), store).await?;
                    }
                }
            }
            Ok(())
        }
        .boxed()
    }

    fn validate(&self, run_id: Uuid, step: &Step, store: &Store) -> Result<(), PipelineError> {
        debug!(step = step.name(), requires = step.required_keys().len(), "Validating step");

        let Some(key) = step.first_missing(store) else {
            return Ok(());
        };

        let err = MissingDependencyError::new(step.name(), key.name());
        warn!(step = step.name(), key = key.name(), "Missing dependency");
        self.emit(
            run_id,
            PipelineEventKind::StepFailed {
                step: step.name().to_string(),
                error: err.to_string(),
            },
        );
        Err(PipelineError::new(step.name(), err, store.snapshot()))
    }

    async fn execute_parallel(
        &self,
        run_id: Uuid,
        steps: &[Step],
        store: &Store,
    ) -> Result<(), PipelineError> {
        if let [step] = steps {
            return self.execute(run_id, step, store).await;
        }

        let names: Vec<String> = steps.iter().map(|s| s.name().to_string()).collect();
        info!(steps = ?names, "Running in parallel");
        self.emit(run_id, PipelineEventKind::ParallelStarted { steps: names });

        let mut pending: FuturesUnordered<_> = steps
            .iter()
            .map(|step| self.execute(run_id, step, store))
            .collect();

        // Siblings are left to finish; the first failure to settle is reported.
        let mut first_error = None;
        while let Some(result) = pending.next().await {
            if let Err(err) = result {
                first_error.get_or_insert(err);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    async fn execute(&self, run_id: Uuid, step: &Step, store: &Store) -> Result<(), PipelineError> {
        info!(step = step.name(), "Running step");
        self.emit(
            run_id,
            PipelineEventKind::StepStarted {
                step: step.name().to_string(),
            },
        );

        let started = Instant::now();
        match step.run(store).await {
            Ok(()) => {
                let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
                self.emit(
                    run_id,
                    PipelineEventKind::StepCompleted {
                        step: step.name().to_string(),
                        duration_ms,
                    },
                );
                Ok(())
            }
            Err(source) => {
                let snapshot = store.snapshot();
                warn!(step = step.name(), error = %format!("{source:#}"), "Step failed");
                self.emit(
                    run_id,
                    PipelineEventKind::StepFailed {
                        step: step.name().to_string(),
                        error: source.to_string(),
                    },
                );
                Err(PipelineError::new(step.name(), source, snapshot))
            }
        }
    }

    fn emit(&self, run_id: Uuid, kind: PipelineEventKind) {
        self.event_sink.emit(&PipelineEvent::new(run_id, kind));
    }
}

impl<K> Clone for Pipeline<K> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            keys: Arc::clone(&self.keys),
            event_sink: Arc::clone(&self.event_sink),
        }
    }
}

impl<K> fmt::Debug for Pipeline<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Binds a key schema to a fresh run loop.
#[must_use]
pub fn create_pipeline<K>(keys: K) -> Pipeline<K>
where
    K: Send + Sync,
{
    Pipeline::new(keys)
}
