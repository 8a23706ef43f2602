//! Mock step actions for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::key::Key;
use crate::step::StepAction;
use crate::store::Store;

/// Counts how many times it ran.
#[derive(Debug, Default)]
pub struct CountingAction {
    calls: AtomicUsize,
}

impl CountingAction {
    /// Creates a new counting action.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of runs so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StepAction for CountingAction {
    async fn run(&self, _store: &Store) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Always fails with a fixed message, optionally after a delay.
#[derive(Debug, Clone)]
pub struct FailingAction {
    message: String,
    delay: Duration,
}

impl FailingAction {
    /// Creates a new failing action.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            delay: Duration::ZERO,
        }
    }

    /// Fails only after sleeping for `ms` milliseconds.
    #[must_use]
    pub fn after_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }
}

#[async_trait]
impl StepAction for FailingAction {
    async fn run(&self, _store: &Store) -> anyhow::Result<()> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Err(anyhow::anyhow!("{}", self.message))
    }
}

/// Sleeps, then succeeds.
#[derive(Debug, Clone)]
pub struct SlowAction {
    delay: Duration,
}

impl SlowAction {
    /// Creates a new slow action.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Creates a slow action with delay in milliseconds.
    #[must_use]
    pub fn with_delay_ms(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }
}

#[async_trait]
impl StepAction for SlowAction {
    async fn run(&self, _store: &Store) -> anyhow::Result<()> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

/// Writes a fixed value under a key, optionally after a delay.
#[derive(Debug, Clone)]
pub struct SetValueAction<T> {
    key: Key<T>,
    value: T,
    delay: Duration,
}

impl<T> SetValueAction<T> {
    /// Creates a new set-value action.
    #[must_use]
    pub fn new(key: &Key<T>, value: T) -> Self {
        Self {
            key: key.clone(),
            value,
            delay: Duration::ZERO,
        }
    }

    /// Writes only after sleeping for `ms` milliseconds.
    #[must_use]
    pub fn after_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }
}

#[async_trait]
impl<T> StepAction for SetValueAction<T>
where
    T: Clone + Serialize + Send + Sync + 'static,
{
    async fn run(&self, store: &Store) -> anyhow::Result<()> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        store.set_serialized(&self.key, self.value.clone());
        Ok(())
    }
}

/// A shared, ordered log of `label:start` / `label:end` markers.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl ExecutionLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a marker.
    pub fn record(&self, marker: impl Into<String>) {
        self.entries.lock().push(marker.into());
    }

    /// Returns all markers in order.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Returns the position of a marker, if recorded.
    #[must_use]
    pub fn position(&self, marker: &str) -> Option<usize> {
        self.entries.lock().iter().position(|m| m == marker)
    }
}

/// Records `label:start`, yields for `delay`, then records `label:end`.
#[derive(Debug, Clone)]
pub struct RecordingAction {
    label: String,
    log: ExecutionLog,
    delay: Duration,
}

impl RecordingAction {
    /// Creates a new recording action writing into `log`.
    #[must_use]
    pub fn new(label: impl Into<String>, log: &ExecutionLog) -> Self {
        Self {
            label: label.into(),
            log: log.clone(),
            delay: Duration::ZERO,
        }
    }

    /// Holds between start and end for `ms` milliseconds.
    #[must_use]
    pub fn with_delay_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }
}

#[async_trait]
impl StepAction for RecordingAction {
    async fn run(&self, _store: &Store) -> anyhow::Result<()> {
        self.log.record(format!("{}:start", self.label));
        if self.delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.delay).await;
        }
        self.log.record(format!("{}:end", self.label));
        Ok(())
    }
}
