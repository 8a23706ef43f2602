//! Steps and step factories.
//!
//! A [`Step`] is the unit of work: a name, the keys it requires, the keys it
//! provides, and a [`StepAction`]. A [`StepFactory`] defers key binding so a
//! step can be written once against a minimal key capability and reused in
//! any pipeline whose schema offers it.

use crate::key::AnyKey;
use crate::store::Store;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt::{self, Debug};
use std::sync::Arc;

/// The run action of a step.
#[async_trait]
pub trait StepAction: Send + Sync {
    /// Reads and writes the run's store.
    ///
    /// # Errors
    ///
    /// Any error aborts the pipeline run and is reported as the cause of a
    /// [`PipelineError`](crate::errors::PipelineError).
    async fn run(&self, store: &Store) -> anyhow::Result<()>;
}

#[async_trait]
impl<A> StepAction for Arc<A>
where
    A: StepAction + ?Sized,
{
    async fn run(&self, store: &Store) -> anyhow::Result<()> {
        (**self).run(store).await
    }
}

/// A synchronous closure-based action.
pub struct FnAction<F>
where
    F: Fn(&Store) -> anyhow::Result<()> + Send + Sync,
{
    func: F,
}

impl<F> FnAction<F>
where
    F: Fn(&Store) -> anyhow::Result<()> + Send + Sync,
{
    /// Creates a new function-based action.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> StepAction for FnAction<F>
where
    F: Fn(&Store) -> anyhow::Result<()> + Send + Sync,
{
    async fn run(&self, store: &Store) -> anyhow::Result<()> {
        (self.func)(store)
    }
}

/// An async closure-based action.
pub struct AsyncFnAction<F>
where
    F: for<'a> Fn(&'a Store) -> BoxFuture<'a, anyhow::Result<()>> + Send + Sync,
{
    func: F,
}

impl<F> AsyncFnAction<F>
where
    F: for<'a> Fn(&'a Store) -> BoxFuture<'a, anyhow::Result<()>> + Send + Sync,
{
    /// Creates a new async function-based action.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> StepAction for AsyncFnAction<F>
where
    F: for<'a> Fn(&'a Store) -> BoxFuture<'a, anyhow::Result<()>> + Send + Sync,
{
    async fn run(&self, store: &Store) -> anyhow::Result<()> {
        (self.func)(store).await
    }
}

/// An action that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpAction;

#[async_trait]
impl StepAction for NoOpAction {
    async fn run(&self, _store: &Store) -> anyhow::Result<()> {
        Ok(())
    }
}

/// An immutable step descriptor.
///
/// `requires` is checked by the run loop before the action executes.
/// `provides` is advisory and only read by the optimizer.
#[derive(Clone)]
pub struct Step {
    name: String,
    requires: Vec<AnyKey>,
    provides: Vec<AnyKey>,
    action: Arc<dyn StepAction>,
}

impl Step {
    /// Creates a step around an action.
    pub fn new(name: impl Into<String>, action: impl StepAction + 'static) -> Self {
        Self {
            name: name.into(),
            requires: Vec::new(),
            provides: Vec::new(),
            action: Arc::new(action),
        }
    }

    /// Creates a step from a synchronous closure.
    pub fn from_fn<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Store) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::new(name, FnAction::new(func))
    }

    /// Creates a step from a closure returning a boxed future.
    pub fn from_async<F>(name: impl Into<String>, func: F) -> Self
    where
        F: for<'a> Fn(&'a Store) -> BoxFuture<'a, anyhow::Result<()>> + Send + Sync + 'static,
    {
        Self::new(name, AsyncFnAction::new(func))
    }

    /// Declares a key that must be set before this step runs.
    #[must_use]
    pub fn requires(mut self, key: impl Into<AnyKey>) -> Self {
        let key = key.into();
        if !self.requires.contains(&key) {
            self.requires.push(key);
        }
        self
    }

    /// Declares a key this step sets.
    #[must_use]
    pub fn provides(mut self, key: impl Into<AnyKey>) -> Self {
        let key = key.into();
        if !self.provides.contains(&key) {
            self.provides.push(key);
        }
        self
    }

    /// Returns the step name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared required keys, in declaration order.
    #[must_use]
    pub fn required_keys(&self) -> &[AnyKey] {
        &self.requires
    }

    /// Returns the declared provided keys, in declaration order.
    #[must_use]
    pub fn provided_keys(&self) -> &[AnyKey] {
        &self.provides
    }

    /// Returns the first required key absent from `store`.
    #[must_use]
    pub fn first_missing(&self, store: &Store) -> Option<&AnyKey> {
        self.requires.iter().find(|k| !store.contains_id(k.id()))
    }

    /// Runs the step's action.
    ///
    /// # Errors
    ///
    /// Propagates the action's error unchanged.
    pub async fn run(&self, store: &Store) -> anyhow::Result<()> {
        self.action.run(store).await
    }
}

impl Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("requires", &self.requires)
            .field("provides", &self.provides)
            .finish_non_exhaustive()
    }
}

/// Builds a [`Step`] from a key schema `K`.
///
/// Generic over `K`, a factory can be written against a capability trait
/// (`K: HasUser`) and reused by every schema implementing it.
pub struct StepFactory<K> {
    build: Arc<dyn Fn(&K) -> Step + Send + Sync>,
}

impl<K> StepFactory<K> {
    /// Wraps a schema-parameterized step constructor.
    pub fn new<F>(build: F) -> Self
    where
        F: Fn(&K) -> Step + Send + Sync + 'static,
    {
        Self {
            build: Arc::new(build),
        }
    }

    /// Instantiates the step against a schema.
    #[must_use]
    pub fn build(&self, keys: &K) -> Step {
        (self.build)(keys)
    }
}

impl<K> Clone for StepFactory<K> {
    fn clone(&self) -> Self {
        Self {
            build: Arc::clone(&self.build),
        }
    }
}

impl<K> Debug for StepFactory<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepFactory")
            .field("schema", &std::any::type_name::<K>())
            .finish_non_exhaustive()
    }
}

/// Defines a step against a key schema.
pub fn define_step<K, F>(build: F) -> StepFactory<K>
where
    F: Fn(&K) -> Step + Send + Sync + 'static,
{
    StepFactory::new(build)
}
