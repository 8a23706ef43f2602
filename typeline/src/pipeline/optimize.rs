//! Automatic parallelization of a flat step list.
//!
//! Steps are grouped into levels by their declared requires/provides: a step
//! joins the first level at which every key it requires has been provided by
//! an earlier level. Steps never name each other, only the keys they need,
//! which keeps them reusable across pipelines.

use super::entry::Entry;
use crate::errors::{DependencyCycleError, UnplacedStep};
use crate::key::{AnyKey, KeyId};
use crate::step::StepFactory;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info};

struct Resolved {
    name: String,
    requires: Vec<AnyKey>,
    provides: Vec<AnyKey>,
}

/// A step placed into a level.
pub struct PlannedStep<K> {
    /// Position in the optimizer's input.
    pub index: usize,
    /// Step name.
    pub name: String,
    factory: StepFactory<K>,
}

impl<K> fmt::Debug for PlannedStep<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlannedStep")
            .field("index", &self.index)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Leveled plan produced by [`plan`].
pub struct ExecutionPlan<K> {
    levels: Vec<Vec<PlannedStep<K>>>,
}

impl<K> fmt::Debug for ExecutionPlan<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionPlan")
            .field("levels", &self.levels())
            .finish()
    }
}

impl<K> ExecutionPlan<K> {
    /// Returns the step names of each level.
    #[must_use]
    pub fn levels(&self) -> Vec<Vec<&str>> {
        self.levels
            .iter()
            .map(|level| level.iter().map(|s| s.name.as_str()).collect())
            .collect()
    }

    /// Returns the number of levels.
    #[must_use]
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Returns the placed steps of one level.
    #[must_use]
    pub fn level(&self, index: usize) -> Option<&[PlannedStep<K>]> {
        self.levels.get(index).map(Vec::as_slice)
    }

    /// Converts the plan into runnable entries: single-step levels become
    /// plain entries, wider levels become parallel groups.
    #[must_use]
    pub fn into_entries(self) -> Vec<Entry<K>> {
        self.levels
            .into_iter()
            .map(|mut level| {
                if level.len() == 1 {
                    Entry::Step(level.remove(0).factory)
                } else {
                    Entry::Parallel(level.into_iter().map(|s| s.factory).collect())
                }
            })
            .collect()
    }
}

impl<K> fmt::Display for ExecutionPlan<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, names) in self.levels().iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            match names.as_slice() {
                [single] => write!(f, "Level {}: {single}", i + 1)?,
                many => write!(f, "Level {}: parallel([{}])", i + 1, many.join(", "))?,
            }
        }
        Ok(())
    }
}

/// Levels `factories` against `keys` without running anything.
///
/// Ties within a level keep input order, so the plan is deterministic.
///
/// # Errors
///
/// Returns [`DependencyCycleError`] when a round places no step while steps
/// remain: some required key is never provided, or steps require each
/// other's outputs.
pub fn plan<K>(
    keys: &K,
    factories: &[StepFactory<K>],
) -> Result<ExecutionPlan<K>, DependencyCycleError> {
    let resolved: Vec<Resolved> = factories
        .iter()
        .map(|factory| {
            let step = factory.build(keys);
            Resolved {
                name: step.name().to_string(),
                requires: step.required_keys().to_vec(),
                provides: step.provided_keys().to_vec(),
            }
        })
        .collect();

    let mut available: HashSet<KeyId> = HashSet::new();
    let mut placed = vec![false; resolved.len()];
    let mut remaining = resolved.len();
    let mut levels = Vec::new();

    while remaining > 0 {
        let level: Vec<usize> = resolved
            .iter()
            .enumerate()
            .filter(|(i, step)| {
                !placed[*i] && step.requires.iter().all(|k| available.contains(&k.id()))
            })
            .map(|(i, _)| i)
            .collect();

        if level.is_empty() {
            let stuck: Vec<UnplacedStep> = resolved
                .iter()
                .enumerate()
                .filter(|(i, _)| !placed[*i])
                .map(|(_, step)| UnplacedStep {
                    name: step.name.clone(),
                    missing: step
                        .requires
                        .iter()
                        .filter(|k| !available.contains(&k.id()))
                        .map(|k| k.name().to_string())
                        .collect(),
                })
                .collect();
            return Err(DependencyCycleError::new(stuck));
        }

        for &i in &level {
            placed[i] = true;
            available.extend(resolved[i].provides.iter().map(AnyKey::id));
        }
        remaining -= level.len();

        debug!(level = levels.len() + 1, size = level.len(), "Placed level");
        levels.push(
            level
                .into_iter()
                .map(|i| PlannedStep {
                    index: i,
                    name: resolved[i].name.clone(),
                    factory: factories[i].clone(),
                })
                .collect(),
        );
    }

    Ok(ExecutionPlan { levels })
}

/// Turns a flat step list into a leveled entry list.
///
/// # Errors
///
/// See [`plan`].
pub fn optimize<K>(
    keys: &K,
    factories: &[StepFactory<K>],
) -> Result<Vec<Entry<K>>, DependencyCycleError> {
    let plan = plan(keys, factories)?;

    info!(levels = plan.level_count(), steps = factories.len(), "Optimization plan");
    for (i, names) in plan.levels().iter().enumerate() {
        info!(level = i + 1, steps = ?names, "Plan level");
    }

    Ok(plan.into_entries())
}
