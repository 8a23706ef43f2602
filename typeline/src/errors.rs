//! Error types for the typeline engine.
//!
//! Static planning failures ([`DependencyCycleError`]) are kept apart from
//! runtime failures ([`PipelineError`]); the umbrella [`TypelineError`] lets
//! callers propagate either with `?`.

use crate::store::StoreSnapshot;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The main error type for typeline operations.
#[derive(Debug, Error)]
pub enum TypelineError {
    /// A step failed while the pipeline was running.
    #[error("{0}")]
    Pipeline(#[from] Box<PipelineError>),

    /// The optimizer could not place every step.
    #[error("{0}")]
    DependencyCycle(#[from] DependencyCycleError),

    /// A required store key was absent.
    #[error("{0}")]
    MissingKey(#[from] MissingKeyError),
}

impl From<PipelineError> for TypelineError {
    fn from(err: PipelineError) -> Self {
        Self::Pipeline(Box::new(err))
    }
}

/// Raised by [`Store::require`](crate::store::Store::require) when the key
/// has never been set in the current run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Required key \"{key}\" is not set.")]
pub struct MissingKeyError {
    /// Display name of the missing key.
    pub key: String,
}

impl MissingKeyError {
    /// Creates a new missing key error.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// Raised before a step runs when one of its declared requirements is absent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "Step \"{step}\" requires key \"{key}\" but it has not been set. \
     Ensure a preceding step sets this value before this step runs."
)]
pub struct MissingDependencyError {
    /// The step that could not run.
    pub step: String,
    /// Display name of the first missing key.
    pub key: String,
}

impl MissingDependencyError {
    /// Creates a new missing dependency error.
    #[must_use]
    pub fn new(step: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            key: key.into(),
        }
    }
}

/// A step the optimizer could not place, with the keys nothing provides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnplacedStep {
    /// Step name.
    pub name: String,
    /// Required keys that were never made available.
    pub missing: Vec<String>,
}

/// Raised by the optimizer when the requires/provides relation cannot be
/// leveled: some key is never provided, or steps depend on each other.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "Circular or unsatisfied dependency detected. Remaining steps: [{}]",
    step_names(.remaining)
)]
pub struct DependencyCycleError {
    /// Steps left over when no further level could be formed.
    pub remaining: Vec<UnplacedStep>,
}

impl DependencyCycleError {
    /// Creates a new dependency cycle error.
    #[must_use]
    pub fn new(remaining: Vec<UnplacedStep>) -> Self {
        Self { remaining }
    }

    /// Returns the names of the stuck steps, in input order.
    #[must_use]
    pub fn step_names(&self) -> Vec<&str> {
        self.remaining.iter().map(|s| s.name.as_str()).collect()
    }
}

fn step_names(remaining: &[UnplacedStep]) -> String {
    remaining
        .iter()
        .map(|s| s.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A step failure captured by the run loop.
///
/// Holds the failing step's name, the underlying failure (with its own
/// causal chain) and the store contents at the moment of failure.
#[derive(Debug, Error)]
#[error("Pipeline failed at step \"{step_name}\": {source}")]
pub struct PipelineError {
    step_name: String,
    #[source]
    source: anyhow::Error,
    snapshot: StoreSnapshot,
}

impl PipelineError {
    /// Creates a new pipeline error.
    #[must_use]
    pub fn new(
        step_name: impl Into<String>,
        source: impl Into<anyhow::Error>,
        snapshot: StoreSnapshot,
    ) -> Self {
        Self {
            step_name: step_name.into(),
            source: source.into(),
            snapshot,
        }
    }

    /// Returns the name of the failing step.
    #[must_use]
    pub fn step_name(&self) -> &str {
        &self.step_name
    }

    /// Returns the triggering failure.
    #[must_use]
    pub fn cause(&self) -> &anyhow::Error {
        &self.source
    }

    /// Returns the store contents at the time of failure.
    #[must_use]
    pub fn snapshot(&self) -> &StoreSnapshot {
        &self.snapshot
    }

    /// Returns the cause chain messages, outermost first.
    #[must_use]
    pub fn chain(&self) -> Vec<String> {
        self.source.chain().map(ToString::to_string).collect()
    }

    /// Renders a multi-line human-readable diagnostic.
    ///
    /// Store values are summarized rather than dumped: strings quoted,
    /// arrays as their length, objects as their key set.
    #[must_use]
    pub fn format(&self) -> String {
        let mut lines = vec![
            self.to_string(),
            String::new(),
            format!("  Step: {}", self.step_name),
            String::new(),
            "  Error chain:".to_string(),
        ];

        for (depth, err) in self.source.chain().enumerate() {
            lines.push(format!("    {}{}: {err}", "→ ".repeat(depth + 1), error_kind(err)));
        }

        lines.push(String::new());
        lines.push("  Store at time of failure:".to_string());

        if self.snapshot.is_empty() {
            lines.push("    (empty)".to_string());
        } else {
            for (name, summary) in self.snapshot.summaries() {
                lines.push(format!("    {name}: {summary}"));
            }
        }

        lines.join("\n")
    }
}

/// Names the kind of one link in a cause chain.
///
/// Errors defined by this crate report their type name; anything else is
/// reported as `Error`.
fn error_kind(err: &(dyn std::error::Error + 'static)) -> &'static str {
    if err.is::<MissingKeyError>() {
        "MissingKeyError"
    } else if err.is::<MissingDependencyError>() {
        "MissingDependencyError"
    } else if err.is::<DependencyCycleError>() {
        "DependencyCycleError"
    } else if err.is::<PipelineError>() {
        "PipelineError"
    } else if err.is::<TypelineError>() {
        "TypelineError"
    } else {
        "Error"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_key_message() {
        let err = MissingKeyError::new("user");
        assert_eq!(err.to_string(), "Required key \"user\" is not set.");
    }

    #[test]
    fn test_missing_dependency_message() {
        let err = MissingDependencyError::new("Report", "orders");
        let msg = err.to_string();
        assert!(msg.starts_with("Step \"Report\" requires key \"orders\""));
    }

    #[test]
    fn test_dependency_cycle_lists_steps() {
        let err = DependencyCycleError::new(vec![
            UnplacedStep {
                name: "A".to_string(),
                missing: vec!["b_out".to_string()],
            },
            UnplacedStep {
                name: "B".to_string(),
                missing: vec!["a_out".to_string()],
            },
        ]);

        assert_eq!(err.step_names(), vec!["A", "B"]);
        assert!(err.to_string().ends_with("Remaining steps: [A, B]"));
    }

    #[test]
    fn test_pipeline_error_exposes_source() {
        let err =
            PipelineError::new("Fetch", MissingKeyError::new("url"), StoreSnapshot::default());

        assert_eq!(err.step_name(), "Fetch");
        assert_eq!(
            err.to_string(),
            "Pipeline failed at step \"Fetch\": Required key \"url\" is not set."
        );
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("Required key \"url\" is not set."));
        assert!(err.cause().downcast_ref::<MissingKeyError>().is_some());
    }

    #[test]
    fn test_format_empty_store() {
        let cause = Err::<(), _>(anyhow::anyhow!("HTTP 404"))
            .context("fetching wines")
            .unwrap_err();
        let err = PipelineError::new("Fetch Wines", cause, StoreSnapshot::default());

        let expected = [
            "Pipeline failed at step \"Fetch Wines\": fetching wines",
            "",
            "  Step: Fetch Wines",
            "",
            "  Error chain:",
            "    → Error: fetching wines",
            "    → → Error: HTTP 404",
            "",
            "  Store at time of failure:",
            "    (empty)",
        ]
        .join("\n");

        assert_eq!(err.format(), expected);
    }

    #[test]
    fn test_format_names_error_kinds() {
        let inner =
            PipelineError::new("Inner", MissingKeyError::new("url"), StoreSnapshot::default());
        let err = PipelineError::new("Outer", inner, StoreSnapshot::default());

        let report = err.format();
        assert!(report.contains("    → PipelineError: Pipeline failed at step \"Inner\""));
        assert!(report.contains("    → → MissingKeyError: Required key \"url\" is not set."));
    }

    #[test]
    fn test_format_names_missing_dependency() {
        let err = PipelineError::new(
            "Report",
            MissingDependencyError::new("Report", "orders"),
            StoreSnapshot::default(),
        );

        let report = err.format();
        assert!(report.contains("    → MissingDependencyError: Step \"Report\" requires key"));
    }

    #[test]
    fn test_umbrella_conversions() {
        let err: TypelineError = DependencyCycleError::new(Vec::new()).into();
        assert!(matches!(err, TypelineError::DependencyCycle(_)));

        let err: TypelineError =
            PipelineError::new("s", anyhow::anyhow!("boom"), StoreSnapshot::default()).into();
        assert!(matches!(err, TypelineError::Pipeline(_)));
    }
}
