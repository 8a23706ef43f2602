//! Pipeline lifecycle events.
//!
//! The run loop reports every run, step, parallel group and fork decision to
//! an [`EventSink`]. Sinks never fail; they observe only.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PipelineEventKind {
    /// A run began.
    #[serde(rename = "run.started")]
    RunStarted {
        /// Pipeline name.
        pipeline: String,
    },
    /// A step passed validation and its action started.
    #[serde(rename = "step.started")]
    StepStarted {
        /// Step name.
        step: String,
    },
    /// A step's action returned successfully.
    #[serde(rename = "step.completed")]
    StepCompleted {
        /// Step name.
        step: String,
        /// Wall time of the action in milliseconds.
        duration_ms: f64,
    },
    /// A step failed validation or its action returned an error.
    #[serde(rename = "step.failed")]
    StepFailed {
        /// Step name.
        step: String,
        /// Failure message.
        error: String,
    },
    /// A parallel group is about to start its members.
    #[serde(rename = "parallel.started")]
    ParallelStarted {
        /// Member step names.
        steps: Vec<String>,
    },
    /// A fork evaluated its condition.
    #[serde(rename = "fork.taken")]
    ForkTaken {
        /// Which branch runs.
        branch: bool,
    },
    /// Every entry completed.
    #[serde(rename = "run.completed")]
    RunCompleted {
        /// Total run time in milliseconds.
        duration_ms: f64,
    },
    /// The run aborted.
    #[serde(rename = "run.failed")]
    RunFailed {
        /// The failing step.
        step: String,
        /// Failure message.
        error: String,
    },
}

impl PipelineEventKind {
    /// Returns the dotted event type, e.g. `"step.started"`.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run.started",
            Self::StepStarted { .. } => "step.started",
            Self::StepCompleted { .. } => "step.completed",
            Self::StepFailed { .. } => "step.failed",
            Self::ParallelStarted { .. } => "parallel.started",
            Self::ForkTaken { .. } => "fork.taken",
            Self::RunCompleted { .. } => "run.completed",
            Self::RunFailed { .. } => "run.failed",
        }
    }
}

/// An event stamped with its run and time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// The run that emitted the event.
    pub run_id: Uuid,
    /// When the event was emitted.
    pub timestamp: DateTime<Utc>,
    /// The event payload.
    #[serde(flatten)]
    pub kind: PipelineEventKind,
}

impl PipelineEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(run_id: Uuid, kind: PipelineEventKind) -> Self {
        Self {
            run_id,
            timestamp: Utc::now(),
            kind,
        }
    }

    /// Returns the dotted event type.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_names() {
        let kind = PipelineEventKind::StepCompleted {
            step: "a".to_string(),
            duration_ms: 1.0,
        };
        assert_eq!(kind.event_type(), "step.completed");
        assert_eq!(PipelineEventKind::ForkTaken { branch: true }.event_type(), "fork.taken");
    }

    #[test]
    fn test_event_serialization() {
        let event = PipelineEvent::new(
            Uuid::new_v4(),
            PipelineEventKind::StepStarted {
                step: "Fetch".to_string(),
            },
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "step.started");
        assert_eq!(json["step"], "Fetch");

        let back: PipelineEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
