//! Session instances: the live state of one user walking one workflow

use chrono::{DateTime, Duration, Utc};
use formflow_rules::ResponseSet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::step::StepTransition;

/// Where a session stands
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "step", rename_all = "snake_case")]
pub enum SessionState {
    /// Waiting for a submission for the named step
    Active(String),
    /// Final step accepted; terminal
    Completed,
}

impl SessionState {
    pub fn step(&self) -> Option<&str> {
        match self {
            Self::Active(step) => Some(step),
            Self::Completed => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// A session: current position plus the accepted responses per step.
///
/// Stored responses are always sanitized and validated.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub workflow: String,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub last_interaction: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub responses_by_step: HashMap<String, ResponseSet>,
}

impl WorkflowInstance {
    /// Create a session positioned at `initial_step`
    pub fn new(workflow: impl Into<String>, initial_step: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            workflow: workflow.into(),
            state: SessionState::Active(initial_step.into()),
            created_at: now,
            last_interaction: now,
            completed_at: None,
            responses_by_step: HashMap::new(),
        }
    }

    pub fn current_step(&self) -> Option<&str> {
        self.state.step()
    }

    pub fn is_completed(&self) -> bool {
        self.state.is_completed()
    }

    /// Expired once more than `lifetime` has passed since the last interaction
    pub fn is_expired(&self, now: DateTime<Utc>, lifetime: Duration) -> bool {
        now - self.last_interaction > lifetime
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_interaction = now;
    }

    /// Stored responses for a step
    pub fn responses(&self, step: &str) -> Option<&ResponseSet> {
        self.responses_by_step.get(step)
    }

    /// Store an accepted submission and apply the transition it produced
    pub fn advance(
        &mut self,
        step: &str,
        responses: ResponseSet,
        transition: StepTransition,
        now: DateTime<Utc>,
    ) {
        self.responses_by_step.insert(step.to_string(), responses);
        self.state = match transition {
            StepTransition::Continue(next) => SessionState::Active(next),
            StepTransition::Complete => {
                self.completed_at = Some(now);
                SessionState::Completed
            }
        };
        self.touch(now);
    }

    /// Move back to `step`, keeping every stored response
    pub fn rewind_to(&mut self, step: impl Into<String>, now: DateTime<Utc>) {
        self.state = SessionState::Active(step.into());
        self.touch(now);
    }
}
