//! Workflow steps and their transition callbacks

use crate::errors::{DefinitionError, DefinitionResult};
use formflow_rules::ResponseSet;
use std::fmt;
use std::sync::Arc;

/// Decides the next step from a validated submission
pub type InteractHandler = Arc<dyn Fn(&ResponseSet) -> StepTransition + Send + Sync>;

/// Names the step to go back to
pub type RewindHandler = Arc<dyn Fn() -> String + Send + Sync>;

/// Outcome of a successful interaction with a step
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepTransition {
    /// Move to the named step
    Continue(String),
    /// The workflow is finished
    Complete,
}

impl StepTransition {
    pub fn next(step: impl Into<String>) -> Self {
        Self::Continue(step.into())
    }

    /// Step to move to, if any
    pub fn next_step(&self) -> Option<&str> {
        match self {
            Self::Continue(step) => Some(step),
            Self::Complete => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// Collects the callbacks of a step before it is added to a workflow
#[derive(Clone, Default)]
pub struct StepBuilder {
    on_interact: Option<InteractHandler>,
    on_rewind: Option<RewindHandler>,
}

impl StepBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the interact callback (required)
    pub fn on_interact<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ResponseSet) -> StepTransition + Send + Sync + 'static,
    {
        self.on_interact = Some(Arc::new(handler));
        self
    }

    /// Set the rewind callback. Steps without one cannot be rewound.
    pub fn on_rewind<F>(mut self, handler: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.on_rewind = Some(Arc::new(handler));
        self
    }

    /// Always continue to `next` once the step validates
    pub fn continue_to(self, next: impl Into<String>) -> Self {
        let next = next.into();
        self.on_interact(move |_| StepTransition::Continue(next.clone()))
    }

    /// Always rewind to `previous`
    pub fn rewind_to(self, previous: impl Into<String>) -> Self {
        let previous = previous.into();
        self.on_rewind(move || previous.clone())
    }

    pub(crate) fn build(self, name: &str) -> DefinitionResult<WorkflowStep> {
        let on_interact = self
            .on_interact
            .ok_or_else(|| DefinitionError::MissingInteractHandler(name.to_string()))?;

        Ok(WorkflowStep {
            name: name.to_string(),
            on_interact,
            on_rewind: self.on_rewind,
        })
    }
}

/// A registered step: its name and transition callbacks.
///
/// The step's fields live in the workflow's form under the same name.
#[derive(Clone)]
pub struct WorkflowStep {
    name: String,
    on_interact: InteractHandler,
    on_rewind: Option<RewindHandler>,
}

impl WorkflowStep {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_rewindable(&self) -> bool {
        self.on_rewind.is_some()
    }

    /// Run the interact callback on a validated submission
    pub fn interact(&self, responses: &ResponseSet) -> StepTransition {
        (self.on_interact)(responses)
    }

    /// Run the rewind callback, if the step has one
    pub fn rewind(&self) -> Option<String> {
        self.on_rewind.as_ref().map(|handler| handler())
    }
}

impl fmt::Debug for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowStep")
            .field("name", &self.name)
            .field("rewindable", &self.is_rewindable())
            .finish()
    }
}
