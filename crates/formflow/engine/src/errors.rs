//! Error types for workflow definition and session traffic

use formflow_rules::{CompileErrors, ValidationErrors};

/// Errors raised while registering workflows on a service.
///
/// Any of these aborts the registration of the workflow concerned; other
/// workflows and the process are unaffected.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum DefinitionError {
    #[error("Form of workflow '{workflow}' failed to compile: {errors}")]
    FormCompilation {
        workflow: String,
        errors: CompileErrors,
    },

    #[error("Step '{0}' has no interact handler")]
    MissingInteractHandler(String),

    #[error("Workflow already registered: {0}")]
    DuplicateWorkflow(String),

    #[error("Duplicate step '{step}' in workflow '{workflow}'")]
    DuplicateStep { workflow: String, step: String },

    #[error("Step '{step}' is not declared by the form of workflow '{workflow}'")]
    StepNotInForm { workflow: String, step: String },

    #[error("Workflow '{0}' has no steps")]
    NoSteps(String),
}

/// Errors returned by session operations.
///
/// Each is single-cause and returned before any state is mutated.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("Session not found or expired: {0}")]
    SessionNotFound(String),

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("Step '{0}' cannot be rewound")]
    NotRewindable(String),

    #[error("Session already completed")]
    Completed,

    #[error("Responses rejected: {0}")]
    Validation(ValidationErrors),

    #[error("Workflow '{workflow}' has no step '{step}'")]
    UnknownStep { workflow: String, step: String },
}

impl SessionError {
    /// Unknown or expired session, or unknown workflow
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SessionNotFound(_) | Self::WorkflowNotFound(_))
    }

    /// Diagnostics of a rejected submission
    pub fn diagnostics(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

/// Result type alias for workflow registration
pub type DefinitionResult<T> = Result<T, DefinitionError>;

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;
