//! Error types for form compilation and response validation

use crate::rule::Operator;
use std::fmt;

/// A problem found while compiling a step document or one of its rules.
///
/// Rule-level variants carry a dotted path such as `profile.age.rule[1]`
/// locating the offending node in the document.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("form '{0}' is not a mapping of steps")]
    NotAStepMapping(String),

    #[error("step '{step}' is not a valid field mapping")]
    InvalidStep { step: String },

    #[error("field '{field}' from step '{step}' is not a valid field object")]
    InvalidField { step: String, field: String },

    #[error("field '{field}' from step '{step}' has a '{flag}' flag that is not a boolean")]
    FlagNotBoolean {
        step: String,
        field: String,
        flag: &'static str,
    },

    #[error("{path}: rule is not an object")]
    RuleNotObject { path: String },

    #[error("{path}: rule has no '{key}' key")]
    MissingKey { path: String, key: &'static str },

    #[error("{path}: 'op' is not a string")]
    OperatorNotString { path: String },

    #[error("{path}: unknown operator '{op}'")]
    UnknownOperator { path: String, op: String },

    #[error("{path}: operator '{op}' demands a list parameter")]
    ExpectedList { path: String, op: Operator },

    #[error("{path}: operator '{op}' demands a number parameter")]
    ExpectedNumber { path: String, op: Operator },

    #[error("{path}: operator '{op}' demands a string parameter")]
    ExpectedString { path: String, op: Operator },

    #[error("{path}: '{pattern}' is not a valid regex: {reason}")]
    InvalidPattern {
        path: String,
        pattern: String,
        reason: String,
    },
}

/// A problem found while validating a response set against a step.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} has no matching response")]
    MissingResponse { field: String },

    #[error("{field} does not match rule {path} ({rule})")]
    RuleMismatch {
        field: String,
        path: String,
        rule: String,
    },

    #[error("{field} is not a number, as rule {path} ({rule}) requires")]
    NotANumber {
        field: String,
        path: String,
        rule: String,
    },

    #[error("form has no step '{0}'")]
    UnknownStep(String),
}

impl ValidationError {
    /// The field this diagnostic refers to, if any
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingResponse { field }
            | Self::RuleMismatch { field, .. }
            | Self::NotANumber { field, .. } => Some(field),
            Self::UnknownStep(_) => None,
        }
    }
}

/// All diagnostics from one compilation, as a single error value
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompileErrors(pub Vec<CompileError>);

/// All diagnostics from one submission, as a single error value
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

macro_rules! diagnostic_list {
    ($list:ident, $item:ident) => {
        impl $list {
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            pub fn len(&self) -> usize {
                self.0.len()
            }

            pub fn iter(&self) -> std::slice::Iter<'_, $item> {
                self.0.iter()
            }
        }

        impl From<Vec<$item>> for $list {
            fn from(errors: Vec<$item>) -> Self {
                Self(errors)
            }
        }

        impl IntoIterator for $list {
            type Item = $item;
            type IntoIter = std::vec::IntoIter<$item>;

            fn into_iter(self) -> Self::IntoIter {
                self.0.into_iter()
            }
        }

        impl fmt::Display for $list {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                for (i, error) in self.0.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", error)?;
                }
                Ok(())
            }
        }

        impl std::error::Error for $list {}
    };
}

diagnostic_list!(CompileErrors, CompileError);
diagnostic_list!(ValidationErrors, ValidationError);
