//! Response sanitizing and validation
//!
//! A submission is a flat map of field name to raw string value. It is
//! first filtered down to the step's declared fields, then every declared
//! field is checked: present, and matching its rule if it has one.

use crate::errors::ValidationError;
use crate::evaluator::{evaluate, EvaluationContext};
use crate::form::{Form, StepFields};
use std::collections::HashMap;

/// Field name → raw response
pub type ResponseSet = HashMap<String, String>;

/// Remove, in place, every response whose key is not a declared field.
/// Never validates.
pub fn sanitize_response(fields: &StepFields, responses: &mut ResponseSet) {
    responses.retain(|key, _| fields.contains_key(key));
}

/// Validate a response set against a step's fields.
///
/// Every declared field is checked, so one missing field does not hide
/// problems with the others. An empty result means the submission is
/// valid.
pub fn validate_response(fields: &StepFields, responses: &ResponseSet) -> Vec<ValidationError> {
    let mut diagnostics = Vec::new();

    for (name, field) in fields {
        let Some(value) = responses.get(name) else {
            diagnostics.push(ValidationError::MissingResponse {
                field: name.clone(),
            });
            continue;
        };

        if let Some(rule) = &field.rule {
            let context = EvaluationContext::new(name, value, responses);
            diagnostics.extend(evaluate(rule, &context).diagnostics);
        }
    }

    diagnostics
}

/// Validate a response set against a named step of `form`
pub fn validate_step(form: &Form, step: &str, responses: &ResponseSet) -> Vec<ValidationError> {
    match form.step(step) {
        Some(fields) => validate_response(fields, responses),
        None => vec![ValidationError::UnknownStep(step.to_string())],
    }
}

/// Copy of `responses` without the fields marked sensitive
pub fn redact_sensitive(fields: &StepFields, responses: &ResponseSet) -> ResponseSet {
    responses
        .iter()
        .filter(|(key, _)| !fields.get(key.as_str()).is_some_and(|field| field.sensitive))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
