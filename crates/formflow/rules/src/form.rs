//! Compiled forms
//!
//! A [`Form`] is built once from a step document and then shared read-only
//! by every session of the workflow it belongs to.

use crate::compiler::compile_form;
use crate::errors::CompileErrors;
use crate::rule::{Props, RuleNode};
use serde::Serialize;
use std::collections::BTreeMap;

/// Field name → field, for one step
pub type StepFields = BTreeMap<String, Field>;

/// One declared field of a step
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Field {
    /// Rendering hint for front ends; never affects validation
    #[serde(skip_serializing_if = "is_false")]
    pub hidden: bool,
    /// Stored responses for this field are withheld from reads
    #[serde(skip_serializing_if = "is_false")]
    pub sensitive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<RuleNode>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub props: Props,
}

impl Field {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, rule: RuleNode) -> Self {
        self.rule = Some(rule);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

/// A compiled form: step name → field name → field
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Form {
    pub name: String,
    pub steps: BTreeMap<String, StepFields>,
}

impl Form {
    /// Create an empty form
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: BTreeMap::new(),
        }
    }

    /// Compile a document, failing if any diagnostic was produced.
    ///
    /// Use [`compile_form`] to keep the best-effort form alongside the
    /// diagnostics.
    pub fn compile(name: &str, document: &serde_json::Value) -> Result<Self, CompileErrors> {
        let (form, diagnostics) = compile_form(name, document);
        if diagnostics.is_empty() {
            Ok(form)
        } else {
            Err(CompileErrors(diagnostics))
        }
    }

    /// Fields declared for a step
    pub fn step(&self, name: &str) -> Option<&StepFields> {
        self.steps.get(name)
    }

    pub fn has_step(&self, name: &str) -> bool {
        self.steps.contains_key(name)
    }

    /// Look up a single field
    pub fn field(&self, step: &str, field: &str) -> Option<&Field> {
        self.steps.get(step).and_then(|fields| fields.get(field))
    }

    pub fn step_names(&self) -> impl Iterator<Item = &str> {
        self.steps.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::Operator;
    use serde_json::json;

    #[test]
    fn test_compile_strict_success() {
        let doc = json!({ "welcome": { "accept": { "rule": { "op": "==", "param": 1 } } } });
        let form = Form::compile("onboarding", &doc).unwrap();

        assert_eq!(form.name, "onboarding");
        assert!(form.has_step("welcome"));
        let field = form.field("welcome", "accept").unwrap();
        assert_eq!(field.rule, Some(RuleNode::compare(Operator::Eq, 1.0)));
    }

    #[test]
    fn test_compile_strict_failure() {
        let doc = json!({ "welcome": { "accept": { "rule": { "op": "==", "param": "yes" } } } });
        let errors = Form::compile("onboarding", &doc).unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_field_serialization_omits_defaults() {
        let field = Field::new();
        assert_eq!(serde_json::to_value(&field).unwrap(), json!({}));

        let field = Field::new().sensitive().with_rule(RuleNode::compare(Operator::Gt, 0.0));
        assert_eq!(
            serde_json::to_value(&field).unwrap(),
            json!({ "sensitive": true, "rule": { "op": ">", "param": 0.0 } })
        );
    }

    #[test]
    fn test_step_names() {
        let mut form = Form::new("f");
        form.steps.insert("b".into(), StepFields::new());
        form.steps.insert("a".into(), StepFields::new());
        assert_eq!(form.step_names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(form.step("c").is_none());
    }
}
