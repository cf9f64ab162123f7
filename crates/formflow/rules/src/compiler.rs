//! Compiler: decoded step documents → typed forms and rule trees
//!
//! Input is the generic value tree produced by whatever decoder read the
//! document (YAML, JSON, ...). The compiler never stops at the first
//! problem: every malformed step, field and rule node is reported in one
//! pass, and well-formed siblings of a malformed node are still compiled.

use crate::errors::CompileError;
use crate::form::{Field, Form, StepFields};
use crate::rule::{Operator, Pattern, Props, RuleNode, RuleParam};
use serde_json::{Map, Value};

const OP_KEY: &str = "op";
const PARAM_KEY: &str = "param";
const HIDDEN_KEY: &str = "hidden";
const SENSITIVE_KEY: &str = "sensitive";
const RULE_KEY: &str = "rule";

/// Compile a step document into a [`Form`].
///
/// Malformed steps and fields are skipped and reported; the returned form
/// holds everything that compiled cleanly. An empty diagnostic list means
/// the whole document is valid.
pub fn compile_form(name: &str, document: &Value) -> (Form, Vec<CompileError>) {
    let mut form = Form::new(name);
    let mut diagnostics = Vec::new();

    let Some(steps) = document.as_object() else {
        diagnostics.push(CompileError::NotAStepMapping(name.to_string()));
        return (form, diagnostics);
    };

    for (step, fields) in steps {
        let fields = match fields {
            Value::Object(fields) => fields,
            // `step:` with nothing under it declares a step without fields
            Value::Null => {
                form.steps.insert(step.clone(), StepFields::new());
                continue;
            }
            _ => {
                diagnostics.push(CompileError::InvalidStep { step: step.clone() });
                continue;
            }
        };

        let mut compiled = StepFields::new();
        for (field_name, definition) in fields {
            if let Some(field) = compile_field(step, field_name, definition, &mut diagnostics) {
                compiled.insert(field_name.clone(), field);
            }
        }
        form.steps.insert(step.clone(), compiled);
    }

    tracing::debug!(
        form = %name,
        steps = form.steps.len(),
        diagnostics = diagnostics.len(),
        "Form compiled"
    );

    (form, diagnostics)
}

/// Compile one field object. Returns `None` if any part of it is malformed.
fn compile_field(
    step: &str,
    name: &str,
    definition: &Value,
    diagnostics: &mut Vec<CompileError>,
) -> Option<Field> {
    let definition = match definition {
        Value::Object(definition) => definition,
        Value::Null => return Some(Field::new()),
        _ => {
            diagnostics.push(CompileError::InvalidField {
                step: step.to_string(),
                field: name.to_string(),
            });
            return None;
        }
    };

    let mut field = Field::new();
    let mut valid = true;

    for flag in [HIDDEN_KEY, SENSITIVE_KEY] {
        let Some(value) = definition.get(flag) else {
            continue;
        };
        match value.as_bool() {
            Some(set) if flag == HIDDEN_KEY => field.hidden = set,
            Some(set) => field.sensitive = set,
            None => {
                diagnostics.push(CompileError::FlagNotBoolean {
                    step: step.to_string(),
                    field: name.to_string(),
                    flag,
                });
                valid = false;
            }
        }
    }

    if let Some(rule) = definition.get(RULE_KEY) {
        let path = format!("{}.{}.{}", step, name, RULE_KEY);
        let (compiled, rule_diagnostics) = compile_rule(rule, &path);
        if rule_diagnostics.is_empty() {
            field.rule = compiled;
        } else {
            diagnostics.extend(rule_diagnostics);
            valid = false;
        }
    }

    field.props = extra_props(definition, &[HIDDEN_KEY, SENSITIVE_KEY, RULE_KEY]);

    valid.then_some(field)
}

/// Compile a rule object found at `path`.
///
/// Returns the best-effort rule alongside every diagnostic found beneath
/// it. A composite whose children partly fail keeps the children that
/// compiled; a malformed leaf, or a node with an unknown operator, yields
/// `None`.
pub fn compile_rule(node: &Value, path: &str) -> (Option<RuleNode>, Vec<CompileError>) {
    let mut diagnostics = Vec::new();
    let rule = compile_node(node, path, &mut diagnostics);
    (rule, diagnostics)
}

fn compile_node(node: &Value, path: &str, diagnostics: &mut Vec<CompileError>) -> Option<RuleNode> {
    let Some(object) = node.as_object() else {
        diagnostics.push(CompileError::RuleNotObject {
            path: path.to_string(),
        });
        return None;
    };

    let op = object.get(OP_KEY);
    let param = object.get(PARAM_KEY);

    if op.is_none() {
        diagnostics.push(CompileError::MissingKey {
            path: path.to_string(),
            key: OP_KEY,
        });
    }
    if param.is_none() {
        diagnostics.push(CompileError::MissingKey {
            path: path.to_string(),
            key: PARAM_KEY,
        });
    }
    let (Some(op), Some(param)) = (op, param) else {
        return None;
    };

    let Some(symbol) = op.as_str() else {
        diagnostics.push(CompileError::OperatorNotString {
            path: path.to_string(),
        });
        return None;
    };
    let Some(op) = Operator::parse(symbol) else {
        diagnostics.push(CompileError::UnknownOperator {
            path: path.to_string(),
            op: symbol.to_string(),
        });
        return None;
    };

    let param = match op {
        Operator::And | Operator::Or => {
            let Some(children) = param.as_array() else {
                diagnostics.push(CompileError::ExpectedList {
                    path: path.to_string(),
                    op,
                });
                return None;
            };
            let rules = children
                .iter()
                .enumerate()
                .filter_map(|(i, child)| {
                    compile_node(child, &format!("{}[{}]", path, i), diagnostics)
                })
                .collect();
            RuleParam::Rules(rules)
        }
        Operator::Eq | Operator::Neq | Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte => {
            let Some(number) = param.as_f64() else {
                diagnostics.push(CompileError::ExpectedNumber {
                    path: path.to_string(),
                    op,
                });
                return None;
            };
            RuleParam::Number(number)
        }
        Operator::Regex => {
            let Some(source) = param.as_str() else {
                diagnostics.push(CompileError::ExpectedString {
                    path: path.to_string(),
                    op,
                });
                return None;
            };
            match Pattern::new(source) {
                Ok(pattern) => RuleParam::Pattern(pattern),
                Err(e) => {
                    diagnostics.push(CompileError::InvalidPattern {
                        path: path.to_string(),
                        pattern: source.to_string(),
                        reason: e.to_string(),
                    });
                    return None;
                }
            }
        }
    };

    Some(RuleNode {
        op,
        param,
        props: extra_props(object, &[OP_KEY, PARAM_KEY]),
    })
}

/// Copy every key not in `known` verbatim
fn extra_props(object: &Map<String, Value>, known: &[&str]) -> Props {
    object
        .iter()
        .filter(|(key, _)| !known.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
