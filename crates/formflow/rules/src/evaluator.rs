//! Rule evaluator: checks one field's response against its rule tree
//!
//! Evaluation is pure in-memory recursion over the compiled tree. It has
//! no side effects and never consults anything outside the
//! [`EvaluationContext`].
//!
//! Tie-breaks:
//! - `&&` stops at the first failing child and reports exactly that
//!   child's diagnostics.
//! - `||` stops at the first matching child; if every child fails, the
//!   diagnostics of all of them are reported together.

use crate::errors::ValidationError;
use crate::response::ResponseSet;
use crate::rule::{Operator, RuleNode, RuleParam};

/// Root segment of the rule paths used in diagnostics
const ROOT_PATH: &str = "rule";

/// What a rule is evaluated against
#[derive(Clone, Copy, Debug)]
pub struct EvaluationContext<'a> {
    /// Name of the field the rule belongs to
    pub field: &'a str,
    /// The field's own raw response
    pub value: &'a str,
    /// The whole (sanitized) submission
    pub responses: &'a ResponseSet,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(field: &'a str, value: &'a str, responses: &'a ResponseSet) -> Self {
        Self {
            field,
            value,
            responses,
        }
    }
}

/// Result of evaluating a rule tree
#[derive(Clone, Debug, PartialEq)]
pub struct RuleOutcome {
    pub matched: bool,
    /// Empty when `matched` is true
    pub diagnostics: Vec<ValidationError>,
    /// Number of leaf rules actually evaluated (short-circuited leaves are not counted)
    pub leaves_evaluated: usize,
}

impl RuleOutcome {
    pub fn into_result(self) -> Result<(), Vec<ValidationError>> {
        if self.matched {
            Ok(())
        } else {
            Err(self.diagnostics)
        }
    }
}

/// Evaluate `rule` against the response in `context`
pub fn evaluate(rule: &RuleNode, context: &EvaluationContext<'_>) -> RuleOutcome {
    let mut leaves_evaluated = 0;
    let result = eval_node(rule, ROOT_PATH, context, &mut leaves_evaluated);

    tracing::trace!(
        field = %context.field,
        matched = result.is_ok(),
        leaves = leaves_evaluated,
        "Rule evaluated"
    );

    match result {
        Ok(()) => RuleOutcome {
            matched: true,
            diagnostics: Vec::new(),
            leaves_evaluated,
        },
        Err(diagnostics) => RuleOutcome {
            matched: false,
            diagnostics,
            leaves_evaluated,
        },
    }
}

fn eval_node(
    rule: &RuleNode,
    path: &str,
    context: &EvaluationContext<'_>,
    leaves: &mut usize,
) -> Result<(), Vec<ValidationError>> {
    match (&rule.op, &rule.param) {
        (Operator::And, RuleParam::Rules(children)) => {
            for (i, child) in children.iter().enumerate() {
                eval_node(child, &child_path(path, i), context, leaves)?;
            }
            Ok(())
        }

        (Operator::Or, RuleParam::Rules(children)) => {
            let mut failures = Vec::new();
            for (i, child) in children.iter().enumerate() {
                match eval_node(child, &child_path(path, i), context, leaves) {
                    Ok(()) => return Ok(()),
                    Err(diagnostics) => failures.extend(diagnostics),
                }
            }
            // An empty `||` still has to explain why it failed
            if failures.is_empty() {
                failures.push(mismatch(rule, path, context));
            }
            Err(failures)
        }

        (op, RuleParam::Number(rhs)) if op.is_comparison() => {
            *leaves += 1;
            let lhs = parse_number(context.value).ok_or_else(|| {
                vec![ValidationError::NotANumber {
                    field: context.field.to_string(),
                    path: path.to_string(),
                    rule: rule.to_string(),
                }]
            })?;
            if op.compare(lhs, *rhs) {
                Ok(())
            } else {
                Err(vec![mismatch(rule, path, context)])
            }
        }

        (Operator::Regex, RuleParam::Pattern(pattern)) => {
            *leaves += 1;
            if pattern.is_match(context.value) {
                Ok(())
            } else {
                Err(vec![mismatch(rule, path, context)])
            }
        }

        // Operator and parameter disagree; only reachable for hand-built trees
        _ => {
            *leaves += 1;
            Err(vec![mismatch(rule, path, context)])
        }
    }
}

fn child_path(path: &str, index: usize) -> String {
    format!("{}[{}]", path, index)
}

fn mismatch(rule: &RuleNode, path: &str, context: &EvaluationContext<'_>) -> ValidationError {
    ValidationError::RuleMismatch {
        field: context.field.to_string(),
        path: path.to_string(),
        rule: rule.to_string(),
    }
}

/// Parse a response as a finite number. Anything else is rejected rather
/// than coerced.
fn parse_number(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::Pattern;
    use proptest::prelude::*;

    fn always() -> RuleNode {
        RuleNode::pattern(Pattern::new("").unwrap())
    }

    fn never() -> RuleNode {
        RuleNode::pattern(Pattern::new("^$").unwrap())
    }

    fn run(rule: &RuleNode, value: &str) -> RuleOutcome {
        let responses = ResponseSet::new();
        evaluate(rule, &EvaluationContext::new("f", value, &responses))
    }

    #[test]
    fn test_and_short_circuits_on_first_failure() {
        let rule = RuleNode::all(vec![always(), always(), never(), always()]);
        let outcome = run(&rule, "x");

        assert!(!outcome.matched);
        assert_eq!(outcome.leaves_evaluated, 3);
        assert_eq!(
            outcome.diagnostics,
            vec![ValidationError::RuleMismatch {
                field: "f".into(),
                path: "rule[2]".into(),
                rule: "regex /^$/".into(),
            }]
        );
    }

    #[test]
    fn test_or_aggregates_every_failure() {
        let rule = RuleNode::any(vec![never(), never(), never()]);
        let outcome = run(&rule, "x");

        assert!(!outcome.matched);
        assert_eq!(outcome.leaves_evaluated, 3);
        assert_eq!(outcome.diagnostics.len(), 3);
        let paths: Vec<_> = outcome
            .diagnostics
            .iter()
            .map(|d| match d {
                ValidationError::RuleMismatch { path, .. } => path.as_str(),
                other => unreachable!("unexpected diagnostic {:?}", other),
            })
            .collect();
        assert_eq!(paths, vec!["rule[0]", "rule[1]", "rule[2]"]);
    }

    #[test]
    fn test_or_stops_at_first_match() {
        let rule = RuleNode::any(vec![never(), always(), never()]);
        let outcome = run(&rule, "x");

        assert!(outcome.matched);
        assert!(outcome.diagnostics.is_empty());
        assert_eq!(outcome.leaves_evaluated, 2);
    }

    #[test]
    fn test_empty_composites_follow_fold_identity() {
        assert!(run(&RuleNode::all(vec![]), "x").matched);

        let outcome = run(&RuleNode::any(vec![]), "x");
        assert!(!outcome.matched);
        assert_eq!(outcome.diagnostics.len(), 1);
    }

    #[test]
    fn test_nested_or_inside_and() {
        // 18 <= age < 65, or exactly 99
        let rule = RuleNode::any(vec![
            RuleNode::all(vec![
                RuleNode::compare(Operator::Gte, 18.0),
                RuleNode::compare(Operator::Lt, 65.0),
            ]),
            RuleNode::compare(Operator::Eq, 99.0),
        ]);

        assert!(run(&rule, "30").matched);
        assert!(run(&rule, "99").matched);

        let outcome = run(&rule, "70");
        assert!(!outcome.matched);
        // The && reports its failing child, then the == leaf fails too
        assert_eq!(outcome.diagnostics.len(), 2);
        assert!(matches!(
            &outcome.diagnostics[0],
            ValidationError::RuleMismatch { path, .. } if path == "rule[0][1]"
        ));
    }

    #[test]
    fn test_comparison_rejects_non_numeric_response() {
        let rule = RuleNode::compare(Operator::Eq, 0.0);
        let outcome = run(&rule, "abc");

        assert!(!outcome.matched);
        assert!(matches!(
            &outcome.diagnostics[..],
            [ValidationError::NotANumber { field, .. }] if field == "f"
        ));
        // Empty string is not silently zero either
        assert!(!run(&rule, "").matched);
        assert!(!run(&RuleNode::compare(Operator::Neq, 1.0), "NaN").matched);
        assert!(!run(&RuleNode::compare(Operator::Gt, 1.0), "inf").matched);
    }

    #[test]
    fn test_comparison_accepts_decimal_and_exponent() {
        assert!(run(&RuleNode::compare(Operator::Eq, 5.0), "5").matched);
        assert!(run(&RuleNode::compare(Operator::Eq, 5.0), "5.0").matched);
        assert!(run(&RuleNode::compare(Operator::Lt, 1.0), "-2.5e-1").matched);
    }

    #[test]
    fn test_regex_is_unanchored() {
        let rule = RuleNode::pattern(Pattern::new("@").unwrap());
        assert!(run(&rule, "ada@example.com").matched);
        assert!(!run(&rule, "ada.example.com").matched);
    }

    #[test]
    fn test_mismatched_param_never_matches() {
        let rule = RuleNode {
            op: Operator::Lt,
            param: RuleParam::Rules(vec![]),
            props: Default::default(),
        };
        assert!(!run(&rule, "1").matched);
    }

    proptest! {
        #[test]
        fn prop_comparisons_agree_with_f64(lhs in -1.0e6f64..1.0e6, rhs in -1.0e6f64..1.0e6) {
            let value = lhs.to_string();
            for op in [Operator::Eq, Operator::Neq, Operator::Lt, Operator::Lte, Operator::Gt, Operator::Gte] {
                let outcome = run(&RuleNode::compare(op, rhs), &value);
                prop_assert_eq!(outcome.matched, op.compare(lhs, rhs));
                prop_assert_eq!(outcome.leaves_evaluated, 1);
            }
        }

        #[test]
        fn prop_alphabetic_responses_never_compare(value in "[a-zA-Z]{1,12}", rhs in any::<i32>()) {
            let outcome = run(&RuleNode::compare(Operator::Neq, rhs as f64), &value);
            prop_assert!(!outcome.matched);
            let is_not_a_number = matches!(&outcome.diagnostics[..], [ValidationError::NotANumber { .. }]);
            prop_assert!(is_not_a_number);
        }
    }
}
