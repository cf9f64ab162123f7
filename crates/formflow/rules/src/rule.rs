//! Compiled rule trees
//!
//! A [`RuleNode`] is produced by the compiler and never mutated afterwards.
//! Its parameter is a tagged variant chosen by the operator, so evaluation
//! never has to inspect an untyped value.

use regex::Regex;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Opaque extra keys carried through from the source document.
pub type Props = BTreeMap<String, Value>;

// ── Operator ─────────────────────────────────────────────────────────

/// The fixed operator set a rule may use
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Operator {
    #[serde(rename = "&&")]
    And,
    #[serde(rename = "||")]
    Or,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Neq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "regex")]
    Regex,
}

impl Operator {
    pub const ALL: [Operator; 9] = [
        Operator::And,
        Operator::Or,
        Operator::Eq,
        Operator::Neq,
        Operator::Lt,
        Operator::Lte,
        Operator::Gt,
        Operator::Gte,
        Operator::Regex,
    ];

    /// Look up an operator by its document symbol
    pub fn parse(symbol: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.symbol() == symbol)
    }

    /// The symbol used for this operator in documents
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::And => "&&",
            Operator::Or => "||",
            Operator::Eq => "==",
            Operator::Neq => "!=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Regex => "regex",
        }
    }

    /// `&&` and `||` take a list of child rules
    pub fn is_composite(&self) -> bool {
        matches!(self, Operator::And | Operator::Or)
    }

    /// Numeric comparison operators
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Operator::Eq
                | Operator::Neq
                | Operator::Lt
                | Operator::Lte
                | Operator::Gt
                | Operator::Gte
        )
    }

    /// Apply a comparison operator. Composite and pattern operators never match.
    pub fn compare(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Operator::Eq => lhs == rhs,
            Operator::Neq => lhs != rhs,
            Operator::Lt => lhs < rhs,
            Operator::Lte => lhs <= rhs,
            Operator::Gt => lhs > rhs,
            Operator::Gte => lhs >= rhs,
            Operator::And | Operator::Or | Operator::Regex => false,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

// ── Pattern ──────────────────────────────────────────────────────────

/// A pattern compiled at rule-compile time
#[derive(Clone, Debug)]
pub struct Pattern(Regex);

impl Pattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Regex::new(source).map(Self)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.0.is_match(haystack)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ── Rule Node ────────────────────────────────────────────────────────

/// Operator-dependent rule parameter
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RuleParam {
    /// Children of `&&` / `||`
    Rules(Vec<RuleNode>),
    /// Right-hand side of a comparison
    Number(f64),
    /// Pattern of a `regex` rule
    Pattern(Pattern),
}

/// A compiled, immutable rule
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RuleNode {
    pub op: Operator,
    pub param: RuleParam,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub props: Props,
}

impl RuleNode {
    pub fn all(children: Vec<RuleNode>) -> Self {
        Self::new(Operator::And, RuleParam::Rules(children))
    }

    pub fn any(children: Vec<RuleNode>) -> Self {
        Self::new(Operator::Or, RuleParam::Rules(children))
    }

    /// Build a comparison leaf. `op` must be a comparison operator.
    pub fn compare(op: Operator, rhs: f64) -> Self {
        debug_assert!(op.is_comparison());
        Self::new(op, RuleParam::Number(rhs))
    }

    pub fn pattern(pattern: Pattern) -> Self {
        Self::new(Operator::Regex, RuleParam::Pattern(pattern))
    }

    fn new(op: Operator, param: RuleParam) -> Self {
        Self {
            op,
            param,
            props: Props::new(),
        }
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: Value) -> Self {
        self.props.insert(key.into(), value);
        self
    }

    /// Child rules, empty for leaves
    pub fn children(&self) -> &[RuleNode] {
        match &self.param {
            RuleParam::Rules(rules) => rules,
            _ => &[],
        }
    }
}

impl fmt::Display for RuleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.param {
            RuleParam::Rules(rules) => write!(f, "{} ({} rules)", self.op, rules.len()),
            RuleParam::Number(n) => write!(f, "{} {}", self.op, n),
            RuleParam::Pattern(p) => write!(f, "{} /{}/", self.op, p.as_str()),
        }
    }
}
