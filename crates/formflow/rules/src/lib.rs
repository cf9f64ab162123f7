//! Form rules for formflow
//!
//! A form is declared as a document of **steps**, each a mapping of field
//! names to field objects. Fields may carry a **rule**: a small expression
//! tree of comparison, pattern and boolean operators that a submitted
//! response must satisfy.
//!
//! # Key Concepts
//!
//! - **RuleNode**: A compiled rule. The parameter shape is fixed by the
//!   operator (rule list, number or precompiled pattern).
//! - **Form**: Step name → field name → [`Field`], compiled once and shared
//!   read-only afterwards.
//! - **ResponseSet**: Field name → raw string response, as submitted.
//!
//! # Pipeline
//!
//! 1. [`compile_form`] turns a decoded document into a [`Form`], collecting
//!    every diagnostic in one pass instead of stopping at the first.
//! 2. [`sanitize_response`] drops undeclared keys from a submission.
//! 3. [`validate_response`] checks every declared field and evaluates its
//!    rule with [`evaluate`].
//!
//! # Example
//!
//! ```rust
//! use formflow_rules::{compile_form, sanitize_response, validate_response, ResponseSet};
//! use serde_json::json;
//!
//! let doc = json!({
//!     "profile": {
//!         "age": { "rule": { "op": ">=", "param": 18 } },
//!         "nickname": {}
//!     }
//! });
//!
//! let (form, diagnostics) = compile_form("sign-up", &doc);
//! assert!(diagnostics.is_empty());
//!
//! let mut responses = ResponseSet::new();
//! responses.insert("age".into(), "21".into());
//! responses.insert("nickname".into(), "ada".into());
//! responses.insert("injected".into(), "x".into());
//!
//! let fields = form.step("profile").unwrap();
//! sanitize_response(fields, &mut responses);
//! assert!(!responses.contains_key("injected"));
//! assert!(validate_response(fields, &responses).is_empty());
//! ```

#![deny(unsafe_code)]

mod compiler;
mod errors;
mod evaluator;
mod form;
mod response;
mod rule;

pub use compiler::*;
pub use errors::*;
pub use evaluator::*;
pub use form::*;
pub use response::*;
pub use rule::*;
