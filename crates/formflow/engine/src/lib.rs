//! Workflow engine for formflow
//!
//! Drives end users through a sequence of form steps as stateful,
//! resumable sessions.
//!
//! # Key Concepts
//!
//! - **WorkflowService**: Registry of workflow definitions. Built once,
//!   single-threaded, then shared read-only behind an `Arc`.
//! - **Workflow**: An ordered set of steps, each pairing a fragment of the
//!   compiled [`Form`](formflow_rules::Form) with transition callbacks.
//! - **WorkflowConsumer**: Keyed registry of live sessions. Every operation
//!   (lookup, expiry check, validation, mutation) runs as one transaction
//!   under the lock of the session's shard.
//! - **StepTransition**: What an interact callback decides: continue to a
//!   named step, or complete the workflow.
//!
//! # Lifecycle
//!
//! 1. **Build**: register workflows on a mutable [`WorkflowService`]. Form
//!    compile errors are fatal to that workflow's registration only.
//! 2. **Serve**: wrap the service in an `Arc`, hand it to a
//!    [`WorkflowConsumer`], and call `start` / `peek` / `get` / `interact`
//!    / `rewind` from any number of threads.
//!
//! # Example
//!
//! ```rust
//! use formflow_engine::{StepBuilder, StepTransition, WorkflowConsumer, WorkflowService};
//! use formflow_rules::ResponseSet;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let document = json!({
//!     "email": { "address": { "rule": { "op": "regex", "param": "@" } } },
//!     "confirm": { "code": { "rule": { "op": "==", "param": 1234 } } }
//! });
//!
//! let mut service = WorkflowService::new();
//! service
//!     .new_workflow("sign-up", &document)
//!     .unwrap()
//!     .add_step("email", StepBuilder::new().continue_to("confirm"))
//!     .unwrap()
//!     .add_step(
//!         "confirm",
//!         StepBuilder::new()
//!             .on_interact(|_| StepTransition::Complete)
//!             .rewind_to("email"),
//!     )
//!     .unwrap()
//!     .register()
//!     .unwrap();
//!
//! let consumer = WorkflowConsumer::new(Arc::new(service));
//! consumer.start("ticket-1", "sign-up").unwrap();
//!
//! let mut responses = ResponseSet::new();
//! responses.insert("address".into(), "ada@example.com".into());
//! assert!(!consumer.interact("ticket-1", responses).unwrap());
//! assert_eq!(consumer.peek("ticket-1").unwrap().step, "confirm");
//! ```

#![deny(unsafe_code)]

pub mod clock;
pub mod config;
pub mod consumer;
pub mod errors;
pub mod instance;
pub mod service;
pub mod step;

// Re-export main types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EngineConfig, LoggingConfig, SessionConfig};
pub use consumer::{StepView, WorkflowConsumer};
pub use errors::{DefinitionError, DefinitionResult, SessionError, SessionResult};
pub use instance::{SessionState, WorkflowInstance};
pub use service::{Workflow, WorkflowBuilder, WorkflowService};
pub use step::{InteractHandler, RewindHandler, StepBuilder, StepTransition, WorkflowStep};
