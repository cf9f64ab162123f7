//! Workflow consumer: the keyed registry of live sessions
//!
//! Sessions are stored in a [`DashMap`]. Every operation takes the shard
//! lock of its key once and performs lookup, expiry check, validation and
//! mutation under it, so operations on the same key are serialized while
//! different keys proceed in parallel.
//!
//! Expiry is lazy: a session idle for longer than the configured lifetime
//! behaves exactly like an absent key. Expired sessions stay in the map
//! until they are restarted, removed, or swept by
//! [`purge_expired`](WorkflowConsumer::purge_expired).
//!
//! Step callbacks run while the shard lock is held. They must not call
//! back into the consumer.

use crate::clock::{Clock, SystemClock};
use crate::config::SessionConfig;
use crate::errors::{SessionError, SessionResult};
use crate::instance::{SessionState, WorkflowInstance};
use crate::service::{Workflow, WorkflowService};
use chrono::Duration;
use dashmap::mapref::entry::Entry;
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use formflow_rules::{
    redact_sensitive, sanitize_response, validate_response, ResponseSet, StepFields,
    ValidationErrors,
};
use serde::Serialize;
use std::sync::Arc;

/// What a session currently asks of the user
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StepView {
    pub workflow: String,
    pub step: String,
    pub fields: StepFields,
    pub rewindable: bool,
}

/// Session engine over a shared [`WorkflowService`]
pub struct WorkflowConsumer {
    service: Arc<WorkflowService>,
    instances: DashMap<String, WorkflowInstance>,
    lifetime: Duration,
    clock: Arc<dyn Clock>,
}

impl WorkflowConsumer {
    /// Create a consumer with the default session lifetime
    pub fn new(service: Arc<WorkflowService>) -> Self {
        Self::from_config(service, &SessionConfig::default())
    }

    pub fn from_config(service: Arc<WorkflowService>, config: &SessionConfig) -> Self {
        Self {
            service,
            instances: DashMap::new(),
            lifetime: config.lifetime(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    pub fn service(&self) -> &Arc<WorkflowService> {
        &self.service
    }

    /// Start (or resume) a session.
    ///
    /// A live session under `key` is returned as is, without resetting its
    /// progress. An expired one is replaced by a fresh session.
    pub fn start(&self, key: &str, workflow: &str) -> SessionResult<SessionState> {
        let definition = self.workflow(workflow)?;
        let now = self.clock.now();

        match self.instances.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                let instance = entry.get_mut();
                if !instance.is_expired(now, self.lifetime) {
                    if instance.workflow != definition.name {
                        tracing::warn!(
                            session = %key,
                            requested = %definition.name,
                            active = %instance.workflow,
                            "Session already running another workflow"
                        );
                    }
                    return Ok(instance.state.clone());
                }

                tracing::debug!(session = %key, "Replacing expired session");
                *instance = WorkflowInstance::new(&definition.name, &definition.initial_step, now);
            }
            Entry::Vacant(entry) => {
                entry.insert(WorkflowInstance::new(
                    &definition.name,
                    &definition.initial_step,
                    now,
                ));
            }
        }

        tracing::info!(session = %key, workflow = %definition.name, "Session started");
        Ok(SessionState::Active(definition.initial_step.clone()))
    }

    /// Start a session under a freshly generated ticket
    pub fn start_new(&self, workflow: &str) -> SessionResult<(String, SessionState)> {
        let ticket = uuid::Uuid::new_v4().to_string();
        let state = self.start(&ticket, workflow)?;
        Ok((ticket, state))
    }

    /// Describe the current step. Never mutates the session.
    pub fn peek(&self, key: &str) -> SessionResult<StepView> {
        let now = self.clock.now();
        let instance = self
            .instances
            .get(key)
            .filter(|instance| !instance.is_expired(now, self.lifetime))
            .ok_or_else(|| SessionError::SessionNotFound(key.to_string()))?;

        let step = instance.current_step().ok_or(SessionError::Completed)?;
        let workflow = self.workflow(&instance.workflow)?;
        let (fields, rewindable) = Self::step_of(&workflow, step)?;

        Ok(StepView {
            workflow: workflow.name.clone(),
            step: step.to_string(),
            fields: fields.clone(),
            rewindable,
        })
    }

    /// Stored responses of the current step, without sensitive fields.
    ///
    /// Empty when nothing has been stored for the step yet. Refreshes the
    /// session.
    pub fn get(&self, key: &str) -> SessionResult<ResponseSet> {
        let now = self.clock.now();
        let mut instance = self.live(key, now)?;
        instance.touch(now);

        let Some(step) = instance.current_step() else {
            return Ok(ResponseSet::new());
        };
        let workflow = self.workflow(&instance.workflow)?;

        match (instance.responses(step), workflow.fields(step)) {
            (Some(stored), Some(fields)) => Ok(redact_sensitive(fields, stored)),
            _ => Ok(ResponseSet::new()),
        }
    }

    /// Submit responses for the current step.
    ///
    /// Returns whether the workflow is finished. A completed session
    /// answers `true` again without validating anything. Rejected
    /// submissions leave the session untouched.
    pub fn interact(&self, key: &str, mut responses: ResponseSet) -> SessionResult<bool> {
        let now = self.clock.now();
        let mut instance = self.live(key, now)?;

        let Some(step) = instance.current_step().map(str::to_string) else {
            return Ok(true);
        };
        let workflow = self.workflow(&instance.workflow)?;
        let definition = workflow.step(&step).ok_or_else(|| unknown_step(&workflow, &step))?;
        let fields = workflow.fields(&step).ok_or_else(|| unknown_step(&workflow, &step))?;

        sanitize_response(fields, &mut responses);
        let diagnostics = validate_response(fields, &responses);
        if !diagnostics.is_empty() {
            tracing::debug!(
                session = %key,
                step = %step,
                errors = diagnostics.len(),
                "Submission rejected"
            );
            return Err(SessionError::Validation(ValidationErrors(diagnostics)));
        }

        let transition = definition.interact(&responses);
        if let Some(next) = transition.next_step() {
            if !workflow.has_step(next) {
                return Err(unknown_step(&workflow, next));
            }
        }

        let finished = transition.is_complete();
        instance.advance(&step, responses, transition, now);

        if finished {
            tracing::info!(session = %key, workflow = %workflow.name, "Session completed");
        } else {
            tracing::debug!(
                session = %key,
                from = %step,
                to = instance.current_step().unwrap_or_default(),
                "Session advanced"
            );
        }
        Ok(finished)
    }

    /// Go back to the step named by the current step's rewind callback.
    ///
    /// Returns the new current step.
    pub fn rewind(&self, key: &str) -> SessionResult<String> {
        let now = self.clock.now();
        let mut instance = self.live(key, now)?;

        let step = instance
            .current_step()
            .map(str::to_string)
            .ok_or(SessionError::Completed)?;
        let workflow = self.workflow(&instance.workflow)?;
        let definition = workflow.step(&step).ok_or_else(|| unknown_step(&workflow, &step))?;

        let previous = definition
            .rewind()
            .ok_or_else(|| SessionError::NotRewindable(step.clone()))?;
        if !workflow.has_step(&previous) {
            return Err(unknown_step(&workflow, &previous));
        }

        tracing::debug!(session = %key, from = %step, to = %previous, "Session rewound");
        instance.rewind_to(previous.clone(), now);
        Ok(previous)
    }

    /// Copy of a live session
    pub fn snapshot(&self, key: &str) -> Option<WorkflowInstance> {
        let now = self.clock.now();
        self.instances
            .get(key)
            .filter(|instance| !instance.is_expired(now, self.lifetime))
            .map(|instance| instance.clone())
    }

    /// Drop a session. Returns whether one was stored, live or expired.
    pub fn remove(&self, key: &str) -> bool {
        self.instances.remove(key).is_some()
    }

    /// Drop every expired session, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut purged = 0;
        self.instances.retain(|_, instance| {
            let expired = instance.is_expired(now, self.lifetime);
            if expired {
                purged += 1;
            }
            !expired
        });

        if purged > 0 {
            tracing::debug!(purged, "Expired sessions purged");
        }
        purged
    }

    /// Number of stored sessions, expired ones included
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    fn workflow(&self, name: &str) -> SessionResult<Arc<Workflow>> {
        self.service
            .workflow(name)
            .ok_or_else(|| SessionError::WorkflowNotFound(name.to_string()))
    }

    /// Lock a live session for the rest of the operation
    fn live(
        &self,
        key: &str,
        now: chrono::DateTime<chrono::Utc>,
    ) -> SessionResult<RefMut<'_, String, WorkflowInstance>> {
        self.instances
            .get_mut(key)
            .filter(|instance| !instance.is_expired(now, self.lifetime))
            .ok_or_else(|| SessionError::SessionNotFound(key.to_string()))
    }

    fn step_of<'w>(workflow: &'w Workflow, step: &str) -> SessionResult<(&'w StepFields, bool)> {
        let definition = workflow.step(step).ok_or_else(|| unknown_step(workflow, step))?;
        let fields = workflow.fields(step).ok_or_else(|| unknown_step(workflow, step))?;
        Ok((fields, definition.is_rewindable()))
    }
}

fn unknown_step(workflow: &Workflow, step: &str) -> SessionError {
    SessionError::UnknownStep {
        workflow: workflow.name.clone(),
        step: step.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::step::{StepBuilder, StepTransition};
    use formflow_rules::ValidationError;
    use serde_json::json;

    fn responses(pairs: &[(&str, &str)]) -> ResponseSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn service() -> Arc<WorkflowService> {
        let document = json!({
            "account": {
                "user": { "rule": { "op": "regex", "param": "^[a-z]+$" } },
                "password": { "sensitive": true }
            },
            "age": {
                "years": { "rule": { "op": ">=", "param": 18 } }
            },
            "done": {}
        });

        let mut service = WorkflowService::new();
        service
            .new_workflow("signup", &document)
            .unwrap()
            .add_step("account", StepBuilder::new().continue_to("age"))
            .unwrap()
            .add_step(
                "age",
                StepBuilder::new()
                    .on_interact(|_| StepTransition::Complete)
                    .rewind_to("account"),
            )
            .unwrap()
            .add_step(
                "done",
                StepBuilder::new()
                    .continue_to("nowhere")
                    .rewind_to("missing"),
            )
            .unwrap()
            .register()
            .unwrap();
        Arc::new(service)
    }

    fn consumer() -> (WorkflowConsumer, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let consumer = WorkflowConsumer::new(service())
            .with_lifetime(Duration::minutes(10))
            .with_clock(clock.clone());
        (consumer, clock)
    }

    #[test]
    fn test_start_unknown_workflow() {
        let (consumer, _) = consumer();
        let err = consumer.start("k", "nope").unwrap_err();
        assert_eq!(err, SessionError::WorkflowNotFound("nope".into()));
        assert!(err.is_not_found());
        assert!(consumer.is_empty());
    }

    #[test]
    fn test_start_twice_keeps_progress() {
        let (consumer, _) = consumer();
        assert_eq!(
            consumer.start("k", "signup").unwrap(),
            SessionState::Active("account".into())
        );
        consumer
            .interact("k", responses(&[("user", "ada"), ("password", "x")]))
            .unwrap();

        assert_eq!(
            consumer.start("k", "signup").unwrap(),
            SessionState::Active("age".into())
        );
    }

    #[test]
    fn test_start_new_generates_ticket() {
        let (consumer, _) = consumer();
        let (ticket, state) = consumer.start_new("signup").unwrap();
        assert!(uuid::Uuid::parse_str(&ticket).is_ok());
        assert_eq!(state, SessionState::Active("account".into()));
        assert_eq!(consumer.len(), 1);
    }

    #[test]
    fn test_peek_describes_current_step() {
        let (consumer, _) = consumer();
        consumer.start("k", "signup").unwrap();

        let view = consumer.peek("k").unwrap();
        assert_eq!(view.step, "account");
        assert_eq!(view.workflow, "signup");
        assert!(!view.rewindable);
        assert_eq!(view.fields.keys().collect::<Vec<_>>(), vec!["password", "user"]);

        assert_eq!(
            consumer.peek("other").unwrap_err(),
            SessionError::SessionNotFound("other".into())
        );
    }

    #[test]
    fn test_rejected_submission_changes_nothing() {
        let (consumer, clock) = consumer();
        consumer.start("k", "signup").unwrap();
        let before = consumer.snapshot("k").unwrap();

        clock.advance(Duration::minutes(1));
        let err = consumer
            .interact("k", responses(&[("user", "Ada!")]))
            .unwrap_err();

        let diagnostics = err.diagnostics().unwrap();
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics
            .iter()
            .any(|d| matches!(d, ValidationError::MissingResponse { field } if field == "password")));

        let after = consumer.snapshot("k").unwrap();
        assert_eq!(after.state, before.state);
        assert_eq!(after.last_interaction, before.last_interaction);
        assert!(after.responses_by_step.is_empty());
    }

    #[test]
    fn test_interact_sanitizes_and_stores() {
        let (consumer, _) = consumer();
        consumer.start("k", "signup").unwrap();

        let finished = consumer
            .interact(
                "k",
                responses(&[("user", "ada"), ("password", "hunter2"), ("admin", "true")]),
            )
            .unwrap();
        assert!(!finished);

        let instance = consumer.snapshot("k").unwrap();
        assert_eq!(
            instance.responses("account"),
            Some(&responses(&[("user", "ada"), ("password", "hunter2")]))
        );
        assert_eq!(instance.current_step(), Some("age"));
    }

    #[test]
    fn test_get_hides_sensitive_fields() {
        let (consumer, _) = consumer();
        consumer.start("k", "signup").unwrap();
        assert!(consumer.get("k").unwrap().is_empty());

        consumer
            .interact("k", responses(&[("user", "ada"), ("password", "hunter2")]))
            .unwrap();
        consumer.rewind("k").unwrap();

        assert_eq!(consumer.get("k").unwrap(), responses(&[("user", "ada")]));
    }

    #[test]
    fn test_get_refreshes_session() {
        let (consumer, clock) = consumer();
        consumer.start("k", "signup").unwrap();

        clock.advance(Duration::minutes(8));
        consumer.get("k").unwrap();
        clock.advance(Duration::minutes(8));

        assert!(consumer.peek("k").is_ok());
    }

    #[test]
    fn test_completed_session_is_idempotent() {
        let (consumer, _) = consumer();
        consumer.start("k", "signup").unwrap();
        consumer
            .interact("k", responses(&[("user", "ada"), ("password", "x")]))
            .unwrap();
        assert!(consumer.interact("k", responses(&[("years", "30")])).unwrap());

        // No validation on a finished session
        assert!(consumer.interact("k", ResponseSet::new()).unwrap());
        assert_eq!(consumer.peek("k").unwrap_err(), SessionError::Completed);
        assert_eq!(consumer.rewind("k").unwrap_err(), SessionError::Completed);
        assert_eq!(consumer.start("k", "signup").unwrap(), SessionState::Completed);
        assert!(consumer.get("k").unwrap().is_empty());
    }

    #[test]
    fn test_rewind() {
        let (consumer, _) = consumer();
        consumer.start("k", "signup").unwrap();
        assert_eq!(
            consumer.rewind("k").unwrap_err(),
            SessionError::NotRewindable("account".into())
        );

        consumer
            .interact("k", responses(&[("user", "ada"), ("password", "x")]))
            .unwrap();
        assert_eq!(consumer.rewind("k").unwrap(), "account");
        assert_eq!(consumer.peek("k").unwrap().step, "account");
    }

    #[test]
    fn test_transition_to_unknown_step_is_rejected() {
        let service = service();
        let clock = Arc::new(ManualClock::default());
        let consumer = WorkflowConsumer::new(service).with_clock(clock);

        // Put a session directly on the misconfigured step
        consumer.start("k", "signup").unwrap();
        consumer
            .instances
            .get_mut("k")
            .unwrap()
            .rewind_to("done", consumer.clock.now());

        assert_eq!(
            consumer.interact("k", ResponseSet::new()).unwrap_err(),
            SessionError::UnknownStep {
                workflow: "signup".into(),
                step: "nowhere".into()
            }
        );
        assert_eq!(consumer.peek("k").unwrap().step, "done");
        assert!(consumer.snapshot("k").unwrap().responses("done").is_none());

        assert!(matches!(
            consumer.rewind("k").unwrap_err(),
            SessionError::UnknownStep { step, .. } if step == "missing"
        ));
    }

    #[test]
    fn test_expired_session_behaves_like_absent_key() {
        let (consumer, clock) = consumer();
        consumer.start("k", "signup").unwrap();

        clock.advance(Duration::minutes(10) + Duration::seconds(1));

        let not_found = SessionError::SessionNotFound("k".into());
        assert_eq!(consumer.peek("k").unwrap_err(), not_found);
        assert_eq!(consumer.get("k").unwrap_err(), not_found);
        assert_eq!(consumer.interact("k", ResponseSet::new()).unwrap_err(), not_found);
        assert_eq!(consumer.rewind("k").unwrap_err(), not_found);
        assert!(consumer.snapshot("k").is_none());
    }

    #[test]
    fn test_start_replaces_expired_session() {
        let (consumer, clock) = consumer();
        consumer.start("k", "signup").unwrap();
        consumer
            .interact("k", responses(&[("user", "ada"), ("password", "x")]))
            .unwrap();

        clock.advance(Duration::hours(1));
        assert_eq!(
            consumer.start("k", "signup").unwrap(),
            SessionState::Active("account".into())
        );
        assert!(consumer.snapshot("k").unwrap().responses_by_step.is_empty());
    }

    #[test]
    fn test_purge_and_remove() {
        let (consumer, clock) = consumer();
        consumer.start("old", "signup").unwrap();
        clock.advance(Duration::minutes(11));
        consumer.start("new", "signup").unwrap();

        assert_eq!(consumer.len(), 2);
        assert_eq!(consumer.purge_expired(), 1);
        assert_eq!(consumer.len(), 1);

        assert!(consumer.remove("new"));
        assert!(!consumer.remove("new"));
        assert!(consumer.is_empty());
    }

    #[test]
    fn test_from_config_lifetime() {
        let config = SessionConfig { lifetime_secs: 30 };
        let consumer = WorkflowConsumer::from_config(service(), &config);
        assert_eq!(consumer.lifetime(), Duration::seconds(30));
        assert_eq!(WorkflowConsumer::new(service()).lifetime(), Duration::hours(12));
    }
}
