//! Workflow service: the registry of workflow definitions
//!
//! The service is built single-threaded during startup and is immutable
//! afterwards. Share it with consumers behind an `Arc`.

use crate::errors::{DefinitionError, DefinitionResult};
use crate::step::{StepBuilder, WorkflowStep};
use formflow_rules::{Form, StepFields};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A registered workflow.
///
/// The first step added is the initial step. Every step is declared by the
/// workflow's form.
#[derive(Debug)]
pub struct Workflow {
    pub name: String,
    pub initial_step: String,
    pub form: Form,
    steps: HashMap<String, WorkflowStep>,
}

impl Workflow {
    pub fn step(&self, name: &str) -> Option<&WorkflowStep> {
        self.steps.get(name)
    }

    pub fn has_step(&self, name: &str) -> bool {
        self.steps.contains_key(name)
    }

    /// Fields of a step, taken from the form
    pub fn fields(&self, step: &str) -> Option<&StepFields> {
        self.form.step(step)
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Registered step names, sorted
    pub fn step_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.steps.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Registry of workflows keyed by name
#[derive(Debug, Default)]
pub struct WorkflowService {
    workflows: HashMap<String, Arc<Workflow>>,
}

impl WorkflowService {
    /// Create a new empty service
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin defining a workflow from a form document.
    ///
    /// The document is compiled strictly: any compile diagnostic aborts the
    /// definition of this workflow.
    pub fn new_workflow(
        &mut self,
        name: &str,
        document: &Value,
    ) -> DefinitionResult<WorkflowBuilder<'_>> {
        let form = Form::compile(name, document).map_err(|errors| {
            tracing::warn!(workflow = %name, errors = errors.len(), "Form failed to compile");
            DefinitionError::FormCompilation {
                workflow: name.to_string(),
                errors,
            }
        })?;
        self.workflow_from_form(name, form)
    }

    /// Begin defining a workflow around an already compiled form
    pub fn workflow_from_form(
        &mut self,
        name: &str,
        form: Form,
    ) -> DefinitionResult<WorkflowBuilder<'_>> {
        if self.workflows.contains_key(name) {
            return Err(DefinitionError::DuplicateWorkflow(name.to_string()));
        }

        Ok(WorkflowBuilder {
            service: self,
            name: name.to_string(),
            form,
            initial_step: None,
            steps: HashMap::new(),
        })
    }

    /// Look up a workflow by name
    pub fn workflow(&self, name: &str) -> Option<Arc<Workflow>> {
        self.workflows.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.workflows.contains_key(name)
    }

    /// Names of all registered workflows, sorted
    pub fn routes(&self) -> Vec<String> {
        let mut names: Vec<String> = self.workflows.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }
}

/// Adds steps to a workflow and registers it on the service.
///
/// Dropping the builder without calling [`register`](Self::register)
/// discards the workflow.
pub struct WorkflowBuilder<'a> {
    service: &'a mut WorkflowService,
    name: String,
    form: Form,
    initial_step: Option<String>,
    steps: HashMap<String, WorkflowStep>,
}

impl<'a> WorkflowBuilder<'a> {
    /// Attach a step. The first step added becomes the initial step.
    pub fn add_step(mut self, name: &str, step: StepBuilder) -> DefinitionResult<Self> {
        if !self.form.has_step(name) {
            return Err(DefinitionError::StepNotInForm {
                workflow: self.name,
                step: name.to_string(),
            });
        }
        if self.steps.contains_key(name) {
            return Err(DefinitionError::DuplicateStep {
                workflow: self.name,
                step: name.to_string(),
            });
        }

        let step = step.build(name)?;
        self.initial_step.get_or_insert_with(|| name.to_string());
        self.steps.insert(name.to_string(), step);
        Ok(self)
    }

    /// Register the workflow, returning the shared definition
    pub fn register(self) -> DefinitionResult<Arc<Workflow>> {
        let initial_step = self
            .initial_step
            .ok_or_else(|| DefinitionError::NoSteps(self.name.clone()))?;

        for unused in self.form.step_names().filter(|s| !self.steps.contains_key(*s)) {
            tracing::warn!(workflow = %self.name, step = %unused, "Form step has no workflow step");
        }

        let workflow = Arc::new(Workflow {
            name: self.name.clone(),
            initial_step,
            form: self.form,
            steps: self.steps,
        });

        tracing::info!(
            workflow = %workflow.name,
            initial_step = %workflow.initial_step,
            steps = workflow.step_count(),
            "Workflow registered"
        );

        self.service
            .workflows
            .insert(self.name, Arc::clone(&workflow));
        Ok(workflow)
    }
}
