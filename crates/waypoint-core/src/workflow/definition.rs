//! Workflow definitions and structural validation.

use std::collections::HashSet;

use thiserror::Error;

use super::step::{GateStep, Step, TaskStep};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Structural problems that keep a definition from being registered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("workflow name must not be empty")]
    EmptyName,

    #[error("step at position {0} has an empty id")]
    EmptyStepId(usize),

    #[error("duplicate step id '{0}'")]
    DuplicateStepId(String),

    #[error("task step '{0}' must allow at least one attempt")]
    ZeroAttempts(String),

    #[error("task step '{0}' has an empty memory key")]
    EmptyMemoryKey(String),
}

// ---------------------------------------------------------------------------
// WorkflowDefinition
// ---------------------------------------------------------------------------

/// A named, ordered list of steps. The engine runs steps in exactly this
/// order, one at a time.
#[derive(Debug, Clone)]
pub struct WorkflowDefinition {
    pub name: String,
    pub version: String,
    pub description: String,
    pub steps: Vec<Step>,
    /// Memory keys surfaced as a run's `final_output`.
    pub deliverables: Vec<String>,
}

impl WorkflowDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: "1.0".to_string(),
            description: String::new(),
            steps: Vec::new(),
            deliverables: Vec::new(),
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn step(mut self, step: impl Into<Step>) -> Self {
        self.steps.push(step.into());
        self
    }

    pub fn task(self, step: TaskStep) -> Self {
        self.step(step)
    }

    pub fn gate(self, step: GateStep) -> Self {
        self.step(step)
    }

    pub fn deliverables<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deliverables = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn step_ids(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(Step::id)
    }

    pub fn get_step(&self, step_id: &str) -> Option<&Step> {
        self.steps.iter().find(|step| step.id() == step_id)
    }

    pub fn validate(&self) -> Result<(), DefinitionError> {
        validate_definition(self)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Checks:
/// - name is non-empty
/// - every step id is non-empty and unique
/// - task steps allow at least one attempt and name a memory key
///
/// An empty step list is valid; such a workflow completes immediately.
pub fn validate_definition(def: &WorkflowDefinition) -> Result<(), DefinitionError> {
    if def.name.trim().is_empty() {
        return Err(DefinitionError::EmptyName);
    }

    let mut seen = HashSet::new();
    for (index, step) in def.steps.iter().enumerate() {
        let id = step.id();
        if id.trim().is_empty() {
            return Err(DefinitionError::EmptyStepId(index));
        }
        if !seen.insert(id) {
            return Err(DefinitionError::DuplicateStepId(id.to_string()));
        }

        if let Step::Task(task) = step {
            if task.max_attempts == 0 {
                return Err(DefinitionError::ZeroAttempts(task.id.clone()));
            }
            if task.memory_key.trim().is_empty() {
                return Err(DefinitionError::EmptyMemoryKey(task.id.clone()));
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::workflow::task::{BoxTaskExecutor, TaskCall, TaskError, TaskExecutor};
    use serde_json::Map;
    use waypoint_types::workflow::TaskOutcome;

    struct Noop;

    impl TaskExecutor for Noop {
        fn name(&self) -> &str {
            "noop"
        }

        async fn execute(
            &self,
            _call: &TaskCall,
            _memory: &mut MemoryStore,
        ) -> Result<TaskOutcome, TaskError> {
            Ok(TaskOutcome::completed(Map::new(), 1.0))
        }
    }

    fn task(id: &str, key: &str) -> TaskStep {
        TaskStep::new(id, key, BoxTaskExecutor::new(Noop))
    }

    #[test]
    fn test_valid_definition() {
        let def = WorkflowDefinition::new("petition")
            .description("Initial petition")
            .task(task("classify", "classification"))
            .gate(GateStep::new("review"))
            .task(task("draft", "draft"))
            .deliverables(["classification", "draft"]);

        assert!(def.validate().is_ok());
        assert_eq!(def.step_ids().collect::<Vec<_>>(), vec!["classify", "review", "draft"]);
        assert_eq!(def.version, "1.0");
    }

    #[test]
    fn test_get_step_by_id() {
        let def = WorkflowDefinition::new("petition")
            .task(task("classify", "classification"))
            .gate(GateStep::new("review"));

        assert!(matches!(def.get_step("classify"), Some(Step::Task(t)) if t.memory_key == "classification"));
        assert_eq!(def.get_step("review").map(Step::kind), Some("gate"));
        assert!(def.get_step("draft").is_none());
    }

    #[test]
    fn test_empty_steps_valid() {
        assert!(WorkflowDefinition::new("noop").validate().is_ok());
    }

    #[test]
    fn test_empty_name_rejected() {
        let def = WorkflowDefinition::new("  ").task(task("a", "a"));
        assert_eq!(def.validate(), Err(DefinitionError::EmptyName));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let def = WorkflowDefinition::new("wf")
            .task(task("a", "x"))
            .gate(GateStep::new("a"));
        assert_eq!(
            def.validate(),
            Err(DefinitionError::DuplicateStepId("a".to_string()))
        );
    }

    #[test]
    fn test_empty_step_id_rejected() {
        let def = WorkflowDefinition::new("wf").task(task("", "x"));
        assert_eq!(def.validate(), Err(DefinitionError::EmptyStepId(0)));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let def = WorkflowDefinition::new("wf").task(task("a", "x").max_attempts(0));
        assert_eq!(
            def.validate(),
            Err(DefinitionError::ZeroAttempts("a".to_string()))
        );
    }

    #[test]
    fn test_empty_memory_key_rejected() {
        let def = WorkflowDefinition::new("wf").task(task("a", ""));
        assert_eq!(
            def.validate(),
            Err(DefinitionError::EmptyMemoryKey("a".to_string()))
        );
    }
}
