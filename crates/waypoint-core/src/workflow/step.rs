//! Step variants: task steps and approval gates.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::condition::{self, Condition};
use super::gate::{GateSummarizer, JsonSummarizer};
use super::task::BoxTaskExecutor;
use crate::memory::MemoryStore;

// ---------------------------------------------------------------------------
// TaskStep
// ---------------------------------------------------------------------------

/// Runs an executor and writes its output under `memory_key`.
#[derive(Debug, Clone)]
pub struct TaskStep {
    pub id: String,
    pub description: String,
    pub executor: BoxTaskExecutor,
    pub memory_key: String,
    /// A terminal failure of a required step fails the run.
    pub required: bool,
    /// Total attempts, including the first. At least 1.
    pub max_attempts: u32,
    pub timeout: Option<Duration>,
    pub condition: Option<Condition>,
}

impl TaskStep {
    pub fn new(
        id: impl Into<String>,
        memory_key: impl Into<String>,
        executor: BoxTaskExecutor,
    ) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            executor,
            memory_key: memory_key.into(),
            required: true,
            max_attempts: 1,
            timeout: None,
            condition: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn should_run(&self, memory: &MemoryStore) -> bool {
        condition::should_run(self.condition.as_ref(), &self.id, memory)
    }
}

// ---------------------------------------------------------------------------
// GateStep
// ---------------------------------------------------------------------------

/// Pauses for human approval in interactive runs.
#[derive(Clone)]
pub struct GateStep {
    pub id: String,
    pub description: String,
    pub summarizer: Arc<dyn GateSummarizer>,
    /// When false the gate approves itself even in interactive runs.
    pub require_approval: bool,
    pub condition: Option<Condition>,
}

impl GateStep {
    /// A gate that summarizes nothing until given a summarizer.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            summarizer: Arc::new(JsonSummarizer::new(Vec::<String>::new())),
            require_approval: true,
            condition: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn summarizer<S: GateSummarizer + 'static>(mut self, summarizer: S) -> Self {
        self.summarizer = Arc::new(summarizer);
        self
    }

    pub fn require_approval(mut self, require_approval: bool) -> Self {
        self.require_approval = require_approval;
        self
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn should_run(&self, memory: &MemoryStore) -> bool {
        condition::should_run(self.condition.as_ref(), &self.id, memory)
    }
}

impl fmt::Debug for GateStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GateStep")
            .field("id", &self.id)
            .field("description", &self.description)
            .field("require_approval", &self.require_approval)
            .field("condition", &self.condition)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Step {
    Task(TaskStep),
    Gate(GateStep),
}

impl Step {
    pub fn id(&self) -> &str {
        match self {
            Step::Task(task) => &task.id,
            Step::Gate(gate) => &gate.id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Step::Task(_) => "task",
            Step::Gate(_) => "gate",
        }
    }

    /// Fail-open: a condition that errors or panics lets the step run.
    pub fn should_run(&self, memory: &MemoryStore) -> bool {
        match self {
            Step::Task(task) => task.should_run(memory),
            Step::Gate(gate) => gate.should_run(memory),
        }
    }
}

impl From<TaskStep> for Step {
    fn from(step: TaskStep) -> Self {
        Step::Task(step)
    }
}

impl From<GateStep> for Step {
    fn from(step: GateStep) -> Self {
        Step::Gate(step)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
