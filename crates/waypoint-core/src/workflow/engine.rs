//! The workflow engine: registry plus the sequential run loop.
//!
//! # Execution flow
//!
//! 1. Look up the registered definition and seed a fresh `MemoryStore` with
//!    the caller's input.
//! 2. For each step, in declared order:
//!    - condition false: record a SKIPPED trace and move on
//!    - gate: approve (autonomous) or ask the approval channel (interactive);
//!      rejection cancels the run
//!    - task: run attempts until one completes or `max_attempts` is reached;
//!      a required task that exhausts its attempts fails the run
//! 3. Seal the trace and extract the deliverable keys as `final_output`.
//!
//! Executor errors, approval-channel errors, and panics anywhere in the loop
//! end the run FAILED. `run` only returns `Err` for an unregistered name.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use chrono::Utc;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;
use waypoint_types::config::EngineConfig;
use waypoint_types::workflow::{ResourceUsage, StepStatus, WorkflowStatus};

use super::definition::{DefinitionError, WorkflowDefinition};
use super::gate::{ApprovalChannel, ApprovalError, AutoApprove, BoxApprovalChannel, GateRequest};
use super::panic_message;
use super::retry::RetryPolicy;
use super::step::{GateStep, Step, TaskStep};
use super::task::{TaskCall, TaskError};
use super::trace::{StepTrace, TraceBuilder, WorkflowTrace};
use crate::memory::MemoryStore;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown workflow '{0}'")]
    UnknownWorkflow(String),

    #[error("invalid workflow definition: {0}")]
    InvalidDefinition(#[from] DefinitionError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Approval(#[from] ApprovalError),
}

// ---------------------------------------------------------------------------
// RunMode / WorkflowResult
// ---------------------------------------------------------------------------

/// Whether gates consult the approval channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Every gate approves itself.
    #[default]
    Autonomous,
    /// Gates with `require_approval` ask the approval channel.
    Interactive,
}

impl RunMode {
    pub fn from_interactive(interactive: bool) -> Self {
        if interactive {
            Self::Interactive
        } else {
            Self::Autonomous
        }
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub run_id: Uuid,
    pub workflow_name: String,
    pub status: WorkflowStatus,
    /// Memory as the run left it.
    pub memory: Map<String, Value>,
    pub trace: WorkflowTrace,
    /// The deliverable keys present in memory.
    pub final_output: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkflowResult {
    pub fn succeeded(&self) -> bool {
        self.status == WorkflowStatus::Completed
    }

    pub fn failed(&self) -> bool {
        self.status == WorkflowStatus::Failed
    }
}

/// How the step loop ended when nothing escaped it.
enum RunEnd {
    Completed,
    Failed(String),
    Cancelled,
}

// ---------------------------------------------------------------------------
// WorkflowEngine
// ---------------------------------------------------------------------------

/// Registry of workflow definitions and the loop that runs them.
///
/// Definitions are immutable once registered. Each `run` owns its memory and
/// trace, so one engine can serve concurrent runs.
#[derive(Debug)]
pub struct WorkflowEngine {
    workflows: HashMap<String, WorkflowDefinition>,
    approval: BoxApprovalChannel,
    config: EngineConfig,
}

impl WorkflowEngine {
    /// An engine whose gates auto-approve until a channel is supplied.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            workflows: HashMap::new(),
            approval: BoxApprovalChannel::new(AutoApprove),
            config,
        }
    }

    pub fn with_approval_channel<C: ApprovalChannel + 'static>(mut self, channel: C) -> Self {
        self.approval = BoxApprovalChannel::new(channel);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validate and register a definition. Re-registering a name replaces it.
    pub fn register(&mut self, definition: WorkflowDefinition) -> Result<(), EngineError> {
        definition.validate()?;
        debug!(
            workflow = %definition.name,
            steps = definition.steps.len(),
            "workflow registered"
        );
        self.workflows.insert(definition.name.clone(), definition);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&WorkflowDefinition> {
        self.workflows.get(name)
    }

    /// Registered names, sorted.
    pub fn workflow_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.workflows.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Run a registered workflow to a terminal status.
    ///
    /// `input` is merged into the run's memory before the first step.
    pub async fn run(
        &self,
        name: &str,
        input: Map<String, Value>,
        mode: RunMode,
    ) -> Result<WorkflowResult, EngineError> {
        let definition = self
            .workflows
            .get(name)
            .ok_or_else(|| EngineError::UnknownWorkflow(name.to_string()))?;
        Ok(self.execute(definition, input, mode).await)
    }

    async fn execute(
        &self,
        definition: &WorkflowDefinition,
        input: Map<String, Value>,
        mode: RunMode,
    ) -> WorkflowResult {
        let mut memory = MemoryStore::new();
        memory.update(input);
        let mut trace = TraceBuilder::new(&definition.name);
        let run_id = trace.run_id();

        let span = info_span!(
            "workflow_run",
            workflow.name = %definition.name,
            workflow.run_id = %run_id
        );

        async move {
            info!(steps = definition.steps.len(), ?mode, "workflow started");

            let outcome = AssertUnwindSafe(self.run_steps(definition, &mut memory, &mut trace, mode))
                .catch_unwind()
                .await;

            let (status, error) = match outcome {
                Ok(Ok(RunEnd::Completed)) => (WorkflowStatus::Completed, None),
                Ok(Ok(RunEnd::Cancelled)) => (WorkflowStatus::Cancelled, None),
                Ok(Ok(RunEnd::Failed(message))) => (WorkflowStatus::Failed, Some(message)),
                Ok(Err(e)) => {
                    error!(error = %e, "workflow aborted");
                    (WorkflowStatus::Failed, Some(e.to_string()))
                }
                Err(payload) => {
                    let message = format!("workflow panicked: {}", panic_message(payload.as_ref()));
                    error!(error = %message, "workflow aborted");
                    (WorkflowStatus::Failed, Some(message))
                }
            };

            let trace = trace.finish(status, error.clone());
            let final_output = memory.select(self.deliverable_keys(definition));

            info!(
                status = %status,
                steps_recorded = trace.steps().len(),
                total_calls = trace.total_calls(),
                total_units = trace.total_units(),
                "workflow finished"
            );

            WorkflowResult {
                run_id,
                workflow_name: definition.name.clone(),
                status,
                memory: memory.into_map(),
                trace,
                final_output,
                error,
            }
        }
        .instrument(span)
        .await
    }

    fn deliverable_keys<'a>(&'a self, definition: &'a WorkflowDefinition) -> &'a [String] {
        if definition.deliverables.is_empty() {
            &self.config.deliverable_keys
        } else {
            &definition.deliverables
        }
    }

    async fn run_steps(
        &self,
        definition: &WorkflowDefinition,
        memory: &mut MemoryStore,
        trace: &mut TraceBuilder,
        mode: RunMode,
    ) -> Result<RunEnd, EngineError> {
        for step in &definition.steps {
            if !step.should_run(memory) {
                info!(step_id = step.id(), "step skipped, condition evaluated to false");
                trace.record_skipped(step.id());
                continue;
            }

            match step {
                Step::Gate(gate) => {
                    trace.gate_encountered();
                    if !self.run_gate(&definition.name, gate, memory, mode).await? {
                        info!(step_id = %gate.id, "gate rejected, cancelling workflow");
                        return Ok(RunEnd::Cancelled);
                    }
                    trace.gate_approved();
                }
                Step::Task(task) => {
                    let span = info_span!("step", step.id = %task.id, step.executor = task.executor.name());
                    let record = self.run_task(task, memory).instrument(span).await?;
                    let failure = (record.status == StepStatus::Failed)
                        .then(|| record.error.clone().unwrap_or_default());
                    trace.record(record);

                    if let Some(error) = failure {
                        if task.required {
                            let message = format!("Required step '{}' failed: {}", task.id, error);
                            error!(step_id = %task.id, %error, "required step failed");
                            return Ok(RunEnd::Failed(message));
                        }
                        warn!(step_id = %task.id, %error, "optional step failed, continuing");
                    }
                }
            }
        }

        Ok(RunEnd::Completed)
    }

    /// Attempts run back to back against the same memory. Usage and duration
    /// are summed over all attempts.
    async fn run_task(
        &self,
        task: &TaskStep,
        memory: &mut MemoryStore,
    ) -> Result<StepTrace, TaskError> {
        let policy = RetryPolicy::new(task.max_attempts);
        let input_snapshot = memory.snapshot();
        let started_at = Utc::now();

        let mut usage = ResourceUsage::default();
        let mut duration_ms = 0.0;

        let mut attempt = 0;
        loop {
            if attempt > 0 {
                info!(attempt = attempt + 1, max_attempts = policy.max_attempts(), "retrying step");
            }

            let call = TaskCall {
                step_id: task.id.clone(),
                attempt,
                max_attempts: policy.max_attempts(),
                timeout: task.timeout,
            };

            let clock = Instant::now();
            let outcome = task.executor.execute(&call, memory).await?;
            usage += outcome.usage;
            duration_ms += outcome
                .duration_ms
                .unwrap_or_else(|| clock.elapsed().as_secs_f64() * 1000.0);

            if outcome.succeeded() {
                memory.set(task.memory_key.clone(), Value::Object(outcome.output.clone()));
                info!(
                    confidence = outcome.confidence,
                    calls = usage.calls,
                    units = usage.units,
                    duration_ms,
                    "step completed"
                );
                return Ok(StepTrace {
                    step_id: task.id.clone(),
                    executor: task.executor.name().to_string(),
                    status: StepStatus::Completed,
                    input_snapshot,
                    output: outcome.output,
                    confidence: outcome.confidence,
                    duration_ms,
                    usage,
                    retry_count: attempt,
                    error: None,
                    started_at,
                    completed_at: Utc::now(),
                    notes: None,
                });
            }

            let error = outcome
                .error
                .clone()
                .unwrap_or_else(|| "task failed without an error message".to_string());
            warn!(attempt = attempt + 1, %error, "step attempt failed");

            if !policy.should_retry(attempt) {
                return Ok(StepTrace {
                    step_id: task.id.clone(),
                    executor: task.executor.name().to_string(),
                    status: StepStatus::Failed,
                    input_snapshot,
                    output: Map::new(),
                    confidence: outcome.confidence,
                    duration_ms,
                    usage,
                    retry_count: attempt,
                    error: Some(error),
                    started_at,
                    completed_at: Utc::now(),
                    notes: None,
                });
            }
            attempt += 1;
        }
    }

    async fn run_gate(
        &self,
        workflow_name: &str,
        gate: &GateStep,
        memory: &MemoryStore,
        mode: RunMode,
    ) -> Result<bool, ApprovalError> {
        if mode == RunMode::Autonomous || !gate.require_approval {
            info!(step_id = %gate.id, "gate auto-approved");
            return Ok(true);
        }

        let summary = self.summarize(gate, memory);
        let request = GateRequest {
            workflow_name: workflow_name.to_string(),
            step_id: gate.id.clone(),
            description: gate.description.clone(),
            summary,
        };

        let approved = self.approval.request(&request).await?;
        info!(step_id = %gate.id, approved, "gate decision received");
        Ok(approved)
    }

    /// Summarizer failures (errors or panics) become placeholder text.
    fn summarize(&self, gate: &GateStep, memory: &MemoryStore) -> String {
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| gate.summarizer.summarize(memory)));
        let error = match result {
            Ok(Ok(summary)) => return summary,
            Ok(Err(e)) => e.to_string(),
            Err(payload) => panic_message(payload.as_ref()),
        };
        warn!(step_id = %gate.id, %error, "gate summary failed");
        format!("[{}: {}]", self.config.summary_placeholder, error)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
