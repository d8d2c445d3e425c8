//! Audit trace for a workflow run.
//!
//! A [`TraceBuilder`] accumulates [`StepTrace`] records while a run is in
//! flight. [`TraceBuilder::finish`] consumes the builder and yields an
//! immutable [`WorkflowTrace`]; a finalized trace cannot be appended to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;
use waypoint_types::workflow::{ResourceUsage, StepStatus, WorkflowStatus};

/// Note attached to records of steps whose condition was false.
pub const SKIPPED_NOTE: &str = "condition evaluated to false";

// ---------------------------------------------------------------------------
// StepTrace
// ---------------------------------------------------------------------------

/// One step's terminal outcome within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepTrace {
    pub step_id: String,
    /// Empty for skipped steps.
    pub executor: String,
    pub status: StepStatus,
    /// Memory as it was before the first attempt. Empty for skipped steps.
    pub input_snapshot: Map<String, Value>,
    /// Empty unless the step completed.
    pub output: Map<String, Value>,
    pub confidence: f64,
    pub duration_ms: f64,
    pub usage: ResourceUsage,
    /// Index of the terminal attempt (0 = first try).
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl StepTrace {
    /// Zero-cost record for a step whose condition was false.
    pub fn skipped(step_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            step_id: step_id.into(),
            executor: String::new(),
            status: StepStatus::Skipped,
            input_snapshot: Map::new(),
            output: Map::new(),
            confidence: 1.0,
            duration_ms: 0.0,
            usage: ResourceUsage::default(),
            retry_count: 0,
            error: None,
            started_at: now,
            completed_at: now,
            notes: Some(SKIPPED_NOTE.to_string()),
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.status == StepStatus::Skipped
    }
}

/// Clamp into `[0, 1]`; NaN becomes 0.
pub fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

// ---------------------------------------------------------------------------
// TraceBuilder
// ---------------------------------------------------------------------------

/// Mutable trace for a run in progress.
#[derive(Debug)]
pub struct TraceBuilder {
    run_id: Uuid,
    workflow_name: String,
    started_at: DateTime<Utc>,
    steps: Vec<StepTrace>,
    gates_encountered: u32,
    gates_approved: u32,
    total_usage: ResourceUsage,
    total_duration_ms: f64,
}

impl TraceBuilder {
    pub fn new(workflow_name: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            workflow_name: workflow_name.into(),
            started_at: Utc::now(),
            steps: Vec::new(),
            gates_encountered: 0,
            gates_approved: 0,
            total_usage: ResourceUsage::default(),
            total_duration_ms: 0.0,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn steps(&self) -> &[StepTrace] {
        &self.steps
    }

    /// Append a record. Confidence is clamped; skipped records add nothing
    /// to the aggregates.
    pub fn record(&mut self, mut step: StepTrace) {
        step.confidence = clamp_confidence(step.confidence);
        if !step.is_skipped() {
            self.total_usage += step.usage;
            self.total_duration_ms += step.duration_ms;
        }
        self.steps.push(step);
    }

    pub fn record_skipped(&mut self, step_id: impl Into<String>) {
        self.record(StepTrace::skipped(step_id));
    }

    pub fn gate_encountered(&mut self) {
        self.gates_encountered += 1;
    }

    pub fn gate_approved(&mut self) {
        self.gates_approved += 1;
    }

    /// Seal the trace with a terminal status.
    pub fn finish(self, status: WorkflowStatus, error: Option<String>) -> WorkflowTrace {
        WorkflowTrace {
            run_id: self.run_id,
            workflow_name: self.workflow_name,
            status,
            started_at: self.started_at,
            completed_at: Utc::now(),
            steps: self.steps,
            gates_encountered: self.gates_encountered,
            gates_approved: self.gates_approved,
            total_calls: self.total_usage.calls,
            total_units: self.total_usage.units,
            total_duration_ms: self.total_duration_ms,
            error,
        }
    }
}

// ---------------------------------------------------------------------------
// WorkflowTrace
// ---------------------------------------------------------------------------

/// Finalized, read-only trace of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTrace {
    run_id: Uuid,
    workflow_name: String,
    status: WorkflowStatus,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    steps: Vec<StepTrace>,
    gates_encountered: u32,
    gates_approved: u32,
    total_calls: u64,
    total_units: u64,
    total_duration_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl WorkflowTrace {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn workflow_name(&self) -> &str {
        &self.workflow_name
    }

    pub fn status(&self) -> WorkflowStatus {
        self.status
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    pub fn steps(&self) -> &[StepTrace] {
        &self.steps
    }

    pub fn step(&self, step_id: &str) -> Option<&StepTrace> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }

    pub fn gates_encountered(&self) -> u32 {
        self.gates_encountered
    }

    pub fn gates_approved(&self) -> u32 {
        self.gates_approved
    }

    pub fn total_calls(&self) -> u64 {
        self.total_calls
    }

    pub fn total_units(&self) -> u64 {
        self.total_units
    }

    pub fn total_duration_ms(&self) -> f64 {
        self.total_duration_ms
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
