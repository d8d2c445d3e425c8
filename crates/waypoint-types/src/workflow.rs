//! Workflow execution types for Waypoint.
//!
//! Defines the status vocabulary for runs and steps, the per-attempt
//! `TaskOutcome` that task executors hand back to the engine, and the
//! `ResourceUsage` counters that the trace aggregates.

use std::fmt;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Statuses
// ---------------------------------------------------------------------------

/// Overall status of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
    /// Reserved for deployments that suspend a run pending an external
    /// resume. The engine in this workspace never produces it.
    WaitingHuman,
}

impl WorkflowStatus {
    /// Whether the run has reached a final state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::WaitingHuman => "waiting_human",
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal status of a single step as recorded in the trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one task attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Completed,
    Failed,
}

impl From<OutcomeStatus> for StepStatus {
    fn from(status: OutcomeStatus) -> Self {
        match status {
            OutcomeStatus::Completed => StepStatus::Completed,
            OutcomeStatus::Failed => StepStatus::Failed,
        }
    }
}

// ---------------------------------------------------------------------------
// Resource accounting
// ---------------------------------------------------------------------------

/// Cost counters reported by a task executor for one attempt.
///
/// `calls` counts round trips to whatever backend the executor drives
/// (model calls, HTTP requests, processes); `units` counts the backend's
/// own resource unit (tokens, bytes, credits).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUsage {
    #[serde(default)]
    pub calls: u64,
    #[serde(default)]
    pub units: u64,
}

impl ResourceUsage {
    pub fn new(calls: u64, units: u64) -> Self {
        Self { calls, units }
    }

    pub fn is_zero(&self) -> bool {
        self.calls == 0 && self.units == 0
    }
}

impl Add for ResourceUsage {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            calls: self.calls.saturating_add(rhs.calls),
            units: self.units.saturating_add(rhs.units),
        }
    }
}

impl AddAssign for ResourceUsage {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

// ---------------------------------------------------------------------------
// TaskOutcome
// ---------------------------------------------------------------------------

/// What a task executor reports for a single attempt.
///
/// `confidence` is passed through as reported; the trace clamps it into
/// `[0, 1]` when the attempt is recorded. `duration_ms` is optional -- when
/// absent the engine uses its own wall-clock measurement of the attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub status: OutcomeStatus,
    #[serde(default)]
    pub output: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub usage: ResourceUsage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
}

fn default_confidence() -> f64 {
    1.0
}

impl TaskOutcome {
    /// A successful attempt with the given output and confidence.
    pub fn completed(output: Map<String, Value>, confidence: f64) -> Self {
        Self {
            status: OutcomeStatus::Completed,
            output,
            error: None,
            confidence,
            usage: ResourceUsage::default(),
            duration_ms: None,
        }
    }

    /// A failed attempt. Output is always empty on failure.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Failed,
            output: Map::new(),
            error: Some(error.into()),
            confidence: 0.0,
            usage: ResourceUsage::default(),
            duration_ms: None,
        }
    }

    pub fn with_usage(mut self, usage: ResourceUsage) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn succeeded(&self) -> bool {
        self.status == OutcomeStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == OutcomeStatus::Failed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
