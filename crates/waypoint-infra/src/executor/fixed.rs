//! Task executor with a canned result, for dry runs and demos.

use serde_json::{Map, Value};
use waypoint_core::memory::MemoryStore;
use waypoint_core::workflow::task::{TaskCall, TaskError, TaskExecutor};
use waypoint_types::workflow::{ResourceUsage, TaskOutcome};

/// Fails the first `fail_attempts` attempts of every step it runs, then
/// returns `output`.
#[derive(Debug, Clone)]
pub struct FixedExecutor {
    output: Map<String, Value>,
    confidence: f64,
    fail_attempts: u32,
    error: Option<String>,
}

impl FixedExecutor {
    pub fn new(output: Map<String, Value>) -> Self {
        Self {
            output,
            confidence: 1.0,
            fail_attempts: 0,
            error: None,
        }
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn fail_attempts(mut self, fail_attempts: u32, error: Option<String>) -> Self {
        self.fail_attempts = fail_attempts;
        self.error = error;
        self
    }
}

impl TaskExecutor for FixedExecutor {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn execute(
        &self,
        call: &TaskCall,
        _memory: &mut MemoryStore,
    ) -> Result<TaskOutcome, TaskError> {
        let outcome = if call.attempt < self.fail_attempts {
            let error = self
                .error
                .clone()
                .unwrap_or_else(|| format!("scripted failure on attempt {}", call.attempt + 1));
            TaskOutcome::failed(error)
        } else {
            TaskOutcome::completed(self.output.clone(), self.confidence)
        };
        Ok(outcome.with_usage(ResourceUsage::new(1, 0)))
    }
}
