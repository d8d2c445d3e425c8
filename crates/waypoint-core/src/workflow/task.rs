//! Task executor port.
//!
//! A task executor performs the unit of work behind a task step (a model
//! call, a process, a lookup) and reports a [`TaskOutcome`]. The engine
//! treats the outcome's output as opaque.
//!
//! `TaskExecutor` uses RPITIT; [`BoxTaskExecutor`] is the type-erased form
//! stored in step definitions:
//! 1. `TaskExecutorDyn` is the object-safe variant with boxed futures
//! 2. it is blanket-implemented for every `T: TaskExecutor`
//! 3. `BoxTaskExecutor` wraps `Arc<dyn TaskExecutorDyn>` and delegates

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use waypoint_types::workflow::TaskOutcome;

use crate::memory::MemoryStore;

// ---------------------------------------------------------------------------
// TaskCall
// ---------------------------------------------------------------------------

/// Per-attempt call context handed to an executor.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskCall {
    pub step_id: String,
    /// Zero-based attempt index.
    pub attempt: u32,
    pub max_attempts: u32,
    /// Advisory only. The engine never enforces it; executors may.
    pub timeout: Option<Duration>,
}

// ---------------------------------------------------------------------------
// TaskError
// ---------------------------------------------------------------------------

/// Unrecoverable executor errors.
///
/// Ordinary task failures are reported as a FAILED [`TaskOutcome`] and are
/// retried. A `TaskError` aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("executor unavailable: {0}")]
    Unavailable(String),

    #[error("executor serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// TaskExecutor
// ---------------------------------------------------------------------------

/// Performs the work of one task step attempt.
///
/// The executor receives the live memory for the duration of the call and
/// cannot retain it. The engine writes the outcome's output under the step's
/// memory key; executors normally leave memory untouched.
pub trait TaskExecutor: Send + Sync {
    /// Name recorded in step traces.
    fn name(&self) -> &str;

    fn execute(
        &self,
        call: &TaskCall,
        memory: &mut MemoryStore,
    ) -> impl Future<Output = Result<TaskOutcome, TaskError>> + Send;
}

/// Object-safe version of [`TaskExecutor`] with boxed futures.
pub trait TaskExecutorDyn: Send + Sync {
    fn name(&self) -> &str;

    fn execute_boxed<'a>(
        &'a self,
        call: &'a TaskCall,
        memory: &'a mut MemoryStore,
    ) -> Pin<Box<dyn Future<Output = Result<TaskOutcome, TaskError>> + Send + 'a>>;
}

impl<T: TaskExecutor> TaskExecutorDyn for T {
    fn name(&self) -> &str {
        TaskExecutor::name(self)
    }

    fn execute_boxed<'a>(
        &'a self,
        call: &'a TaskCall,
        memory: &'a mut MemoryStore,
    ) -> Pin<Box<dyn Future<Output = Result<TaskOutcome, TaskError>> + Send + 'a>> {
        Box::pin(self.execute(call, memory))
    }
}

/// Type-erased task executor. Cheap to clone.
#[derive(Clone)]
pub struct BoxTaskExecutor {
    inner: Arc<dyn TaskExecutorDyn>,
}

impl BoxTaskExecutor {
    pub fn new<T: TaskExecutor + 'static>(executor: T) -> Self {
        Self {
            inner: Arc::new(executor),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn execute(
        &self,
        call: &TaskCall,
        memory: &mut MemoryStore,
    ) -> Result<TaskOutcome, TaskError> {
        self.inner.execute_boxed(call, memory).await
    }
}

impl std::fmt::Debug for BoxTaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxTaskExecutor")
            .field("name", &self.name())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
