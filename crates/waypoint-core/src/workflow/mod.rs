//! Sequential workflow orchestration.
//!
//! A [`WorkflowDefinition`](definition::WorkflowDefinition) is an ordered list
//! of task and gate steps. The [`WorkflowEngine`](engine::WorkflowEngine)
//! drives one step at a time against a per-run [`MemoryStore`](crate::memory::MemoryStore),
//! applying retry bounds, fail-open conditions, and gate approval, and
//! records every decision in a [`WorkflowTrace`](trace::WorkflowTrace).

pub mod condition;
pub mod definition;
pub mod engine;
pub mod expression;
pub mod gate;
pub mod manifest;
pub mod retry;
pub mod step;
pub mod task;
pub mod trace;

use std::any::Any;

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
