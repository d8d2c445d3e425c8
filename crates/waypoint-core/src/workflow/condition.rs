//! Step conditions and fail-open evaluation.
//!
//! A condition is either a closure captured when the definition is built or
//! a JEXL expression string (the manifest form). Evaluation never fails the
//! run: an error, a panic inside a predicate, or an unparseable expression is
//! logged at WARN and the step runs.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tracing::warn;

use super::expression::{ConditionEvaluator, ExpressionError};
use super::panic_message;
use crate::memory::MemoryStore;

/// Predicate signature for closure conditions.
pub type PredicateFn = dyn Fn(&MemoryStore) -> Result<bool, ConditionError> + Send + Sync;

#[derive(Debug, thiserror::Error)]
pub enum ConditionError {
    #[error("condition failed: {0}")]
    Failed(String),

    #[error(transparent)]
    Expression(#[from] ExpressionError),

    #[error("condition panicked: {0}")]
    Panicked(String),
}

/// When a step should run. Absence of a condition means "always".
#[derive(Clone)]
pub enum Condition {
    Predicate(Arc<PredicateFn>),
    Expression(String),
}

impl Condition {
    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(&MemoryStore) -> Result<bool, ConditionError> + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(predicate))
    }

    /// Infallible predicate shorthand.
    pub fn when<F>(predicate: F) -> Self
    where
        F: Fn(&MemoryStore) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(move |memory: &MemoryStore| Ok(predicate(memory))))
    }

    pub fn expression(expression: impl Into<String>) -> Self {
        Self::Expression(expression.into())
    }

    /// Strict evaluation: errors and panics are returned, not swallowed.
    pub fn evaluate(&self, memory: &MemoryStore) -> Result<bool, ConditionError> {
        match self {
            Condition::Predicate(predicate) => {
                match catch_unwind(AssertUnwindSafe(|| predicate(memory))) {
                    Ok(result) => result,
                    Err(payload) => Err(ConditionError::Panicked(panic_message(payload.as_ref()))),
                }
            }
            // The evaluator holds non-Send transforms, so it is built per call.
            Condition::Expression(expression) => Ok(ConditionEvaluator::new()
                .evaluate_memory(expression, memory)?),
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Predicate(_) => f.write_str("Condition::Predicate(..)"),
            Condition::Expression(expr) => f.debug_tuple("Condition::Expression").field(expr).finish(),
        }
    }
}

/// Fail-open gate for a step: `None` runs, errors run.
pub fn should_run(condition: Option<&Condition>, step_id: &str, memory: &MemoryStore) -> bool {
    let Some(condition) = condition else {
        return true;
    };

    match condition.evaluate(memory) {
        Ok(run) => run,
        Err(e) => {
            warn!(step_id, error = %e, "condition evaluation failed, running step");
            true
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn memory_with_confidence(confidence: f64) -> MemoryStore {
        let mut memory = MemoryStore::new();
        memory.set("classification", json!({ "confidence": confidence }));
        memory
    }

    #[test]
    fn test_no_condition_runs() {
        assert!(should_run(None, "step", &MemoryStore::new()));
    }

    #[test]
    fn test_predicate_true_and_false() {
        let condition = Condition::when(|memory| {
            memory
                .get_f64_nested(&["classification", "confidence"])
                .unwrap_or(0.0)
                >= 0.5
        });
        assert!(should_run(Some(&condition), "draft", &memory_with_confidence(0.9)));
        assert!(!should_run(Some(&condition), "draft", &memory_with_confidence(0.1)));
    }

    #[test]
    fn test_predicate_error_fails_open() {
        let condition = Condition::predicate(|memory| {
            memory
                .get_value("missing")
                .map(|_| true)
                .ok_or_else(|| ConditionError::Failed("no value for 'missing'".to_string()))
        });
        assert!(condition.evaluate(&MemoryStore::new()).is_err());
        assert!(should_run(Some(&condition), "step", &MemoryStore::new()));
    }

    #[test]
    fn test_predicate_panic_fails_open() {
        let condition = Condition::predicate(|_| panic!("boom"));
        match condition.evaluate(&MemoryStore::new()) {
            Err(ConditionError::Panicked(msg)) => assert_eq!(msg, "boom"),
            other => panic!("expected panic error, got {other:?}"),
        }
        assert!(should_run(Some(&condition), "step", &MemoryStore::new()));
    }

    #[test]
    fn test_expression_condition() {
        let condition = Condition::expression("classification.confidence >= 0.5");
        assert!(should_run(Some(&condition), "draft", &memory_with_confidence(0.7)));
        assert!(!should_run(Some(&condition), "draft", &memory_with_confidence(0.2)));
    }

    #[test]
    fn test_malformed_expression_fails_open() {
        let condition = Condition::expression("classification.confidence >=");
        assert!(condition.evaluate(&memory_with_confidence(0.1)).is_err());
        assert!(should_run(Some(&condition), "draft", &memory_with_confidence(0.1)));
    }

    #[test]
    fn test_debug_hides_closure() {
        let condition = Condition::when(|_| true);
        assert_eq!(format!("{condition:?}"), "Condition::Predicate(..)");
    }
}
