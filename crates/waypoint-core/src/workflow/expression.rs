//! JEXL expression evaluator for manifest step conditions.
//!
//! Wraps `jexl_eval::Evaluator` with a small set of transforms and coerces
//! results to booleans. The evaluation context is always the run's memory
//! map, so `classification.confidence >= 0.5` reads
//! `memory["classification"]["confidence"]`. Memory values are passed as
//! context, never spliced into the expression text.

use jexl_eval::error::EvaluationError;
use serde_json::{Value, json};

use crate::memory::MemoryStore;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ExpressionError {
    #[error("expression evaluation failed: {0}")]
    EvalFailed(String),

    #[error("invalid context: {0}")]
    InvalidContext(String),
}

// ---------------------------------------------------------------------------
// ConditionEvaluator
// ---------------------------------------------------------------------------

/// JEXL evaluator with the condition transforms registered.
///
/// Transforms: `lower`, `upper`, `length`, `contains`, `not`.
pub struct ConditionEvaluator {
    evaluator: jexl_eval::Evaluator<'static>,
}

impl ConditionEvaluator {
    pub fn new() -> Self {
        let evaluator = jexl_eval::Evaluator::new()
            .with_transform("lower", |args: &[Value]| {
                let s = args.first().and_then(|v| v.as_str()).unwrap_or("");
                Ok(json!(s.to_lowercase()))
            })
            .with_transform("upper", |args: &[Value]| {
                let s = args.first().and_then(|v| v.as_str()).unwrap_or("");
                Ok(json!(s.to_uppercase()))
            })
            .with_transform("not", |args: &[Value]| {
                let truthy = args.first().map(value_to_bool).unwrap_or(false);
                Ok(json!(!truthy))
            })
            .with_transform("contains", |args: &[Value]| {
                let found = match (args.first(), args.get(1)) {
                    (Some(Value::String(subject)), Some(Value::String(search))) => {
                        subject.contains(search.as_str())
                    }
                    (Some(Value::Array(items)), Some(needle)) => items.contains(needle),
                    (Some(Value::Object(map)), Some(Value::String(key))) => map.contains_key(key),
                    _ => false,
                };
                Ok(json!(found))
            })
            .with_transform("length", |args: &[Value]| {
                let len = match args.first() {
                    Some(Value::String(s)) => s.chars().count(),
                    Some(Value::Array(a)) => a.len(),
                    Some(Value::Object(o)) => o.len(),
                    _ => 0,
                };
                Ok(json!(len as f64))
            });

        Self { evaluator }
    }

    /// Evaluate `expression` against `context` and coerce to a boolean.
    ///
    /// `context` must be a JSON object.
    pub fn evaluate_bool(&self, expression: &str, context: &Value) -> Result<bool, ExpressionError> {
        let result = self.evaluate_value(expression, context)?;
        Ok(value_to_bool(&result))
    }

    /// Evaluate `expression` against the memory map.
    ///
    /// A top-level key nobody wrote reads as `null`, like a missing child
    /// does, so `research.ready == true` is false on empty memory. Syntax
    /// errors and invalid operations are still errors.
    pub fn evaluate_memory(
        &self,
        expression: &str,
        memory: &MemoryStore,
    ) -> Result<bool, ExpressionError> {
        let mut context = memory.snapshot();
        loop {
            match self.evaluator.eval_in_context(expression, &context) {
                Ok(value) => return Ok(value_to_bool(&value)),
                Err(EvaluationError::UndefinedIdentifier(name)) if !context.contains_key(&name) => {
                    context.insert(name, Value::Null);
                }
                Err(e) => return Err(ExpressionError::EvalFailed(e.to_string())),
            }
        }
    }

    pub fn evaluate_value(&self, expression: &str, context: &Value) -> Result<Value, ExpressionError> {
        if !context.is_object() {
            return Err(ExpressionError::InvalidContext(
                "context must be a JSON object".to_string(),
            ));
        }

        self.evaluator
            .eval_in_context(expression, context)
            .map_err(|e| ExpressionError::EvalFailed(e.to_string()))
    }
}

impl Default for ConditionEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// JavaScript-like truthiness.
pub fn value_to_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().unwrap_or(0.0) != 0.0,
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
