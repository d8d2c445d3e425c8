//! Task executor that runs a child process.
//!
//! Protocol:
//! - stdin: `{"step_id", "attempt", "max_attempts", "memory"}` as JSON, then EOF
//! - stdout: one JSON object. `confidence`, `usage {calls, units}`, `status`
//!   and `error` are reserved. The object under `output` becomes the task
//!   output; without one, the remaining top-level fields do.
//! - a non-zero exit, unparseable stdout, or `"status": "failed"` is a FAILED
//!   outcome, which the engine may retry
//!
//! The step's advisory timeout is enforced here; the child is killed when it
//! expires.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;

use serde_json::{Map, Value, json};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use waypoint_core::memory::MemoryStore;
use waypoint_core::workflow::task::{TaskCall, TaskError, TaskExecutor};
use waypoint_types::workflow::{ResourceUsage, TaskOutcome};

const RESERVED_FIELDS: [&str; 5] = ["confidence", "usage", "status", "error", "output"];

/// Longest stderr excerpt carried into a failure message.
const MAX_STDERR_CHARS: usize = 500;

/// Ways a child process can fail a step. Each becomes a FAILED outcome.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("'{program}' timed out after {limit_ms}ms")]
    Timeout { program: String, limit_ms: u128 },

    #[error("'{program}' exited with {status}{}", stderr_suffix(.stderr))]
    Exited {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("invalid JSON on stdout: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("expected a JSON object on stdout, got {0}")]
    NotAnObject(&'static str),
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

impl From<CommandError> for TaskOutcome {
    fn from(err: CommandError) -> Self {
        TaskOutcome::failed(err.to_string())
    }
}

pub struct CommandExecutor {
    name: String,
    program: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    working_dir: Option<PathBuf>,
}

impl CommandExecutor {
    pub fn new(program: impl Into<String>) -> Self {
        let program = program.into();
        Self {
            name: format!("command:{program}"),
            program,
            args: Vec::new(),
            env: HashMap::new(),
            working_dir: None,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

impl TaskExecutor for CommandExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        call: &TaskCall,
        memory: &mut MemoryStore,
    ) -> Result<TaskOutcome, TaskError> {
        let payload = serde_json::to_vec(&json!({
            "step_id": call.step_id,
            "attempt": call.attempt,
            "max_attempts": call.max_attempts,
            "memory": memory.to_map(),
        }))?;

        let mut child = match self.command().spawn() {
            Ok(child) => child,
            Err(source) => {
                return Ok(CommandError::Spawn {
                    program: self.program.clone(),
                    source,
                }
                .into());
            }
        };

        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(&payload).await?;
                stdin.shutdown().await?;
            }
            Ok::<(), std::io::Error>(())
        };
        let run = async move { tokio::join!(feed, child.wait_with_output()) };

        let (fed, output) = match call.timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(done) => done,
                Err(_) => {
                    tracing::warn!(program = %self.program, ?limit, "command timed out");
                    return Ok(CommandError::Timeout {
                        program: self.program.clone(),
                        limit_ms: limit.as_millis(),
                    }
                    .into());
                }
            },
            None => run.await,
        };

        if let Err(e) = fed {
            // The child may legitimately exit without reading its input.
            tracing::debug!(program = %self.program, "could not write stdin: {e}");
        }
        let output = output?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Ok(CommandError::Exited {
                program: self.program.clone(),
                status: output.status,
                stderr: stderr.trim().chars().take(MAX_STDERR_CHARS).collect(),
            }
            .into());
        }

        Ok(parse_stdout(&output.stdout))
    }
}

/// Turn a child's stdout into an outcome.
pub fn parse_stdout(stdout: &[u8]) -> TaskOutcome {
    let mut fields = match serde_json::from_slice::<Value>(stdout) {
        Ok(Value::Object(fields)) => fields,
        Ok(other) => return CommandError::NotAnObject(json_kind(&other)).into(),
        Err(e) => return CommandError::from(e).into(),
    };

    let usage = fields
        .get("usage")
        .cloned()
        .and_then(|usage| serde_json::from_value::<ResourceUsage>(usage).ok())
        .unwrap_or_default();

    if fields.get("status").and_then(Value::as_str) == Some("failed") {
        let error = fields
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("command reported failure");
        return TaskOutcome::failed(error).with_usage(usage);
    }

    let confidence = fields
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(1.0);

    let output = match fields.remove("output") {
        Some(Value::Object(output)) => output,
        Some(other) => {
            let mut wrapped = Map::new();
            wrapped.insert("output".to_string(), other);
            wrapped
        }
        None => {
            for field in RESERVED_FIELDS {
                fields.remove(field);
            }
            fields
        }
    };

    TaskOutcome::completed(output, confidence).with_usage(usage)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
