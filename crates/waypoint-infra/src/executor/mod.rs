//! Task executor implementations.

pub mod command;
pub mod fixed;

use waypoint_core::workflow::task::BoxTaskExecutor;
use waypoint_types::manifest::ExecutorConfig;

pub use command::CommandExecutor;
pub use fixed::FixedExecutor;

/// Build the executor a manifest step describes.
pub fn build_executor(config: &ExecutorConfig) -> BoxTaskExecutor {
    match config {
        ExecutorConfig::Command {
            program,
            args,
            env,
            working_dir,
        } => {
            let mut executor = CommandExecutor::new(program)
                .args(args.iter().cloned())
                .env(env.clone());
            if let Some(dir) = working_dir {
                executor = executor.working_dir(dir);
            }
            BoxTaskExecutor::new(executor)
        }
        ExecutorConfig::Fixed {
            output,
            confidence,
            fail_attempts,
            error,
        } => BoxTaskExecutor::new(
            FixedExecutor::new(output.clone())
                .confidence(*confidence)
                .fail_attempts(*fail_attempts, error.clone()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_build_executor_names_match_labels() {
        let command = ExecutorConfig::Command {
            program: "./agents/classify.sh".to_string(),
            args: vec!["--fast".to_string()],
            env: HashMap::new(),
            working_dir: Some("/tmp".to_string()),
        };
        assert_eq!(build_executor(&command).name(), command.label());

        let fixed = ExecutorConfig::Fixed {
            output: serde_json::Map::new(),
            confidence: 1.0,
            fail_attempts: 0,
            error: None,
        };
        assert_eq!(build_executor(&fixed).name(), fixed.label());
    }
}
