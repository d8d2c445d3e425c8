//! `wpt validate`: parse and check a manifest without running it.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use console::style;
use waypoint_core::workflow::manifest::serialize_manifest_yaml;
use waypoint_core::workflow::step::Step;
use waypoint_infra::config::{load_engine_config, resolve_config_path};
use waypoint_infra::manifest::{load_manifest, runnable_definition};
use waypoint_types::manifest::ManifestStep;

use super::render;

pub async fn validate_manifest(
    path: &Path,
    print: bool,
    step: Option<&str>,
    json: bool,
) -> Result<ExitCode> {
    let manifest = load_manifest(path)
        .await
        .with_context(|| format!("Workflow validation failed for '{}'", path.display()))?;

    let config = load_engine_config(&resolve_config_path()).await;
    let definition = runnable_definition(&manifest, &config)
        .with_context(|| format!("Workflow '{}' cannot be built", manifest.name))?;

    if print {
        print!("{}", serialize_manifest_yaml(&manifest)?);
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(step_id) = step {
        let step = definition
            .get_step(step_id)
            .with_context(|| format!("Workflow '{}' has no step '{}'", definition.name, step_id))?;
        print_step(step, json)?;
        return Ok(ExitCode::SUCCESS);
    }

    if json {
        let steps: Vec<_> = manifest
            .steps
            .iter()
            .map(|step| match step {
                ManifestStep::Task(task) => serde_json::json!({
                    "id": task.id,
                    "type": "task",
                    "memory_key": task.memory_key,
                    "executor": task.executor.label(),
                    "required": task.required,
                    "max_attempts": task.max_attempts.unwrap_or(config.default_max_attempts),
                    "condition": task.condition,
                }),
                ManifestStep::Gate(gate) => serde_json::json!({
                    "id": gate.id,
                    "type": "gate",
                    "require_approval": gate.require_approval,
                    "condition": gate.condition,
                }),
            })
            .collect();
        let out = serde_json::json!({
            "name": definition.name,
            "version": definition.version,
            "valid": true,
            "deliverables": definition.deliverables,
            "steps": steps,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!();
    println!(
        "  {} Workflow '{}' is valid",
        style("*").green().bold(),
        style(&definition.name).cyan()
    );
    println!("  Version: {}", definition.version);
    if !definition.description.is_empty() {
        println!("  Description: {}", definition.description);
    }
    println!("  Steps: {}", definition.steps.len());
    if !definition.deliverables.is_empty() {
        println!("  Deliverables: {}", definition.deliverables.join(", "));
    }
    if !manifest.steps.is_empty() {
        println!();
        println!(
            "{}",
            render::manifest_step_table(&manifest, config.default_max_attempts)
        );
    }
    println!();

    Ok(ExitCode::SUCCESS)
}

fn print_step(step: &Step, json: bool) -> Result<()> {
    if json {
        let out = match step {
            Step::Task(task) => serde_json::json!({
                "id": task.id,
                "type": "task",
                "memory_key": task.memory_key,
                "executor": task.executor.name(),
                "required": task.required,
                "max_attempts": task.max_attempts,
                "condition": render::condition_label(task.condition.as_ref()),
            }),
            Step::Gate(gate) => serde_json::json!({
                "id": gate.id,
                "type": "gate",
                "description": gate.description,
                "require_approval": gate.require_approval,
                "condition": render::condition_label(gate.condition.as_ref()),
            }),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!();
        println!("{}", render::step_detail_table(step));
        println!();
    }
    Ok(())
}
