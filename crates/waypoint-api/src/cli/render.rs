//! Styled terminal output for runs and manifests.

use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use waypoint_core::workflow::condition::Condition;
use waypoint_core::workflow::engine::WorkflowResult;
use waypoint_core::workflow::step::Step;
use waypoint_types::manifest::{ManifestStep, WorkflowManifest};
use waypoint_types::workflow::{StepStatus, WorkflowStatus};

// ---------------------------------------------------------------------------
// Run results
// ---------------------------------------------------------------------------

pub fn print_run_summary(result: &WorkflowResult) {
    let trace = &result.trace;

    println!();
    println!(
        "  {} Workflow '{}' {}",
        status_marker(result.status),
        style(&result.workflow_name).cyan(),
        styled_status(result.status)
    );
    println!("  Run ID: {}", result.run_id);
    println!(
        "  Duration: {}  Calls: {}  Units: {}",
        format_duration(trace.total_duration_ms()),
        trace.total_calls(),
        trace.total_units()
    );
    println!(
        "  Gates: {} approved / {} encountered",
        trace.gates_approved(),
        trace.gates_encountered()
    );
    if let Some(ref error) = result.error {
        println!("  Error: {}", style(error).red());
    }

    if !trace.steps().is_empty() {
        println!();
        println!("{}", step_trace_table(result));
    }

    if !result.final_output.is_empty() {
        println!();
        println!("  {}", style("Deliverables").bold());
        for key in result.final_output.keys() {
            println!("    - {key}");
        }
    }
    println!();
}

fn step_trace_table(result: &WorkflowResult) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Step").fg(Color::Cyan),
            Cell::new("Status"),
            Cell::new("Executor"),
            Cell::new("Confidence"),
            Cell::new("Retries"),
            Cell::new("Duration"),
            Cell::new("Notes"),
        ]);

    for step in result.trace.steps() {
        let notes = step
            .error
            .as_deref()
            .or(step.notes.as_deref())
            .unwrap_or("-");
        let executor = if step.executor.is_empty() {
            "-"
        } else {
            step.executor.as_str()
        };

        table.add_row(vec![
            Cell::new(&step.step_id),
            step_status_cell(step.status),
            Cell::new(executor),
            Cell::new(format!("{:.2}", step.confidence)),
            Cell::new(step.retry_count),
            Cell::new(format_duration(step.duration_ms)),
            Cell::new(notes),
        ]);
    }

    table
}

fn step_status_cell(status: StepStatus) -> Cell {
    match status {
        StepStatus::Completed => Cell::new("completed").fg(Color::Green),
        StepStatus::Failed => Cell::new("failed").fg(Color::Red),
        StepStatus::Skipped => Cell::new("skipped").fg(Color::DarkYellow),
    }
}

fn status_marker(status: WorkflowStatus) -> console::StyledObject<&'static str> {
    match status {
        WorkflowStatus::Completed => style("*").green().bold(),
        WorkflowStatus::Failed => style("x").red().bold(),
        _ => style("-").yellow().bold(),
    }
}

fn styled_status(status: WorkflowStatus) -> console::StyledObject<&'static str> {
    let text = status.as_str();
    match status {
        WorkflowStatus::Completed => style(text).green(),
        WorkflowStatus::Failed => style(text).red(),
        WorkflowStatus::Cancelled => style(text).yellow(),
        WorkflowStatus::Running | WorkflowStatus::WaitingHuman => style(text).blue(),
    }
}

pub fn format_duration(ms: f64) -> String {
    if ms < 1000.0 {
        format!("{ms:.0}ms")
    } else {
        format!("{:.1}s", ms / 1000.0)
    }
}

// ---------------------------------------------------------------------------
// Manifests
// ---------------------------------------------------------------------------

pub fn manifest_step_table(manifest: &WorkflowManifest, default_attempts: u32) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("#"),
            Cell::new("Step").fg(Color::Cyan),
            Cell::new("Type"),
            Cell::new("Writes / Approval"),
            Cell::new("Executor"),
            Cell::new("Attempts"),
            Cell::new("Condition"),
        ]);

    for (index, step) in manifest.steps.iter().enumerate() {
        let condition = step.condition().unwrap_or("-");
        let row = match step {
            ManifestStep::Task(task) => vec![
                Cell::new(index + 1),
                Cell::new(&task.id),
                Cell::new(if task.required { "task" } else { "task (optional)" }),
                Cell::new(&task.memory_key),
                Cell::new(task.executor.label()),
                Cell::new(task.max_attempts.unwrap_or(default_attempts)),
                Cell::new(condition),
            ],
            ManifestStep::Gate(gate) => vec![
                Cell::new(index + 1),
                Cell::new(&gate.id),
                Cell::new("gate").fg(Color::Magenta),
                Cell::new(if gate.require_approval {
                    "required"
                } else {
                    "automatic"
                }),
                Cell::new("-"),
                Cell::new("-"),
                Cell::new(condition),
            ],
        };
        table.add_row(row);
    }

    table
}

// ---------------------------------------------------------------------------
// Single step
// ---------------------------------------------------------------------------

pub fn condition_label(condition: Option<&Condition>) -> &str {
    match condition {
        Some(Condition::Expression(expression)) => expression.as_str(),
        Some(Condition::Predicate(_)) => "(predicate)",
        None => "-",
    }
}

/// Two-column detail view of one built step.
pub fn step_detail_table(step: &Step) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let mut rows: Vec<(&str, String)> = vec![("Step", step.id().to_string()), ("Type", step.kind().to_string())];
    match step {
        Step::Task(task) => {
            rows.push(("Memory key", task.memory_key.clone()));
            rows.push(("Executor", task.executor.name().to_string()));
            rows.push(("Required", task.required.to_string()));
            rows.push(("Attempts", task.max_attempts.to_string()));
            rows.push(("Condition", condition_label(task.condition.as_ref()).to_string()));
        }
        Step::Gate(gate) => {
            rows.push(("Description", gate.description.clone()));
            rows.push(("Approval", if gate.require_approval { "required" } else { "automatic" }.to_string()));
            rows.push(("Condition", condition_label(gate.condition.as_ref()).to_string()));
        }
    }

    for (label, value) in rows {
        table.add_row(vec![Cell::new(label).fg(Color::Cyan), Cell::new(value)]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use waypoint_core::workflow::manifest::parse_manifest_yaml;
    use waypoint_core::workflow::step::GateStep;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(12.4), "12ms");
        assert_eq!(format_duration(1500.0), "1.5s");
    }

    #[test]
    fn test_gate_detail_shows_condition() {
        let gate: Step = GateStep::new("human_review")
            .description("Lawyer review")
            .condition(Condition::expression("review.needs_human == true"))
            .into();

        let rendered = step_detail_table(&gate).to_string();
        assert!(rendered.contains("human_review"));
        assert!(rendered.contains("Lawyer review"));
        assert!(rendered.contains("required"));
        assert!(rendered.contains("review.needs_human == true"));
        assert_eq!(condition_label(Some(&Condition::when(|_| true))), "(predicate)");
    }

    #[test]
    fn test_manifest_table_uses_default_attempts() {
        let manifest = parse_manifest_yaml(
            r#"
name: triage
steps:
  - type: task
    id: classify
    memory_key: classification
    executor: { type: fixed }
  - type: task
    id: research
    memory_key: research
    required: false
    max_attempts: 3
    condition: "classification.area == 'civil'"
    executor: { type: command, program: ./agents/research.sh }
  - type: gate
    id: review
    require_approval: false
"#,
        )
        .unwrap();

        let rendered = manifest_step_table(&manifest, 2).to_string();
        assert!(rendered.contains("classification"));
        assert!(rendered.contains("task (optional)"));
        assert!(rendered.contains("command:./agents/research.sh"));
        assert!(rendered.contains("automatic"));
        assert!(rendered.contains("2"));
        assert!(rendered.contains("3"));
    }
}
