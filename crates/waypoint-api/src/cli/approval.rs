//! Terminal approval channel for interactive runs.

use console::style;
use dialoguer::Confirm;
use waypoint_core::workflow::gate::{ApprovalChannel, ApprovalError, GateRequest};

/// Prints the gate banner and summary to stderr and asks for a yes/no.
///
/// The prompt blocks, so it runs on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleApproval;

impl ApprovalChannel for ConsoleApproval {
    async fn request(&self, request: &GateRequest) -> Result<bool, ApprovalError> {
        let banner = gate_banner(request);
        let prompt = format!("Approve '{}' and continue?", request.step_id);

        tokio::task::spawn_blocking(move || {
            eprintln!("{banner}");
            Confirm::new()
                .with_prompt(prompt)
                .default(true)
                .interact()
                .map_err(|e| ApprovalError::Other(format!("approval prompt failed: {e}")))
        })
        .await
        .map_err(|e| ApprovalError::Closed(e.to_string()))?
    }
}

fn gate_banner(request: &GateRequest) -> String {
    let rule = "=".repeat(60);
    let mut banner = format!(
        "\n{}\n  {} {} / {}\n",
        style(&rule).dim(),
        style("GATE").yellow().bold(),
        style(&request.workflow_name).cyan(),
        style(&request.step_id).cyan().bold(),
    );
    if !request.description.is_empty() {
        banner.push_str(&format!("  {}\n", request.description));
    }
    banner.push_str(&format!("{}\n", style(&rule).dim()));
    for line in request.summary.lines() {
        banner.push_str(&format!("  {line}\n"));
    }
    banner.push_str(&format!("{}", style(&rule).dim()));
    banner
}
