//! Scaling status command

use anyhow::Result;
use colored::Colorize;
use scaler_lib::ServiceStatus;
use tabled::Tabled;

use crate::client::{ApiClient, StatusResponse};
use crate::output::{
    color_status, format_optional_timestamp, format_timestamp, print_json, print_warning,
    OutputFormat,
};

/// Row for the status table
#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Decision")]
    decision: String,
    #[tabled(rename = "Nodes")]
    nodes: String,
    #[tabled(rename = "Reason")]
    reason: String,
    #[tabled(rename = "Running")]
    running: usize,
    #[tabled(rename = "Healthy")]
    healthy: usize,
    #[tabled(rename = "Out Staged")]
    staged_out: String,
    #[tabled(rename = "In Staged")]
    staged_in: String,
    #[tabled(rename = "Updated")]
    updated_at: String,
}

impl From<&ServiceStatus> for StatusRow {
    fn from(status: &ServiceStatus) -> Self {
        let nodes = status.decision.nodes();
        Self {
            service: status.service.clone(),
            decision: color_status(status.decision.label()),
            nodes: if nodes.is_empty() {
                "-".to_string()
            } else {
                nodes.join(", ")
            },
            reason: status.reason.to_string(),
            running: status.running,
            healthy: status.healthy,
            staged_out: format_optional_timestamp(status.staged_out.as_ref()),
            staged_in: format_optional_timestamp(status.staged_in.as_ref()),
            updated_at: format_timestamp(&status.updated_at),
        }
    }
}

/// Show the last decision per managed service
pub async fn show_status(
    client: &ApiClient,
    service: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let mut response: StatusResponse = client.get("status").await?;
    if let Some(name) = service {
        response.services.retain(|s| s.service == name);
    }

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => {
            println!("{}", "Scaling Status".bold());
            println!("{}", "=".repeat(60));
            println!("Generated: {}", format_timestamp(&response.generated_at).cyan());
            println!();

            if response.services.is_empty() {
                match service {
                    Some(name) => print_warning(&format!("No decisions recorded for {}", name)),
                    None => print_warning("No decisions recorded yet"),
                }
                return Ok(());
            }

            let rows: Vec<StatusRow> = response.services.iter().map(StatusRow::from).collect();
            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
            println!("\nTotal: {} services", response.services.len());
        }
    }

    Ok(())
}
