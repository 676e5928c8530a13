//! Health and readiness command

use anyhow::Result;
use colored::Colorize;
use scaler_lib::{HealthResponse, ReadinessResponse};
use serde::Serialize;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{color_status, print_error, print_json, print_success, OutputFormat};

#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
}

#[derive(Serialize)]
struct HealthReport {
    health: HealthResponse,
    readiness: ReadinessResponse,
}

fn component_rows(health: &HealthResponse) -> Vec<ComponentRow> {
    let mut rows: Vec<ComponentRow> = health
        .components
        .iter()
        .map(|(name, component)| ComponentRow {
            name: name.clone(),
            status: color_status(component.status.as_str()),
            message: component.message.clone().unwrap_or_else(|| "-".to_string()),
        })
        .collect();
    rows.sort_by(|a, b| a.name.cmp(&b.name));
    rows
}

/// Show health of every component and whether the scaler is ready
pub async fn show_health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health: HealthResponse = client.get_probe("healthz").await?;
    let readiness: ReadinessResponse = client.get_probe("readyz").await?;

    match format {
        OutputFormat::Json => print_json(&HealthReport { health, readiness })?,
        OutputFormat::Table => {
            println!("{}", "Scaler Health".bold());
            println!("{}", "=".repeat(60));
            println!("Overall: {}", color_status(health.status.as_str()));
            println!();

            let table = tabled::Table::new(component_rows(&health))
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
            println!();

            if readiness.ready {
                print_success("Scaler is ready");
            } else {
                print_error(&format!(
                    "Scaler is not ready: {}",
                    readiness.reason.as_deref().unwrap_or("unknown reason")
                ));
            }
        }
    }

    Ok(())
}
