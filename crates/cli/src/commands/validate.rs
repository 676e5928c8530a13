//! Offline policy file validation

use anyhow::{Context, Result};
use humantime::format_duration;
use scaler_lib::{parse_policies, ServicePolicy};
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;

use crate::output::{print_error, print_json, print_success, print_warning, OutputFormat};

#[derive(Tabled)]
struct PolicyRow {
    #[tabled(rename = "Service")]
    name: String,
    #[tabled(rename = "Replicas")]
    replicas: String,
    #[tabled(rename = "Out (cpu/mem/period)")]
    scale_out: String,
    #[tabled(rename = "In (cpu/mem/period)")]
    scale_in: String,
    #[tabled(rename = "Label")]
    node_label: String,
}

impl From<&ServicePolicy> for PolicyRow {
    fn from(policy: &ServicePolicy) -> Self {
        Self {
            name: policy.name.clone(),
            replicas: format!("{}..{}", policy.min_replicas, policy.max_replicas),
            scale_out: format!(
                "{}% / {}% / {}",
                policy.scale_out.cpu_threshold,
                policy.scale_out.memory_threshold,
                format_duration(policy.scale_out.cooldown)
            ),
            scale_in: format!(
                "{}% / {}% / {}",
                policy.scale_in.cpu_threshold,
                policy.scale_in.memory_threshold,
                format_duration(policy.scale_in.cooldown)
            ),
            node_label: policy.node_label.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct RejectedPolicy {
    name: String,
    error: String,
}

#[derive(Debug, Serialize)]
struct ValidationReport {
    valid: Vec<ServicePolicy>,
    rejected: Vec<RejectedPolicy>,
}

fn build_report(content: &str) -> Result<ValidationReport> {
    let parsed = parse_policies(content)?;
    Ok(ValidationReport {
        valid: parsed.valid,
        rejected: parsed
            .rejected
            .into_iter()
            .map(|(policy, error)| RejectedPolicy {
                name: policy.name,
                error: error.to_string(),
            })
            .collect(),
    })
}

/// Validate a policy file. Returns `false` when any policy is rejected.
pub fn validate_policies(path: &Path, format: OutputFormat) -> Result<bool> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let report = build_report(&content)?;
    let ok = report.rejected.is_empty();

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            if report.valid.is_empty() {
                print_warning("No valid policies in file");
            } else {
                let rows: Vec<PolicyRow> = report.valid.iter().map(PolicyRow::from).collect();
                let table = tabled::Table::new(rows)
                    .with(tabled::settings::Style::rounded())
                    .to_string();
                println!("{}", table);
            }

            for rejected in &report.rejected {
                print_error(&format!("Rejected {}: {}", rejected.name, rejected.error));
            }
            if ok {
                print_success(&format!("{} policies valid", report.valid.len()));
            }
        }
    }

    Ok(ok)
}
