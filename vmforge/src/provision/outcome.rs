//! Result of running the pipeline for one VM.

use std::net::IpAddr;

use chrono::{DateTime, Utc};

use crate::pipeline::PhaseTimings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionStatus {
    Succeeded,
    /// The pipeline stopped after starting the VM, as requested.
    SkippedBootstrap,
    Failed {
        phase: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct ProvisionOutcome {
    pub vm_name: String,
    pub address: Option<IpAddr>,
    pub status: ProvisionStatus,
    /// Durations of every phase that completed, failure or not.
    pub timings: PhaseTimings,
    pub transfer_output: Vec<String>,
    pub bootstrap_output: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ProvisionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self.status,
            ProvisionStatus::Succeeded | ProvisionStatus::SkippedBootstrap
        )
    }

    /// Operator-facing summary, one field per line.
    pub fn summary(&self) -> String {
        let mut lines = vec![format!("Name: {}", self.vm_name)];
        if let Some(address) = self.address {
            lines.push(format!("IP Address: {address}"));
        }
        match &self.status {
            ProvisionStatus::Succeeded => lines.push("Done!".to_string()),
            ProvisionStatus::SkippedBootstrap => {
                lines.push("Started (bootstrap skipped)".to_string())
            }
            ProvisionStatus::Failed { phase, reason } => {
                lines.push(format!("Failed during {phase}: {reason}"))
            }
        }
        lines.join("\n")
    }
}
