//! Configuration-management bootstrap handoff.
//!
//! Once a VM is reachable over SSH, the pipeline hands off to a
//! `ConfigBootstrapper` that installs the configuration agent and applies
//! the run-list. The production implementation shells out to
//! `knife bootstrap`, capturing its complete output.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;

use crate::errors::{ForgeError, ForgeResult};

/// Everything the bootstrapper needs, assembled by the bootstrap phase.
#[derive(Debug, Clone, Default)]
pub struct BootstrapRequest {
    pub address: String,
    pub ssh_user: String,
    pub ssh_password: Option<String>,
    pub identity_file: Option<PathBuf>,
    /// Ordered roles/recipes applied on the node.
    pub run_list: Vec<String>,
    pub node_name: String,
    pub distro: String,
    pub template_file: Option<PathBuf>,
    pub bootstrap_version: Option<String>,
    pub use_sudo: bool,
    pub skip_host_key_verify: bool,
    pub environment: Option<String>,
}

/// Exit status plus captured output of one bootstrap run.
#[derive(Debug, Clone)]
pub struct BootstrapReport {
    pub status: i32,
    pub output: String,
}

impl BootstrapReport {
    pub fn succeeded(&self) -> bool {
        self.status == 0
    }
}

#[async_trait::async_trait]
pub trait ConfigBootstrapper: Send + Sync {
    async fn bootstrap(&self, request: &BootstrapRequest) -> ForgeResult<BootstrapReport>;
}

/// Bootstrapper invoking the Chef `knife bootstrap` subcommand.
#[derive(Default)]
pub struct KnifeBootstrap;

#[async_trait::async_trait]
impl ConfigBootstrapper for KnifeBootstrap {
    async fn bootstrap(&self, request: &BootstrapRequest) -> ForgeResult<BootstrapReport> {
        let mut cmd = Command::new("knife");
        cmd.arg("bootstrap").arg(&request.address);
        cmd.arg("--ssh-user").arg(&request.ssh_user);
        cmd.arg("--node-name").arg(&request.node_name);
        cmd.arg("--bootstrap-distro").arg(&request.distro);
        if !request.run_list.is_empty() {
            cmd.arg("--run-list").arg(request.run_list.join(","));
        }
        if let Some(password) = &request.ssh_password {
            cmd.arg("--ssh-password").arg(password);
        }
        if let Some(identity) = &request.identity_file {
            cmd.arg("--identity-file").arg(identity);
        }
        if let Some(template) = &request.template_file {
            cmd.arg("--template-file").arg(template);
        }
        if let Some(version) = &request.bootstrap_version {
            cmd.arg("--bootstrap-version").arg(version);
        }
        if let Some(environment) = &request.environment {
            cmd.arg("--environment").arg(environment);
        }
        if request.use_sudo {
            cmd.arg("--sudo");
        }
        if request.skip_host_key_verify {
            cmd.arg("--no-host-key-verify");
        }

        tracing::info!(
            address = %request.address,
            node_name = %request.node_name,
            run_list = %request.run_list.join(","),
            "running knife bootstrap"
        );

        let output = cmd
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ForgeError::Bootstrap(format!("failed to spawn knife: {e}")))?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(BootstrapReport {
            status: output.status.code().unwrap_or(-1),
            output: text,
        })
    }
}
