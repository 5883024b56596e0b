//! scp/ssh-based transfer for remote hypervisor hosts.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use super::FileTransferClient;
use crate::config::HostConfig;
use crate::errors::{ForgeError, ForgeResult};

pub struct ScpTransfer {
    target: String,
}

impl ScpTransfer {
    pub fn new(host: &HostConfig) -> Self {
        Self {
            target: host.ssh_target(),
        }
    }

    async fn run(&self, mut cmd: Command, what: &str) -> ForgeResult<()> {
        let output = cmd
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ForgeError::Transfer(format!("failed to spawn {what}: {e}")))?;
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(ForgeError::Transfer(format!("{what} failed: {stderr}")))
        }
    }
}

#[async_trait::async_trait]
impl FileTransferClient for ScpTransfer {
    async fn upload(&self, local_path: &Path, remote_path: &Path) -> ForgeResult<()> {
        tracing::info!(
            source = %local_path.display(),
            dest = %remote_path.display(),
            target = %self.target,
            "uploading file"
        );
        let mut cmd = Command::new("scp");
        cmd.arg("-B")
            .arg(local_path)
            .arg(format!("{}:{}", self.target, remote_path.display()));
        self.run(cmd, "scp upload").await
    }

    async fn remote_fetch(&self, url: &str, dest_path: &Path) -> ForgeResult<()> {
        tracing::info!(url, dest = %dest_path.display(), target = %self.target, "fetching URL on host");
        let mut cmd = Command::new("ssh");
        cmd.arg(&self.target)
            .arg("curl")
            .arg("-fsSL")
            .arg("-o")
            .arg(dest_path)
            .arg(url);
        self.run(cmd, "remote fetch").await
    }
}
