//! Local-copy transfer for a hypervisor running on this machine.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use super::FileTransferClient;
use crate::errors::{ForgeError, ForgeResult};

#[derive(Default)]
pub struct LocalTransfer;

#[async_trait::async_trait]
impl FileTransferClient for LocalTransfer {
    async fn upload(&self, local_path: &Path, remote_path: &Path) -> ForgeResult<()> {
        tracing::info!(
            source = %local_path.display(),
            dest = %remote_path.display(),
            "copying disk image"
        );
        if let Some(parent) = remote_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(local_path, remote_path)
            .await
            .map_err(|e| {
                ForgeError::Transfer(format!(
                    "copy {} -> {}: {e}",
                    local_path.display(),
                    remote_path.display()
                ))
            })?;
        Ok(())
    }

    async fn remote_fetch(&self, url: &str, dest_path: &Path) -> ForgeResult<()> {
        tracing::info!(url, dest = %dest_path.display(), "fetching URL");
        let output = Command::new("curl")
            .arg("-fsSL")
            .arg("-o")
            .arg(dest_path)
            .arg(url)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ForgeError::Transfer(format!("failed to spawn curl: {e}")))?;
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(ForgeError::Transfer(format!("fetch {url} failed: {stderr}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn upload_copies_into_destination_dir() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.qcow2");
        tokio::fs::write(&source, b"disk").await.unwrap();

        let dest = dir.path().join("images/web1.qcow2");
        LocalTransfer.upload(&source, &dest).await.unwrap();

        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"disk");
    }
}
