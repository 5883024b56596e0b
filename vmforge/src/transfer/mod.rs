//! File transfer to the hypervisor host.
//!
//! The pipeline moves two kinds of artifacts: the VM disk image (local
//! machine → host) and an optional ISO (fetched by URL on the host itself).
//! `ScpTransfer` covers the remote case, `LocalTransfer` the case where the
//! hypervisor is this machine.

mod local;
mod scp;

use std::path::Path;

use crate::errors::ForgeResult;

pub use local::LocalTransfer;
pub use scp::ScpTransfer;

/// File transfer operations consumed by the disk-preparation phase.
#[async_trait::async_trait]
pub trait FileTransferClient: Send + Sync {
    /// Copy a local file to `remote_path` on the host.
    async fn upload(&self, local_path: &Path, remote_path: &Path) -> ForgeResult<()>;

    /// Download `url` on the host, saving it to `dest_path` there.
    async fn remote_fetch(&self, url: &str, dest_path: &Path) -> ForgeResult<()>;
}
