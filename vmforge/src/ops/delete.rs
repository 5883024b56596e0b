//! VM deletion, optionally preceded by a graceful shutdown window.

use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use crate::backend::{VirtualizationBackend, VmHandle, VmState};
use crate::errors::ForgeResult;
use crate::logging::JobLogger;

use super::ConfirmFn;

pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(60);

const STATE_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct DeleteOptions {
    /// Skip the per-VM confirmation prompt.
    pub force: bool,
    /// Request a graceful shutdown and wait for it before destroying.
    pub shutdown_first: bool,
    /// How long to wait for the graceful shutdown. Destruction proceeds
    /// when the window closes, down or not.
    pub shutdown_timeout: Duration,
}

impl Default for DeleteOptions {
    fn default() -> Self {
        Self {
            force: false,
            shutdown_first: false,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

/// Delete every named VM that exists on the backend.
///
/// Names that match nothing are warned about, declined confirmations skip
/// the VM, and volumes are always removed with the domain. Returns the
/// names actually deleted.
pub async fn delete_vms(
    backend: &dyn VirtualizationBackend,
    logger: &JobLogger,
    names: &[String],
    opts: &DeleteOptions,
    confirm: ConfirmFn<'_>,
) -> ForgeResult<Vec<String>> {
    let records = backend.list_all().await?;
    let mut deleted = Vec::new();

    for record in &records {
        if !names.contains(&record.name) {
            continue;
        }
        if !opts.force && !confirm(&record.name) {
            logger.info(&format!("Skipping {}", record.name));
            continue;
        }

        let handle = VmHandle::new(&record.name);
        if opts.shutdown_first && backend.state(&handle).await? == VmState::Running {
            logger.info(&format!(
                "Requesting shutdown of {} before deletion",
                record.name
            ));
            backend.shutdown(&handle).await?;
            await_shutdown(backend, &handle, opts.shutdown_timeout).await?;
        }

        backend.destroy(&handle, true).await?;
        logger.info(&format!("Deleted virtual machine {}", record.name));
        deleted.push(record.name.clone());
    }

    for name in names {
        if !deleted.contains(name) && !records.iter().any(|r| &r.name == name) {
            logger.error(&format!("Virtual machine {name} not found"));
        }
    }

    Ok(deleted)
}

/// Poll the VM state once a second until it leaves `Running` or the
/// timeout window closes.
async fn await_shutdown(
    backend: &dyn VirtualizationBackend,
    handle: &VmHandle,
    timeout: Duration,
) -> ForgeResult<()> {
    let mut waited = Duration::ZERO;
    while waited < timeout {
        if backend.state(handle).await? != VmState::Running {
            debug!(vm = %handle.name, ?waited, "VM shut down");
            return Ok(());
        }
        sleep(STATE_POLL_INTERVAL).await;
        waited += STATE_POLL_INTERVAL;
    }
    debug!(vm = %handle.name, ?timeout, "shutdown window closed, destroying anyway");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::IpAddr;
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tokio::time::Instant;

    use crate::backend::VmRecord;
    use crate::errors::ForgeError;
    use crate::spec::VmSpec;

    /// State-machine fake: VMs shut down a fixed duration after the
    /// shutdown request.
    struct FakeBackend {
        records: Vec<VmRecord>,
        shutdown_lag: Duration,
        shutdown_at: Mutex<Option<Instant>>,
        destroyed: Mutex<Vec<(String, Instant)>>,
    }

    impl FakeBackend {
        fn new(names: &[(&str, VmState)], shutdown_lag: Duration) -> Self {
            Self {
                records: names
                    .iter()
                    .map(|(name, state)| VmRecord {
                        name: name.to_string(),
                        state: *state,
                        max_memory_mb: 512,
                        cpus: 1,
                        os_type: "hvm".to_string(),
                        arch: "x86_64".to_string(),
                    })
                    .collect(),
                shutdown_lag,
                shutdown_at: Mutex::new(None),
                destroyed: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl VirtualizationBackend for FakeBackend {
        async fn create(&self, _spec: &VmSpec) -> ForgeResult<VmHandle> {
            Err(ForgeError::Internal("not under test".into()))
        }

        async fn start(&self, _handle: &VmHandle) -> ForgeResult<()> {
            Ok(())
        }

        async fn shutdown(&self, _handle: &VmHandle) -> ForgeResult<()> {
            *self.shutdown_at.lock() = Some(Instant::now());
            Ok(())
        }

        async fn destroy(&self, handle: &VmHandle, _destroy_volumes: bool) -> ForgeResult<()> {
            self.destroyed
                .lock()
                .push((handle.name.clone(), Instant::now()));
            Ok(())
        }

        async fn list_all(&self) -> ForgeResult<Vec<VmRecord>> {
            Ok(self.records.clone())
        }

        async fn address(&self, _handle: &VmHandle) -> ForgeResult<Option<IpAddr>> {
            Ok(None)
        }

        async fn state(&self, handle: &VmHandle) -> ForgeResult<VmState> {
            let initial = self
                .records
                .iter()
                .find(|r| r.name == handle.name)
                .map(|r| r.state)
                .ok_or_else(|| ForgeError::NotFound(handle.name.clone()))?;
            if initial == VmState::Running {
                if let Some(at) = *self.shutdown_at.lock() {
                    if at.elapsed() >= self.shutdown_lag {
                        return Ok(VmState::Stopped);
                    }
                }
            }
            Ok(initial)
        }

        async fn register_autostart(&self, _name: &str) -> ForgeResult<()> {
            Ok(())
        }
    }

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_window_bounds_the_wait_before_destroy() {
        // VM takes 65s to shut down; the 60s window closes first and the
        // destroy happens at exactly 60s.
        let backend = Arc::new(FakeBackend::new(
            &[("web1", VmState::Running)],
            Duration::from_secs(65),
        ));
        let logger = JobLogger::stdio();
        let opts = DeleteOptions {
            force: true,
            shutdown_first: true,
            shutdown_timeout: Duration::from_secs(60),
        };

        let started = Instant::now();
        let deleted = delete_vms(backend.as_ref(), &logger, &names(&["web1"]), &opts, &|_| {
            true
        })
        .await
        .unwrap();

        assert_eq!(deleted, vec!["web1"]);
        let destroyed = backend.destroyed.lock();
        assert_eq!(destroyed.len(), 1);
        assert_eq!(destroyed[0].1 - started, Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn destroys_as_soon_as_the_vm_stops() {
        let backend = Arc::new(FakeBackend::new(
            &[("web1", VmState::Running)],
            Duration::from_secs(3),
        ));
        let logger = JobLogger::stdio();
        let opts = DeleteOptions {
            force: true,
            shutdown_first: true,
            shutdown_timeout: Duration::from_secs(60),
        };

        let started = Instant::now();
        delete_vms(backend.as_ref(), &logger, &names(&["web1"]), &opts, &|_| {
            true
        })
        .await
        .unwrap();

        let destroyed = backend.destroyed.lock();
        assert_eq!(destroyed[0].1 - started, Duration::from_secs(3));
    }

    #[tokio::test]
    async fn declined_confirmation_skips_and_missing_names_warn() {
        let backend = Arc::new(FakeBackend::new(
            &[("web1", VmState::Stopped), ("db1", VmState::Stopped)],
            Duration::ZERO,
        ));
        let logger = JobLogger::stdio();

        let deleted = delete_vms(
            backend.as_ref(),
            &logger,
            &names(&["web1", "db1", "ghost"]),
            &DeleteOptions::default(),
            &|name| name == "db1",
        )
        .await
        .unwrap();

        assert_eq!(deleted, vec!["db1"]);
        let destroyed = backend.destroyed.lock();
        assert_eq!(destroyed.len(), 1);
        assert_eq!(destroyed[0].0, "db1");
    }
}
