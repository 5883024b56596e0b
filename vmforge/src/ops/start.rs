//! Starting stopped VMs.

use crate::backend::{VirtualizationBackend, VmHandle, VmState};
use crate::errors::ForgeResult;
use crate::logging::JobLogger;

use super::ConfirmFn;

/// Start every named VM that is currently stopped.
///
/// Already-running VMs are left alone, missing names are warned about.
/// Returns the names actually started.
pub async fn start_vms(
    backend: &dyn VirtualizationBackend,
    logger: &JobLogger,
    names: &[String],
    force: bool,
    confirm: ConfirmFn<'_>,
) -> ForgeResult<Vec<String>> {
    let records = backend.list_all().await?;
    let mut started = Vec::new();

    for record in &records {
        if !names.contains(&record.name) {
            continue;
        }
        if record.state != VmState::Stopped {
            logger.info(&format!("{} is already running", record.name));
            continue;
        }
        if !force && !confirm(&record.name) {
            logger.info(&format!("Skipping {}", record.name));
            continue;
        }
        backend.start(&VmHandle::new(&record.name)).await?;
        logger.info(&format!("Started virtual machine {}", record.name));
        started.push(record.name.clone());
    }

    for name in names {
        if !records.iter().any(|r| &r.name == name) {
            logger.error(&format!("Virtual machine {name} not found"));
        }
    }

    Ok(started)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::IpAddr;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::backend::VmRecord;
    use crate::errors::ForgeError;
    use crate::spec::VmSpec;

    struct FakeBackend {
        records: Vec<VmRecord>,
        started: Mutex<Vec<String>>,
    }

    impl FakeBackend {
        fn new(names: &[(&str, VmState)]) -> Self {
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
                started: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl VirtualizationBackend for FakeBackend {
        async fn create(&self, _spec: &VmSpec) -> ForgeResult<VmHandle> {
            Err(ForgeError::Internal("not under test".into()))
        }

        async fn start(&self, handle: &VmHandle) -> ForgeResult<()> {
            self.started.lock().push(handle.name.clone());
            Ok(())
        }

        async fn shutdown(&self, _handle: &VmHandle) -> ForgeResult<()> {
            Ok(())
        }

        async fn destroy(&self, _handle: &VmHandle, _destroy_volumes: bool) -> ForgeResult<()> {
            Ok(())
        }

        async fn list_all(&self) -> ForgeResult<Vec<VmRecord>> {
            Ok(self.records.clone())
        }

        async fn address(&self, _handle: &VmHandle) -> ForgeResult<Option<IpAddr>> {
            Ok(None)
        }

        async fn state(&self, _handle: &VmHandle) -> ForgeResult<VmState> {
            Ok(VmState::Stopped)
        }

        async fn register_autostart(&self, _name: &str) -> ForgeResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn starts_only_stopped_vms_and_warns_about_missing_ones() {
        let backend = FakeBackend::new(&[
            ("web1", VmState::Stopped),
            ("db1", VmState::Running),
        ]);
        let logger = JobLogger::stdio();
        let names: Vec<String> = ["web1", "db1", "ghost"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let started = start_vms(&backend, &logger, &names, true, &|_| true)
            .await
            .unwrap();

        assert_eq!(started, vec!["web1"]);
        assert_eq!(*backend.started.lock(), vec!["web1"]);
    }
}
