//! One validated batch job and the runner seam that executes it.

use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;

use crate::backend::VirshBackend;
use crate::bootstrap::KnifeBootstrap;
use crate::cli::CreateArgs;
use crate::errors::{ForgeError, ForgeResult};
use crate::logging::JobLogger;
use crate::provision::{ProvisionOutcome, Provisioner};
use crate::spec::VmSpec;
use crate::transfer::{FileTransferClient, LocalTransfer, ScpTransfer};

use super::BatchEntry;

/// A batch entry whose options parsed and whose spec validated.
///
/// Construction is the validation gate: a `BatchJob` that exists is safe
/// to schedule, and an entry that fails here is reported without ever
/// reaching a runner.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub name: String,
    pub args: CreateArgs,
    pub spec: VmSpec,
}

impl BatchJob {
    pub fn new(entry: &BatchEntry) -> ForgeResult<Self> {
        if entry.name.trim().is_empty() {
            return Err(ForgeError::Validation("job name must not be empty".into()));
        }
        let mut args = CreateArgs::try_parse_from(entry.argv.iter().map(String::as_str))
            .map_err(|e| {
                ForgeError::Validation(format!("job '{}': {}", entry.name, e))
            })?;
        if args.batch.is_some() {
            return Err(ForgeError::Validation(format!(
                "job '{}': batch jobs cannot nest --batch",
                entry.name
            )));
        }
        // The entry key names the VM unless the options say otherwise.
        if args.vm_name.is_none() {
            args.vm_name = Some(entry.name.clone());
        }
        let spec = args.to_spec()?;
        spec.validate()
            .map_err(|e| ForgeError::Validation(format!("job '{}': {}", entry.name, e)))?;
        Ok(Self {
            name: entry.name.clone(),
            args,
            spec,
        })
    }

    /// Execute through `runner` and fold any error into a `JobResult`.
    /// Never returns `Err`; one job's failure must not abort its batch.
    pub async fn run(self, runner: &dyn JobRunner) -> JobResult {
        let name = self.name.clone();
        match runner.run(self).await {
            Ok(outcome) if outcome.is_success() => JobResult {
                name,
                code: 0,
                stdout: outcome.summary(),
                stderr: String::new(),
            },
            Ok(outcome) => JobResult {
                name,
                code: 1,
                stdout: outcome.summary(),
                stderr: match &outcome.status {
                    crate::provision::ProvisionStatus::Failed { phase, reason } => {
                        format!("phase {phase} failed: {reason}")
                    }
                    _ => String::new(),
                },
            },
            Err(err) => JobResult {
                name,
                code: 1,
                stdout: String::new(),
                stderr: err.to_string(),
            },
        }
    }
}

/// Captured result of one job, success or not.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub name: String,
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl JobResult {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    /// Result for an entry that failed validation and was never scheduled.
    pub fn rejected(name: &str, err: &ForgeError) -> Self {
        Self {
            name: name.to_string(),
            code: 1,
            stdout: String::new(),
            stderr: err.to_string(),
        }
    }
}

/// Executes one validated job. The production impl drives the real
/// pipeline; tests substitute fakes with controlled delays and failures.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, job: BatchJob) -> ForgeResult<ProvisionOutcome>;
}

/// Production runner: builds per-job collaborators from the job's host
/// options and runs the provisioning pipeline in-process.
pub struct PipelineJobRunner {
    logger: Arc<JobLogger>,
}

impl PipelineJobRunner {
    pub fn new(logger: Arc<JobLogger>) -> Self {
        Self { logger }
    }
}

#[async_trait]
impl JobRunner for PipelineJobRunner {
    async fn run(&self, job: BatchJob) -> ForgeResult<ProvisionOutcome> {
        let host = job.args.host.to_config();
        let backend = Arc::new(VirshBackend::new(&host));
        let transfer: Arc<dyn FileTransferClient> = if host.is_local() {
            Arc::new(LocalTransfer)
        } else {
            Arc::new(ScpTransfer::new(&host))
        };
        let bootstrapper = Arc::new(KnifeBootstrap);
        let opts = job.args.pipeline_options();
        let deadline = job.args.ssh_timeout.map(std::time::Duration::from_secs);

        Provisioner::new(backend, transfer, bootstrapper, Arc::clone(&self.logger))
            .provision_within(job.spec, opts, deadline)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn entry(name: &str, argv: &[&str]) -> BatchEntry {
        BatchEntry {
            name: name.to_string(),
            argv: argv.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn job_name_becomes_vm_name_when_absent() {
        let disk = NamedTempFile::new().unwrap();
        let path = disk.path().to_str().unwrap().to_string();
        let job = BatchJob::new(&entry("web1", &["--vm-disk", path.as_str()])).unwrap();
        assert_eq!(job.spec.name, "web1");

        let job =
            BatchJob::new(&entry("web1", &["--vm-disk", path.as_str(), "--vm-name", "other"])).unwrap();
        assert_eq!(job.spec.name, "other");
    }

    #[test]
    fn bad_options_fail_at_construction() {
        let err = BatchJob::new(&entry("web1", &["--no-such-flag"])).unwrap_err();
        assert!(matches!(err, ForgeError::Validation(_)));
        assert!(err.to_string().contains("web1"));

        // parses fine, but the spec is invalid (missing disk)
        let err = BatchJob::new(&entry("web1", &[])).unwrap_err();
        assert!(matches!(err, ForgeError::Validation(_)));
    }

    #[test]
    fn nested_batch_is_rejected() {
        let err = BatchJob::new(&entry("web1", &["--batch", "/tmp/other.yaml"])).unwrap_err();
        assert!(err.to_string().contains("nest"));
    }
}
