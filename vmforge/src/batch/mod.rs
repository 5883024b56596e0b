//! Multi-VM batch provisioning.
//!
//! A batch file is a YAML mapping of job name to create options. Each
//! entry is materialized into the same argv a `vm create` invocation
//! would receive and parsed with the regular CLI types, so batch jobs and
//! single invocations cannot drift apart. Jobs run in-process through a
//! [`JobRunner`] rather than by re-invoking the binary.

mod job;
mod orchestrator;
mod spec;

pub use job::{BatchJob, JobResult, JobRunner, PipelineJobRunner};
pub use orchestrator::{BatchMode, BatchOrchestrator, DEFAULT_MAX_PARALLEL};
pub use spec::{BatchEntry, BatchSpec};
