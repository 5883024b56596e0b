//! KVM provisioning orchestrator.
//!
//! `vmforge` imports a disk image onto a libvirt host, defines and starts
//! a VM, waits for the guest to acquire an address and accept SSH, and
//! hands the machine to a configuration bootstrapper. Batches of VMs run
//! in-process, sequentially or through a bounded worker pool.
//!
//! The library splits into a generic staged pipeline ([`pipeline`]), the
//! VM provisioning flow built on it ([`provision`]), batch scheduling
//! ([`batch`]), management operations ([`ops`]) and the external
//! collaborator seams ([`backend`], [`transfer`], [`bootstrap`]).

pub mod backend;
pub mod batch;
pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod errors;
pub mod logging;
pub mod ops;
pub mod pipeline;
pub mod provision;
pub mod readiness;
pub mod spec;
pub mod transfer;

pub use errors::{ForgeError, ForgeResult};
pub use spec::VmSpec;
