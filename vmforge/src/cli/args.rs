//! Command-line surface.
//!
//! `CreateArgs` doubles as the batch option schema: each batch entry's
//! option mapping is materialized to flag/value argv and parsed with the
//! same type, so a batch job and a single `vm create` invocation accept
//! exactly the same inputs.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::HostConfig;
use crate::errors::ForgeResult;
use crate::provision::{BootstrapOptions, PipelineOptions};
use crate::spec::{DEFAULT_DEST_DIR, DEFAULT_VOLUME_CAPACITY, VmSpec};

#[derive(Parser, Debug)]
#[command(name = "vmforge", version, about = "Provision KVM virtual machines")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Virtual machine operations.
    #[command(subcommand)]
    Vm(VmCommand),
}

#[derive(Subcommand, Debug)]
pub enum VmCommand {
    /// Create a VM, wait for readiness and bootstrap it.
    Create(CreateArgs),
    /// Delete VMs, optionally shutting them down first.
    Delete(DeleteArgs),
    /// List VMs on the host.
    List(ListArgs),
    /// Start stopped VMs.
    Start(StartArgs),
}

/// Host/credential option group shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct HostArgs {
    /// KVM host address.
    #[arg(long = "kvm-host", default_value = "127.0.0.1")]
    pub kvm_host: String,

    /// KVM username.
    #[arg(long = "kvm-username", default_value = "root")]
    pub kvm_username: String,

    /// KVM password.
    #[arg(long = "kvm-password")]
    pub kvm_password: Option<String>,

    /// Libvirt connection protocol.
    #[arg(long = "libvirt-protocol", default_value = "ssh")]
    pub libvirt_protocol: String,
}

impl HostArgs {
    pub fn to_config(&self) -> HostConfig {
        HostConfig {
            host: self.kvm_host.clone(),
            username: self.kvm_username.clone(),
            password: self.kvm_password.clone(),
            protocol: self.libvirt_protocol.clone(),
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "vm create", no_binary_name = true)]
pub struct CreateArgs {
    #[command(flatten)]
    pub host: HostArgs,

    /// Path to the QCOW2 disk file.
    #[arg(long = "vm-disk")]
    pub vm_disk: Option<PathBuf>,

    /// Virtual machine name.
    #[arg(long = "vm-name")]
    pub vm_name: Option<String>,

    /// Storage pool for the VM files.
    #[arg(long, default_value = "default")]
    pub pool: String,

    /// OS type.
    #[arg(long = "os-type", default_value = "hvm")]
    pub os_type: String,

    /// VM memory in MB.
    #[arg(long = "vm-memory", default_value_t = 512)]
    pub vm_memory: u32,

    /// VM maximum memory in MB; defaults to --vm-memory.
    #[arg(long = "vm-max-memory")]
    pub vm_max_memory: Option<u32>,

    /// Number of virtual CPUs.
    #[arg(long = "vm-cpus", default_value_t = 1)]
    pub vm_cpus: u32,

    /// Guest architecture.
    #[arg(long, default_value = "x86_64")]
    pub arch: String,

    /// Network interface description, `type:name`.
    #[arg(long = "network-interface", default_value = "bridge:br0")]
    pub network_interface: String,

    /// Start the VM on host boot.
    #[arg(long)]
    pub autostart: bool,

    /// ISO to download onto the host before creation.
    #[arg(long = "iso-url")]
    pub iso_url: Option<String>,

    /// Directory on the host for downloaded ISOs.
    #[arg(long = "iso-dir")]
    pub iso_dir: Option<PathBuf>,

    /// Directory on the host for disk images.
    #[arg(long = "dest-dir", default_value = DEFAULT_DEST_DIR)]
    pub dest_dir: PathBuf,

    /// Create an empty disk instead of importing one.
    #[arg(long = "new-disk")]
    pub new_disk: bool,

    /// Maximum volume capacity.
    #[arg(long = "volume-capacity", default_value = DEFAULT_VOLUME_CAPACITY)]
    pub volume_capacity: String,

    /// Node name for the new node; defaults to the VM name.
    #[arg(short = 'N', long = "node-name")]
    pub node_name: Option<String>,

    /// Comma separated list of roles/recipes to apply.
    #[arg(short = 'r', long = "run-list", value_delimiter = ',')]
    pub run_list: Vec<String>,

    /// SSH username.
    #[arg(short = 'x', long = "ssh-user", default_value = "root")]
    pub ssh_user: String,

    /// SSH password.
    #[arg(short = 'P', long = "ssh-password")]
    pub ssh_password: Option<String>,

    /// SSH identity file used for authentication.
    #[arg(short = 'i', long = "identity-file")]
    pub identity_file: Option<PathBuf>,

    /// Bootstrap a distro using a template.
    #[arg(short = 'd', long, default_value = "ubuntu10.04-gems")]
    pub distro: String,

    /// Full path of the bootstrap template to use.
    #[arg(long = "template-file")]
    pub template_file: Option<PathBuf>,

    /// Version of the config agent to install.
    #[arg(long = "bootstrap-version")]
    pub bootstrap_version: Option<String>,

    /// Environment for the new node.
    #[arg(short = 'E', long)]
    pub environment: Option<String>,

    /// Disable host key verification.
    #[arg(long = "no-host-key-verify")]
    pub no_host_key_verify: bool,

    /// Stop after starting the VM; skip readiness wait and bootstrap.
    #[arg(long = "skip-bootstrap")]
    pub skip_bootstrap: bool,

    /// Overall bound in seconds on one provisioning run.
    #[arg(long = "ssh-timeout")]
    pub ssh_timeout: Option<u64>,

    /// Batch file with multiple named jobs.
    #[arg(long)]
    pub batch: Option<PathBuf>,

    /// Run batch jobs concurrently.
    #[arg(long = "async")]
    pub concurrent: bool,

    /// Concurrency cap for --async batches.
    #[arg(long = "max-parallel", default_value_t = crate::batch::DEFAULT_MAX_PARALLEL)]
    pub max_parallel: usize,
}

impl CreateArgs {
    /// Build the normalized VM spec. Does not validate; the pipeline (or
    /// the batch job constructor) does that before anything runs.
    pub fn to_spec(&self) -> ForgeResult<VmSpec> {
        Ok(VmSpec {
            name: self.vm_name.clone().unwrap_or_default(),
            disk_source: self.vm_disk.clone(),
            volume_capacity: self.volume_capacity.clone(),
            memory_mb: self.vm_memory,
            max_memory_mb: self.vm_max_memory.unwrap_or(self.vm_memory),
            cpus: self.vm_cpus,
            arch: self.arch.clone(),
            os_type: self.os_type.clone(),
            pool: self.pool.clone(),
            network: self.network_interface.parse()?,
            autostart: self.autostart,
            iso_url: self.iso_url.clone(),
            iso_dir: self.iso_dir.clone(),
            dest_dir: self.dest_dir.clone(),
            new_disk: self.new_disk,
            ..Default::default()
        })
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            skip_bootstrap: self.skip_bootstrap,
            bootstrap: BootstrapOptions {
                run_list: self.run_list.clone(),
                ssh_user: self.ssh_user.clone(),
                ssh_password: self.ssh_password.clone(),
                identity_file: self.identity_file.clone(),
                node_name: self.node_name.clone(),
                distro: self.distro.clone(),
                template_file: self.template_file.clone(),
                bootstrap_version: self.bootstrap_version.clone(),
                environment: self.environment.clone(),
                skip_host_key_verify: self.no_host_key_verify,
            },
            ..Default::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub host: HostArgs,

    /// Names of the VMs to delete.
    #[arg(required = true)]
    pub names: Vec<String>,

    /// Delete without confirmation.
    #[arg(long = "force-delete")]
    pub force_delete: bool,

    /// Try to shut the machine down before deletion.
    #[arg(long = "shutdown-first")]
    pub shutdown_first: bool,

    /// Seconds to wait for shutdown before forcing deletion.
    #[arg(long = "shutdown-timeout", default_value_t = 60)]
    pub shutdown_timeout: u64,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub host: HostArgs,

    /// Emit the inventory as JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct StartArgs {
    #[command(flatten)]
    pub host: HostArgs,

    /// Names of the VMs to start.
    #[arg(required = true)]
    pub names: Vec<String>,

    /// Start without confirmation.
    #[arg(long = "force-start")]
    pub force_start: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_args_parse_from_batch_style_argv() {
        let args = CreateArgs::try_parse_from([
            "--vm-disk",
            "/tmp/a.qcow2",
            "--vm-name",
            "web1",
            "--vm-memory",
            "1024",
            "--network-interface",
            "bridge:br1",
            "--skip-bootstrap",
        ])
        .unwrap();
        assert_eq!(args.vm_name.as_deref(), Some("web1"));
        assert_eq!(args.vm_memory, 1024);
        assert!(args.skip_bootstrap);

        let spec = args.to_spec().unwrap();
        assert_eq!(spec.network.name, "br1");
        assert_eq!(spec.max_memory_mb, 1024);
    }

    #[test]
    fn unknown_flags_are_rejected() {
        assert!(CreateArgs::try_parse_from(["--does-not-exist", "x"]).is_err());
    }
}
