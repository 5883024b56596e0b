//! Libvirt backend driven through the `virsh` CLI.
//!
//! Every operation spawns `virsh -c <uri> ...` and parses its plain-text
//! output. VM definitions are rendered as minimal domain XML and fed to
//! `virsh define`; the XML file is written locally since virsh reads its
//! argument from the local filesystem even for remote connections.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use super::{VirtualizationBackend, VmHandle, VmRecord, VmState};
use crate::config::HostConfig;
use crate::errors::{ForgeError, ForgeResult};
use crate::spec::VmSpec;

pub struct VirshBackend {
    uri: String,
}

impl VirshBackend {
    pub fn new(host: &HostConfig) -> Self {
        Self {
            uri: host.libvirt_uri(),
        }
    }

    async fn virsh(&self, args: &[&str]) -> ForgeResult<String> {
        let output = Command::new("virsh")
            .arg("-c")
            .arg(&self.uri)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ForgeError::Internal(format!("failed to spawn virsh: {e}")))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::debug!(args = ?args, %stderr, "virsh command failed");
            Err(ForgeError::Internal(format!(
                "virsh {} failed: {stderr}",
                args.first().copied().unwrap_or("")
            )))
        }
    }

    /// Create the backing volume in the spec's storage pool and return
    /// its path. Covers the empty-disk case; a bad pool surfaces as a
    /// creation failure here.
    async fn create_volume(&self, spec: &VmSpec) -> ForgeResult<PathBuf> {
        let args = volume_create_args(spec)?;
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.virsh(&args)
            .await
            .map_err(|e| ForgeError::Creation(e.to_string()))?;

        let volume = format!("{}.{}", spec.name, spec.disk_format);
        let path = self
            .virsh(&["vol-path", "--pool", &spec.pool, &volume])
            .await
            .map_err(|e| ForgeError::Creation(e.to_string()))?;
        Ok(PathBuf::from(path.trim()))
    }

    fn domain_xml(spec: &VmSpec, disk_path: &Path) -> String {
        let mut devices = format!(
            r#"    <disk type='file' device='disk'>
      <driver name='qemu' type='{format}'/>
      <source file='{disk}'/>
      <target dev='vda' bus='virtio'/>
    </disk>
    <interface type='{net_kind}'>
      <source {net_kind}='{net_name}'/>
      <model type='virtio'/>
    </interface>
"#,
            format = spec.disk_format,
            disk = disk_path.display(),
            net_kind = spec.network.kind,
            net_name = spec.network.name,
        );
        if let Some(iso) = spec.dest_iso_path() {
            devices.push_str(&format!(
                r#"    <disk type='file' device='cdrom'>
      <driver name='qemu' type='raw'/>
      <source file='{}'/>
      <target dev='hdc' bus='ide'/>
      <readonly/>
    </disk>
"#,
                iso.display()
            ));
        }
        devices.push_str(
            r#"    <console type='pty'>
      <target type='serial' port='0'/>
    </console>
    <graphics type='vnc' port='-1' autoport='yes'/>
"#,
        );

        format!(
            r#"<domain type='kvm'>
  <name>{name}</name>
  <memory unit='KiB'>{max_mem}</memory>
  <currentMemory unit='KiB'>{mem}</currentMemory>
  <vcpu>{cpus}</vcpu>
  <os>
    <type arch='{arch}'>{os_type}</type>
    <boot dev='hd'/>
  </os>
  <features>
    <acpi/>
    <apic/>
  </features>
  <devices>
{devices}  </devices>
</domain>
"#,
            name = spec.name,
            max_mem = u64::from(spec.max_memory_mb) * 1024,
            mem = u64::from(spec.memory_mb) * 1024,
            cpus = spec.cpus,
            arch = spec.arch,
            os_type = spec.os_type,
            devices = devices,
        )
    }
}

#[async_trait::async_trait]
impl VirtualizationBackend for VirshBackend {
    async fn create(&self, spec: &VmSpec) -> ForgeResult<VmHandle> {
        let disk_path = if spec.new_disk {
            self.create_volume(spec).await?
        } else {
            // The image was staged at its destination by the transfer
            // phase; refresh the pool so libvirt picks the volume up.
            self.virsh(&["pool-refresh", &spec.pool])
                .await
                .map_err(|e| ForgeError::Creation(e.to_string()))?;
            spec.dest_disk_path()
        };

        let xml = Self::domain_xml(spec, &disk_path);
        let path = std::env::temp_dir().join(format!("vmforge-{}.xml", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, &xml).await?;

        let result = self.virsh(&["define", &path.to_string_lossy()]).await;
        let _ = tokio::fs::remove_file(&path).await;
        result.map_err(|e| ForgeError::Creation(e.to_string()))?;

        Ok(VmHandle::new(&spec.name))
    }

    async fn start(&self, handle: &VmHandle) -> ForgeResult<()> {
        self.virsh(&["start", &handle.name])
            .await
            .map_err(|e| domain_error(&handle.name, e))?;
        Ok(())
    }

    async fn shutdown(&self, handle: &VmHandle) -> ForgeResult<()> {
        self.virsh(&["shutdown", &handle.name])
            .await
            .map_err(|e| domain_error(&handle.name, e))?;
        Ok(())
    }

    async fn destroy(&self, handle: &VmHandle, destroy_volumes: bool) -> ForgeResult<()> {
        // Best effort: the domain may already be off.
        let _ = self.virsh(&["destroy", &handle.name]).await;
        if destroy_volumes {
            self.virsh(&["undefine", &handle.name, "--remove-all-storage"])
                .await?;
        } else {
            self.virsh(&["undefine", &handle.name]).await?;
        }
        Ok(())
    }

    async fn list_all(&self) -> ForgeResult<Vec<VmRecord>> {
        let names = self.virsh(&["list", "--all", "--name"]).await?;
        let mut records = Vec::new();
        for name in names.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let info = self.virsh(&["dominfo", name]).await?;
            let xml = self.virsh(&["dumpxml", name]).await?;
            let state = self.state(&VmHandle::new(name)).await?;
            let mut record = parse_dominfo(name, state, &info);
            if let Some(arch) = parse_arch(&xml) {
                record.arch = arch;
            }
            records.push(record);
        }
        Ok(records)
    }

    async fn address(&self, handle: &VmHandle) -> ForgeResult<Option<IpAddr>> {
        // domifaddr fails while the domain has no lease yet; that is the
        // transient "not ready" condition, not a hard failure.
        let output = self
            .virsh(&["domifaddr", &handle.name])
            .await
            .map_err(|e| ForgeError::TransientBackend(e.to_string()))?;
        Ok(parse_domifaddr(&output))
    }

    async fn state(&self, handle: &VmHandle) -> ForgeResult<VmState> {
        let output = self
            .virsh(&["domstate", &handle.name])
            .await
            .map_err(|e| domain_error(&handle.name, e))?;
        if output.trim() == "running" {
            Ok(VmState::Running)
        } else {
            Ok(VmState::Stopped)
        }
    }

    async fn register_autostart(&self, name: &str) -> ForgeResult<()> {
        // virsh autostart on an already-registered domain is a no-op.
        self.virsh(&["autostart", name]).await?;
        Ok(())
    }
}

/// `vol-create-as` invocation derived from the spec: pool, volume name,
/// capacity, format, and the allocation (source file size unless given).
fn volume_create_args(spec: &VmSpec) -> ForgeResult<Vec<String>> {
    let mut args = vec![
        "vol-create-as".to_string(),
        spec.pool.clone(),
        format!("{}.{}", spec.name, spec.disk_format),
        spec.volume_capacity.clone(),
        "--format".to_string(),
        spec.disk_format.clone(),
    ];
    let allocation_mb = spec.allocation_mb()?;
    if allocation_mb > 0 {
        args.push("--allocation".to_string());
        args.push(format!("{allocation_mb}M"));
    }
    Ok(args)
}

/// Map a "no such domain" virsh failure to `NotFound`.
fn domain_error(name: &str, err: ForgeError) -> ForgeError {
    match err {
        ForgeError::Internal(msg)
            if msg.contains("failed to get domain") || msg.contains("Domain not found") =>
        {
            ForgeError::NotFound(name.to_string())
        }
        other => other,
    }
}

fn parse_arch(xml: &str) -> Option<String> {
    let start = xml.find("arch='")? + "arch='".len();
    let rest = &xml[start..];
    let end = rest.find('\'')?;
    Some(rest[..end].to_string())
}

fn parse_domifaddr(output: &str) -> Option<IpAddr> {
    for line in output.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() == 4 && fields[2].starts_with("ipv") {
            let addr = fields[3].split('/').next()?;
            if let Ok(ip) = addr.parse() {
                return Some(ip);
            }
        }
    }
    None
}

fn parse_dominfo(name: &str, state: VmState, info: &str) -> VmRecord {
    let field = |key: &str| -> Option<String> {
        info.lines()
            .find(|l| l.starts_with(key))
            .and_then(|l| l.split_once(':'))
            .map(|(_, v)| v.trim().to_string())
    };

    let max_memory_mb = field("Max memory")
        .and_then(|v| v.split_whitespace().next().and_then(|n| n.parse::<u64>().ok()))
        .map(|kib| kib / 1024)
        .unwrap_or(0);
    let cpus = field("CPU(s)")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let os_type = field("OS Type").unwrap_or_else(|| "-".to_string());

    VmRecord {
        name: name.to_string(),
        state,
        max_memory_mb,
        cpus,
        os_type,
        arch: "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domifaddr_parses_lease_table() {
        let output = "\
 Name       MAC address          Protocol     Address
-------------------------------------------------------------------------------
 vnet0      52:54:00:aa:bb:cc    ipv4         10.0.0.5/24
";
        assert_eq!(
            parse_domifaddr(output),
            Some("10.0.0.5".parse::<IpAddr>().unwrap())
        );
        assert_eq!(parse_domifaddr(""), None);
    }

    #[test]
    fn dominfo_parses_memory_and_cpus() {
        let info = "\
Id:             7
Name:           web1
OS Type:        hvm
State:          running
CPU(s):         2
Max memory:     1048576 KiB
Used memory:    524288 KiB
";
        let record = parse_dominfo("web1", VmState::Running, info);
        assert_eq!(record.max_memory_mb, 1024);
        assert_eq!(record.cpus, 2);
        assert_eq!(record.os_type, "hvm");
    }

    #[test]
    fn domain_xml_contains_normalized_fields() {
        let spec = VmSpec {
            name: "web1".into(),
            memory_mb: 512,
            max_memory_mb: 1024,
            cpus: 2,
            ..Default::default()
        };
        let xml = VirshBackend::domain_xml(&spec, &spec.dest_disk_path());
        assert!(xml.contains("<name>web1</name>"));
        assert!(xml.contains("<currentMemory unit='KiB'>524288</currentMemory>"));
        assert!(xml.contains("<memory unit='KiB'>1048576</memory>"));
        assert!(xml.contains("<source bridge='br0'/>"));
        assert!(xml.contains("/var/lib/libvirt/images/web1.qcow2"));
    }

    #[test]
    fn domain_xml_references_the_volume_it_is_given() {
        let spec = VmSpec {
            name: "web1".into(),
            pool: "ssd-pool".into(),
            ..Default::default()
        };
        let xml = VirshBackend::domain_xml(&spec, Path::new("/pools/ssd-pool/web1.qcow2"));
        assert!(xml.contains("<source file='/pools/ssd-pool/web1.qcow2'/>"));
    }

    #[test]
    fn volume_creation_carries_pool_capacity_and_allocation() {
        let spec = VmSpec {
            name: "web1".into(),
            pool: "ssd-pool".into(),
            volume_capacity: "40G".into(),
            volume_allocation_mb: Some(2048),
            new_disk: true,
            ..Default::default()
        };
        let args = volume_create_args(&spec).unwrap();
        assert_eq!(
            args,
            vec![
                "vol-create-as",
                "ssd-pool",
                "web1.qcow2",
                "40G",
                "--format",
                "qcow2",
                "--allocation",
                "2048M",
            ]
        );

        // no source file and no explicit allocation: sparse volume
        let spec = VmSpec {
            volume_allocation_mb: None,
            ..spec
        };
        let args = volume_create_args(&spec).unwrap();
        assert!(!args.iter().any(|a| a == "--allocation"));
    }

    #[test]
    fn dumpxml_arch_is_extracted() {
        let xml = "<domain type='kvm'>\n  <os>\n    <type arch='aarch64' machine='virt'>hvm</type>\n  </os>\n</domain>";
        assert_eq!(parse_arch(xml).as_deref(), Some("aarch64"));
        assert_eq!(parse_arch("<domain/>"), None);
    }

    #[test]
    fn missing_domain_maps_to_not_found() {
        let err = domain_error(
            "web1",
            ForgeError::Internal("virsh domstate failed: error: failed to get domain 'web1'".into()),
        );
        assert!(matches!(err, ForgeError::NotFound(name) if name == "web1"));

        let err = domain_error("web1", ForgeError::Internal("connection reset".into()));
        assert!(matches!(err, ForgeError::Internal(_)));
    }
}
