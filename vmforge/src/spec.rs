//! Normalized VM description and its validation rules.
//!
//! A `VmSpec` is built once (from CLI flags or a batch entry), validated
//! before any backend call, and then owned exclusively by the pipeline that
//! provisions it.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{ForgeError, ForgeResult};

pub const DEFAULT_DEST_DIR: &str = "/var/lib/libvirt/images";
pub const DEFAULT_VOLUME_CAPACITY: &str = "10G";

/// Network interface description, parsed from `type:name` (e.g. `bridge:br0`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub kind: String,
    pub name: String,
}

impl Default for NetworkInterface {
    fn default() -> Self {
        Self {
            kind: "bridge".to_string(),
            name: "br0".to_string(),
        }
    }
}

impl FromStr for NetworkInterface {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((kind, name)) if !kind.is_empty() && !name.is_empty() => Ok(Self {
                kind: kind.to_string(),
                name: name.to_string(),
            }),
            _ => Err(ForgeError::Validation(format!(
                "invalid network interface '{s}', expected type:name (e.g. bridge:br0)"
            ))),
        }
    }
}

impl std::fmt::Display for NetworkInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

/// Normalized description of the VM to create.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmSpec {
    /// VM name, unique within a host.
    pub name: String,
    /// Source disk image on the local machine. Required unless `new_disk`.
    pub disk_source: Option<PathBuf>,
    /// Disk image format.
    pub disk_format: String,
    /// Allocated size in MiB. Defaults to the source file size.
    pub volume_allocation_mb: Option<u64>,
    /// Maximum volume capacity, backend syntax (e.g. `10G`).
    pub volume_capacity: String,
    pub memory_mb: u32,
    pub max_memory_mb: u32,
    pub cpus: u32,
    pub arch: String,
    pub os_type: String,
    /// Storage pool for the VM volumes.
    pub pool: String,
    pub network: NetworkInterface,
    /// Register the VM to start on host boot.
    pub autostart: bool,
    /// Optional ISO to fetch onto the host before creation.
    pub iso_url: Option<String>,
    /// Destination directory for the fetched ISO.
    pub iso_dir: Option<PathBuf>,
    /// Directory on the host where the disk image lands.
    pub dest_dir: PathBuf,
    /// Create an empty disk instead of importing one.
    pub new_disk: bool,
}

impl Default for VmSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            disk_source: None,
            disk_format: "qcow2".to_string(),
            volume_allocation_mb: None,
            volume_capacity: DEFAULT_VOLUME_CAPACITY.to_string(),
            memory_mb: 512,
            max_memory_mb: 512,
            cpus: 1,
            arch: "x86_64".to_string(),
            os_type: "hvm".to_string(),
            pool: "default".to_string(),
            network: NetworkInterface::default(),
            autostart: false,
            iso_url: None,
            iso_dir: None,
            dest_dir: PathBuf::from(DEFAULT_DEST_DIR),
            new_disk: false,
        }
    }
}

impl VmSpec {
    /// Check the spec invariants. Must pass before any backend call.
    pub fn validate(&self) -> ForgeResult<()> {
        if self.name.trim().is_empty() {
            return Err(ForgeError::Validation(
                "VM name must not be empty (--vm-name)".into(),
            ));
        }
        if !self.new_disk {
            let disk = self.disk_source.as_deref().ok_or_else(|| {
                ForgeError::Validation("no disk image given (--vm-disk)".into())
            })?;
            if !disk_exists(disk) {
                return Err(ForgeError::Validation(format!(
                    "disk image does not exist: {} (--vm-disk)",
                    disk.display()
                )));
            }
        }
        if self.memory_mb > self.max_memory_mb {
            return Err(ForgeError::Validation(format!(
                "memory ({} MB) exceeds max memory ({} MB)",
                self.memory_mb, self.max_memory_mb
            )));
        }
        Ok(())
    }

    /// Allocated volume size in MiB: explicit value, or the source file size.
    pub fn allocation_mb(&self) -> ForgeResult<u64> {
        if let Some(mb) = self.volume_allocation_mb {
            return Ok(mb);
        }
        match &self.disk_source {
            Some(disk) => {
                let len = std::fs::metadata(disk)?.len();
                Ok(len / 1024 / 1024)
            }
            None => Ok(0),
        }
    }

    /// Path on the host where the disk image is placed.
    pub fn dest_disk_path(&self) -> PathBuf {
        self.dest_dir
            .join(format!("{}.{}", self.name, self.disk_format))
    }

    /// Path on the host where the ISO lands, if an ISO was requested.
    pub fn dest_iso_path(&self) -> Option<PathBuf> {
        let url = self.iso_url.as_deref()?;
        let file = url.rsplit('/').next().unwrap_or("image.iso");
        let dir = self
            .iso_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DEST_DIR));
        Some(dir.join(file))
    }
}

/// True when the path exists and is a regular file.
pub fn disk_exists(path: &Path) -> bool {
    path.is_file()
}
