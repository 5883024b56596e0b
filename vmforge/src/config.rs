//! Hypervisor host connection configuration.
//!
//! One `HostConfig` is built from the CLI option group and shared by every
//! command that talks to the host (composition, not a mixin): the backend,
//! the transfer client and the bootstrapper all hold a reference to it.

use serde::{Deserialize, Serialize};

/// Connection details for the KVM/libvirt host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Hypervisor host address.
    pub host: String,
    /// Remote username used for both libvirt and file transfer.
    pub username: String,
    pub password: Option<String>,
    /// Libvirt connection protocol (ssh or tls).
    pub protocol: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            username: "root".to_string(),
            password: None,
            protocol: "ssh".to_string(),
        }
    }
}

impl HostConfig {
    /// Libvirt connection URI, e.g. `qemu+ssh://root@10.0.0.1/system`.
    pub fn libvirt_uri(&self) -> String {
        format!(
            "qemu+{}://{}@{}/system",
            self.protocol, self.username, self.host
        )
    }

    /// Whether the hypervisor is the local machine.
    pub fn is_local(&self) -> bool {
        matches!(self.host.as_str(), "127.0.0.1" | "localhost" | "::1")
    }

    /// `user@host` form used by scp/ssh invocations.
    pub fn ssh_target(&self) -> String {
        format!("{}@{}", self.username, self.host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn libvirt_uri_defaults() {
        let config = HostConfig::default();
        assert_eq!(config.libvirt_uri(), "qemu+ssh://root@127.0.0.1/system");
        assert!(config.is_local());
    }

    #[test]
    fn remote_host_is_not_local() {
        let config = HostConfig {
            host: "kvm1.example.net".into(),
            ..Default::default()
        };
        assert!(!config.is_local());
        assert_eq!(config.ssh_target(), "root@kvm1.example.net");
    }
}
