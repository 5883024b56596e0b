//! VM inventory listing.

use crate::backend::{VirtualizationBackend, VmRecord};
use crate::errors::{ForgeError, ForgeResult};
use crate::logging::JobLogger;

/// Print the host's VM inventory as an aligned table.
pub async fn list_vms(
    backend: &dyn VirtualizationBackend,
    logger: &JobLogger,
) -> ForgeResult<Vec<VmRecord>> {
    let records = inventory(backend).await?;
    logger.info(&render_table(&records));
    Ok(records)
}

/// Print the host's VM inventory as pretty-printed JSON.
pub async fn list_vms_json(
    backend: &dyn VirtualizationBackend,
    logger: &JobLogger,
) -> ForgeResult<Vec<VmRecord>> {
    let records = inventory(backend).await?;
    let rendered =
        serde_json::to_string_pretty(&records).map_err(|e| ForgeError::Internal(e.to_string()))?;
    logger.info(&rendered);
    Ok(records)
}

async fn inventory(backend: &dyn VirtualizationBackend) -> ForgeResult<Vec<VmRecord>> {
    let mut records = backend.list_all().await?;
    records.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(records)
}

/// Render records into a header plus one row per VM, columns padded to
/// their widest cell.
pub fn render_table(records: &[VmRecord]) -> String {
    let header = ["NAME", "STATE", "MAX_MEM", "CPUS", "OS_TYPE", "ARCH"];
    let rows: Vec<[String; 6]> = records
        .iter()
        .map(|r| {
            [
                r.name.clone(),
                r.state.to_string(),
                format!("{}MB", r.max_memory_mb),
                r.cpus.to_string(),
                r.os_type.clone(),
                r.arch.clone(),
            ]
        })
        .collect();

    let mut widths: [usize; 6] = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    render_row(&mut out, &header.map(str::to_string), &widths);
    for row in &rows {
        render_row(&mut out, row, &widths);
    }
    out
}

fn render_row(out: &mut String, cells: &[String; 6], widths: &[usize; 6]) {
    let mut line = String::new();
    for (cell, width) in cells.iter().zip(widths.iter()) {
        line.push_str(&format!("{cell:<width$}  "));
    }
    out.push_str(line.trim_end());
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::IpAddr;

    use async_trait::async_trait;

    use crate::backend::{VmHandle, VmState};
    use crate::errors::ForgeError;
    use crate::spec::VmSpec;

    struct FakeBackend {
        records: Vec<VmRecord>,
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

    fn record(name: &str, state: VmState, mem: u64) -> VmRecord {
        VmRecord {
            name: name.to_string(),
            state,
            max_memory_mb: mem,
            cpus: 2,
            os_type: "hvm".to_string(),
            arch: "x86_64".to_string(),
        }
    }

    #[test]
    fn table_is_aligned_to_the_widest_cell() {
        let table = render_table(&[
            record("a-very-long-vm-name", VmState::Running, 4096),
            record("b", VmState::Stopped, 512),
        ]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("NAME"));
        // state column starts where the longest name ends
        let state_col = lines[1].find("running").unwrap();
        assert_eq!(lines[2].find("stopped").unwrap(), state_col);
        assert!(lines[1].contains("4096MB"));
    }

    #[test]
    fn empty_inventory_still_prints_the_header() {
        let table = render_table(&[]);
        assert_eq!(table.lines().count(), 1);
        assert!(table.starts_with("NAME"));
    }

    #[tokio::test]
    async fn json_listing_sorts_and_serializes_every_field() {
        let backend = FakeBackend {
            records: vec![
                record("web2", VmState::Running, 1024),
                record("web1", VmState::Stopped, 512),
            ],
        };
        let logger = JobLogger::stdio();

        let records = list_vms_json(&backend, &logger).await.unwrap();
        assert_eq!(records[0].name, "web1");
        assert_eq!(records[1].name, "web2");

        let rendered = serde_json::to_string_pretty(&records).unwrap();
        assert!(rendered.contains("\"name\": \"web1\""));
        assert!(rendered.contains("\"state\": \"Stopped\""));
        assert!(rendered.contains("\"max_memory_mb\": 1024"));
        assert!(rendered.contains("\"arch\": \"x86_64\""));
    }
}
