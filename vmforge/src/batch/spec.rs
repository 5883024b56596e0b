//! Batch file loading.
//!
//! The file is a YAML mapping of job name to create options:
//!
//! ```yaml
//! web1:
//!   vm-disk: /images/base.qcow2
//!   vm-memory: 1024
//!   autostart: true
//! db1:
//!   vm-disk: /images/base.qcow2
//!   extra-args: --vm-cpus 4 --skip-bootstrap
//! ```
//!
//! Each option key becomes a `--key` flag. Scalar values follow as the
//! flag's argument; `true` yields a bare switch and `false` omits the flag
//! entirely. The reserved `extra-args` key is whitespace-split and appended
//! after the encoded flags, so it can carry anything the create command
//! accepts. Entries keep file order.

use std::path::Path;

use serde_yaml::{Mapping, Value};

use crate::errors::{ForgeError, ForgeResult};

/// One named job: the argv its create options encode to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    pub name: String,
    pub argv: Vec<String>,
}

/// A parsed batch file, entries in file order.
#[derive(Debug, Clone, Default)]
pub struct BatchSpec {
    pub entries: Vec<BatchEntry>,
}

impl BatchSpec {
    pub fn load(path: &Path) -> ForgeResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ForgeError::BatchSpec {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(&text).map_err(|reason| ForgeError::BatchSpec {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Parse the YAML document. Errors are plain strings; `load` attaches
    /// the file path.
    fn parse(text: &str) -> Result<Self, String> {
        let doc: Value = serde_yaml::from_str(text).map_err(|e| e.to_string())?;
        let jobs = match doc {
            Value::Mapping(m) => m,
            Value::Null => Mapping::new(),
            other => {
                return Err(format!(
                    "expected a mapping of job name to options, got {}",
                    yaml_kind(&other)
                ));
            }
        };

        let mut entries = Vec::with_capacity(jobs.len());
        for (key, value) in jobs {
            let name = match key {
                Value::String(s) => s,
                other => return Err(format!("job name must be a string, got {}", yaml_kind(&other))),
            };
            let options = match value {
                Value::Mapping(m) => m,
                Value::Null => Mapping::new(),
                other => {
                    return Err(format!(
                        "job '{name}': expected an options mapping, got {}",
                        yaml_kind(&other)
                    ));
                }
            };
            let argv = encode_argv(&name, &options)?;
            entries.push(BatchEntry { name, argv });
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn encode_argv(job: &str, options: &Mapping) -> Result<Vec<String>, String> {
    let mut argv = Vec::new();
    let mut extra = Vec::new();
    for (key, value) in options {
        let key = match key {
            Value::String(s) => s.as_str(),
            other => {
                return Err(format!(
                    "job '{job}': option key must be a string, got {}",
                    yaml_kind(other)
                ));
            }
        };
        if key == "extra-args" {
            let raw = scalar(value).ok_or_else(|| {
                format!("job '{job}': extra-args must be a scalar")
            })?;
            extra.extend(raw.split_whitespace().map(str::to_string));
            continue;
        }
        match value {
            Value::Bool(true) => argv.push(format!("--{key}")),
            Value::Bool(false) => {}
            other => {
                let rendered = scalar(other).ok_or_else(|| {
                    format!("job '{job}': option '{key}' must be a scalar")
                })?;
                argv.push(format!("--{key}"));
                argv.push(rendered);
            }
        }
    }
    argv.extend(extra);
    Ok(argv)
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn yaml_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_keep_file_order_and_encode_flags() {
        let spec = BatchSpec::parse(
            "web1:\n  vm-disk: /images/base.qcow2\n  vm-memory: 1024\n  autostart: true\ndb1:\n  vm-disk: /images/base.qcow2\n  new-disk: false\n",
        )
        .unwrap();
        assert_eq!(spec.len(), 2);
        assert_eq!(spec.entries[0].name, "web1");
        assert_eq!(
            spec.entries[0].argv,
            vec![
                "--vm-disk",
                "/images/base.qcow2",
                "--vm-memory",
                "1024",
                "--autostart",
            ]
        );
        // false booleans are dropped, not encoded
        assert_eq!(
            spec.entries[1].argv,
            vec!["--vm-disk", "/images/base.qcow2"]
        );
    }

    #[test]
    fn extra_args_are_appended_after_encoded_flags() {
        let spec = BatchSpec::parse(
            "web1:\n  extra-args: --vm-cpus 4 --skip-bootstrap\n  vm-memory: 512\n",
        )
        .unwrap();
        assert_eq!(
            spec.entries[0].argv,
            vec!["--vm-memory", "512", "--vm-cpus", "4", "--skip-bootstrap"]
        );
    }

    #[test]
    fn non_mapping_documents_are_rejected() {
        assert!(BatchSpec::parse("- a\n- b\n").is_err());
        assert!(BatchSpec::parse("web1: just-a-string\n").is_err());
    }

    #[test]
    fn load_reports_the_file_path() {
        let err = BatchSpec::load(Path::new("/nonexistent/batch.yaml")).unwrap_err();
        assert!(matches!(err, ForgeError::BatchSpec { .. }));
        assert!(err.to_string().contains("/nonexistent/batch.yaml"));
    }
}
