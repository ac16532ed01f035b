//! Append-only, versioned log of prompt configurations.
//!
//! Each line of the log is one JSON [`PromptSnapshot`]. The last line is the current
//! configuration. Updates and restores append; nothing is rewritten.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::{PromptConfig, PromptUpdate};

/// Errors raised while reading or appending to the prompt log.
#[derive(Debug, Error)]
pub enum PromptStoreError {
    /// Log file could not be read or written.
    #[error("Prompt log I/O failed for {path}: {source}")]
    Io {
        /// Log path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// A log line is not a valid snapshot.
    #[error("Prompt log line {line} is corrupt: {message}")]
    Corrupt {
        /// One-based line number.
        line: usize,
        /// Decoder message.
        message: String,
    },
    /// Configuration is missing required fields.
    #[error("Prompt configuration is missing required fields: {0}")]
    InvalidPrompt(String),
    /// No snapshot carries the requested version.
    #[error("Prompt version {0} not found in history")]
    UnknownVersion(String),
    /// Snapshot could not be serialized.
    #[error("Failed to serialize prompt snapshot: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One entry of the prompt log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptSnapshot {
    /// RFC 3339 time the snapshot was appended.
    pub recorded_at: String,
    /// Version this snapshot was restored from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restored_from: Option<String>,
    /// Configuration captured by the snapshot.
    pub config: PromptConfig,
}

/// History listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptHistoryEntry {
    /// Snapshot version.
    pub version: String,
    /// RFC 3339 time the snapshot was appended.
    pub recorded_at: String,
    /// Version this snapshot was restored from, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restored_from: Option<String>,
}

/// Summary of the current prompt configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptStats {
    /// Current version.
    pub current_version: String,
    /// Timestamp of the current version.
    pub last_modified: String,
    /// Number of snapshots preceding the current one.
    pub history_count: usize,
    /// Number of contract-type checklists.
    pub contract_types_supported: usize,
}

/// Versioned prompt configuration backed by a JSON-lines file.
pub struct PromptStore {
    path: Option<PathBuf>,
    snapshots: RwLock<Vec<PromptSnapshot>>,
}

impl PromptStore {
    /// Open the log at `path`, seeding it with the default prompt when missing or empty.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PromptStoreError> {
        let path = path.as_ref().to_path_buf();
        let mut snapshots = read_log(&path)?;
        let store_path = Some(path);

        if snapshots.is_empty() {
            let seed = PromptSnapshot {
                recorded_at: current_timestamp_rfc3339(),
                restored_from: None,
                config: PromptConfig::default(),
            };
            append_line(store_path.as_deref(), &seed)?;
            tracing::info!(version = %seed.config.version, "Seeded prompt log with default prompt");
            snapshots.push(seed);
        }

        Ok(Self {
            path: store_path,
            snapshots: RwLock::new(snapshots),
        })
    }

    /// Keep the log in memory only.
    pub fn in_memory(config: PromptConfig) -> Self {
        Self {
            path: None,
            snapshots: RwLock::new(vec![PromptSnapshot {
                recorded_at: current_timestamp_rfc3339(),
                restored_from: None,
                config,
            }]),
        }
    }

    /// Current configuration.
    pub fn current(&self) -> PromptConfig {
        self.read()
            .last()
            .map(|snapshot| snapshot.config.clone())
            .unwrap_or_default()
    }

    /// Apply a partial edit, bump the patch version, and append the result.
    pub fn update(&self, update: PromptUpdate) -> Result<PromptSnapshot, PromptStoreError> {
        let mut snapshots = self.write();
        let current = snapshots
            .last()
            .map(|snapshot| snapshot.config.clone())
            .unwrap_or_default();

        let mut config = update.apply_to(&current);
        validate(&config)?;
        let recorded_at = current_timestamp_rfc3339();
        config.version = increment_version(&current.version);
        config.last_modified = recorded_at.clone();

        let snapshot = PromptSnapshot {
            recorded_at,
            restored_from: None,
            config,
        };
        append_line(self.path.as_deref(), &snapshot)?;
        tracing::info!(
            from = %current.version,
            to = %snapshot.config.version,
            "Prompt configuration updated"
        );
        snapshots.push(snapshot.clone());
        Ok(snapshot)
    }

    /// Append a new snapshot copying the configuration recorded under `version`.
    pub fn restore(&self, version: &str) -> Result<PromptSnapshot, PromptStoreError> {
        let mut snapshots = self.write();
        let historical = snapshots
            .iter()
            .rev()
            .find(|snapshot| snapshot.config.version == version)
            .map(|snapshot| snapshot.config.clone())
            .ok_or_else(|| PromptStoreError::UnknownVersion(version.to_string()))?;
        let current_version = snapshots
            .last()
            .map(|snapshot| snapshot.config.version.clone())
            .unwrap_or_else(|| historical.version.clone());

        let recorded_at = current_timestamp_rfc3339();
        let config = PromptConfig {
            version: increment_version(&current_version),
            last_modified: recorded_at.clone(),
            ..historical
        };
        let snapshot = PromptSnapshot {
            recorded_at,
            restored_from: Some(version.to_string()),
            config,
        };
        append_line(self.path.as_deref(), &snapshot)?;
        tracing::info!(
            restored_from = version,
            version = %snapshot.config.version,
            "Prompt configuration restored"
        );
        snapshots.push(snapshot.clone());
        Ok(snapshot)
    }

    /// All snapshots, oldest first.
    pub fn history(&self) -> Vec<PromptHistoryEntry> {
        self.read()
            .iter()
            .map(|snapshot| PromptHistoryEntry {
                version: snapshot.config.version.clone(),
                recorded_at: snapshot.recorded_at.clone(),
                restored_from: snapshot.restored_from.clone(),
            })
            .collect()
    }

    /// Summary of the current configuration.
    pub fn stats(&self) -> PromptStats {
        let snapshots = self.read();
        let current = snapshots
            .last()
            .map(|snapshot| snapshot.config.clone())
            .unwrap_or_default();
        PromptStats {
            current_version: current.version,
            last_modified: current.last_modified,
            history_count: snapshots.len().saturating_sub(1),
            contract_types_supported: current.contract_types.len(),
        }
    }

    /// Check that a configuration carries every required field.
    pub fn validate(config: &PromptConfig) -> Result<(), PromptStoreError> {
        validate(config)
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<PromptSnapshot>> {
        self.snapshots
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<PromptSnapshot>> {
        self.snapshots
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn validate(config: &PromptConfig) -> Result<(), PromptStoreError> {
    let missing = config.missing_fields();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PromptStoreError::InvalidPrompt(missing.join(", ")))
    }
}

fn read_log(path: &Path) -> Result<Vec<PromptSnapshot>, PromptStoreError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(PromptStoreError::Io {
                path: path.display().to_string(),
                source,
            });
        }
    };

    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).map_err(|error| PromptStoreError::Corrupt {
                line: index + 1,
                message: error.to_string(),
            })
        })
        .collect()
}

fn append_line(path: Option<&Path>, snapshot: &PromptSnapshot) -> Result<(), PromptStoreError> {
    let Some(path) = path else {
        return Ok(());
    };
    let io_error = |source| PromptStoreError::Io {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(io_error)?;
    }

    let mut line = serde_json::to_string(snapshot)?;
    line.push('\n');
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| file.write_all(line.as_bytes()))
        .map_err(io_error)
}

/// Bump the patch component of a `major.minor.patch` version.
fn increment_version(version: &str) -> String {
    let mut parts: Vec<String> = version.split('.').map(str::to_string).collect();
    match parts.last().and_then(|patch| patch.parse::<u64>().ok()) {
        Some(patch) if parts.len() >= 2 => {
            if let Some(last) = parts.last_mut() {
                *last = (patch + 1).to_string();
            }
            parts.join(".")
        }
        _ => format!("{version}.1"),
    }
}

fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
