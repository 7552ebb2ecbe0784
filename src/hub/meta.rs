//! Descriptor files describing projects and reports.
//!
//! Each project and report directory carries one JSON descriptor at
//! [`DESCRIPTOR_FILE`]. Descriptors are published atomically: the content
//! goes to a temporary sibling first and is renamed over the target, so a
//! reader sees either no descriptor or a complete one.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{HubError, Result};

pub const DESCRIPTOR_FILE: &str = ".meta.json";

/// Category of an uploaded report.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    #[default]
    Nexial,
    Jmeter,
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportKind::Nexial => f.write_str("nexial"),
            ReportKind::Jmeter => f.write_str("jmeter"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDescriptor {
    /// Display name.
    pub name: String,
    /// Icon file name inside the project directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Creation time, epoch milliseconds.
    pub created: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDescriptor {
    /// Report identifier, the directory name.
    pub name: String,
    #[serde(rename = "reportType")]
    pub kind: ReportKind,
    /// Creation time, epoch milliseconds.
    pub created: i64,
    /// Entry point relative to the report directory, `/` separated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_file: Option<String>,
}

pub fn descriptor_path(dir: &Path) -> PathBuf {
    dir.join(DESCRIPTOR_FILE)
}

/// Read and parse the descriptor inside `dir`.
pub async fn read_descriptor<T: DeserializeOwned>(dir: &Path) -> Result<T> {
    let path = descriptor_path(dir);
    let contents = match fs::read(&path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(HubError::NotFound {
                what: format!("descriptor of {}", dir.display()),
                path,
            });
        }
        Err(e) => return Err(HubError::io("read", path, e)),
    };

    serde_json::from_slice(&contents).map_err(|source| HubError::CorruptData { path, source })
}

/// Atomically publish `record` as the descriptor inside `dir`.
pub async fn write_descriptor<T: Serialize>(dir: &Path, record: &T) -> Result<()> {
    let path = descriptor_path(dir);
    let serialized =
        serde_json::to_vec_pretty(record).map_err(|e| HubError::io("serialize", &path, e.into()))?;

    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let temp_path = dir.join(format!(
        "{}.{}.{}.tmp",
        DESCRIPTOR_FILE,
        process::id(),
        nanos
    ));

    if let Err(e) = write_synced(&temp_path, &serialized).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(HubError::io("write", temp_path, e));
    }

    if let Err(e) = fs::rename(&temp_path, &path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(HubError::io("publish", path, e));
    }

    debug!("wrote descriptor {}", path.display());
    Ok(())
}

async fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(data).await?;
    file.sync_all().await
}
