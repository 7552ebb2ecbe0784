//! Project and report lifecycle.
//!
//! [`ReportHub`] is the entry point for a request layer: it creates,
//! lists and removes projects, and ingests, lists and removes reports.
//! Layout below the projects root:
//!
//! ```text
//! <projects>/<project>/.meta.json            project descriptor
//! <projects>/<project>/<report>/.meta.json   report descriptor
//! <quarantine>/<project>.<millis>/           removed project
//! <quarantine>/<project>/<report>.<millis>/  removed report
//! ```
//!
//! A directory without a descriptor is treated as incomplete and left out
//! of listings.

mod entry_point;
mod meta;
mod paths;
mod project;
mod quarantine;
mod report;

pub use entry_point::{ENTRY_POINT_NAME, detect_entry_point, relative_entry};
pub use meta::{
    DESCRIPTOR_FILE, ProjectDescriptor, ReportDescriptor, ReportKind, read_descriptor,
    write_descriptor,
};
pub use paths::{Expect, PathResolver, RESERVED_CHARS, validate_identifier};
pub use project::{ICON_EXTENSIONS, NewProject, ProjectIcon, ProjectSummary};
pub use quarantine::quarantine;
pub use report::{IngestOutcome, IngestRequest, IngestStage, ReportSummary};

use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;

use crate::config::HubConfig;
use crate::error::{HubError, Result};

/// Lifecycle manager for projects and reports.
#[derive(Debug, Clone)]
pub struct ReportHub {
    config: HubConfig,
    resolver: PathResolver,
}

impl ReportHub {
    pub fn new(config: HubConfig) -> Self {
        let resolver = PathResolver::new(config.projects_root.clone(), config.quarantine_root.clone());
        Self { config, resolver }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Names of the immediate subdirectories of `dir`, sorted.
///
/// A missing `dir` yields an empty list.
pub(crate) async fn subdirectories(dir: &Path) -> Result<Vec<String>> {
    let mut read_dir = match fs::read_dir(dir).await {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(HubError::io("list", dir, e)),
    };

    let mut names = Vec::new();
    while let Some(entry) = read_dir
        .next_entry()
        .await
        .map_err(|e| HubError::io("list", dir, e))?
    {
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| HubError::io("inspect", entry.path(), e))?;
        if file_type.is_dir() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// Whether a descriptor read failure should just hide the entry.
pub(crate) fn is_listing_gap(err: &HubError) -> bool {
    matches!(err, HubError::NotFound { .. } | HubError::CorruptData { .. })
}
