use std::path::{Path, PathBuf};

use crate::zip::ExtractOptions;

pub const DEFAULT_BASE_URI: &str = "http://localhost:3000";

/// Locations and limits the hub works with.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Directory holding one subdirectory per project.
    pub projects_root: PathBuf,
    /// Where removed projects and reports are moved to.
    pub quarantine_root: PathBuf,
    /// Public URI of the site, used for deep links.
    pub base_uri: String,
    pub extract: ExtractOptions,
}

impl HubConfig {
    /// Standard layout below an application root:
    /// `public/projects` for live data and `.lostandfound` for removals.
    pub fn from_app_root(app_root: &Path, base_uri: impl Into<String>) -> Self {
        Self {
            projects_root: app_root.join("public").join("projects"),
            quarantine_root: app_root.join(".lostandfound"),
            base_uri: base_uri.into().trim_end_matches('/').to_string(),
            extract: ExtractOptions::default(),
        }
    }
}
