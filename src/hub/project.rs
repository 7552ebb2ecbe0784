use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

use crate::error::{HubError, Result};
use crate::text;

use super::meta::{ProjectDescriptor, read_descriptor, write_descriptor};
use super::paths::{Expect, validate_identifier};
use super::quarantine::quarantine;
use super::{ReportHub, is_listing_gap, now_millis, subdirectories};

/// Image types accepted as project icons.
pub const ICON_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

/// Icon image supplied with a new project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectIcon {
    /// Lowercase file extension, one of [`ICON_EXTENSIONS`].
    pub extension: String,
    pub bytes: Vec<u8>,
}

impl ProjectIcon {
    /// Build an icon from an uploaded file name and its content.
    pub fn from_file_name(file_name: &str, bytes: Vec<u8>) -> Result<Self> {
        match text::extension_of(file_name) {
            Some(extension) if ICON_EXTENSIONS.contains(&extension.as_str()) => {
                Ok(Self { extension, bytes })
            }
            _ => Err(HubError::validation(
                file_name,
                format!("icon must be one of {}", ICON_EXTENSIONS.join(", ")),
            )),
        }
    }

    fn file_name(&self) -> String {
        format!("project.{}", self.extension)
    }
}

/// Request to create a project.
#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub identifier: String,
    /// Defaults to the identifier.
    pub display_name: Option<String>,
    pub icon: Option<ProjectIcon>,
}

/// A project as shown in listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectSummary {
    pub id: String,
    pub name: String,
    pub icon_uri: Option<String>,
    pub created: i64,
}

impl ProjectSummary {
    fn from_descriptor(id: &str, descriptor: ProjectDescriptor) -> Self {
        Self {
            id: id.to_string(),
            name: descriptor.name,
            icon_uri: descriptor
                .icon
                .map(|icon| format!("/projects/{}/{}", id, icon)),
            created: descriptor.created,
        }
    }
}

impl ReportHub {
    /// Create a project directory with its descriptor and optional icon.
    ///
    /// Returns the trimmed identifier.
    pub async fn create_project(&self, request: NewProject) -> Result<String> {
        let identifier = validate_identifier(&request.identifier)?;
        if let Some(icon) = &request.icon {
            if !ICON_EXTENSIONS.contains(&icon.extension.as_str()) {
                return Err(HubError::validation(
                    &identifier,
                    format!("unsupported icon type '{}'", icon.extension),
                ));
            }
        }

        let dir = self.resolver.project_dir(&identifier, Expect::Absent).await?;
        let root = self.resolver.projects_root();
        fs::create_dir_all(root)
            .await
            .map_err(|e| HubError::io("create", root, e))?;
        match fs::create_dir(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(HubError::Conflict { path: dir });
            }
            Err(e) => return Err(HubError::io("create", dir, e)),
        }

        let display_name = request
            .display_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| identifier.clone());

        if let Err(e) = populate_project(&dir, display_name, request.icon).await {
            // a directory without descriptor would block the identifier
            let _ = fs::remove_dir_all(&dir).await;
            return Err(e);
        }

        info!("created project [{}]", identifier);
        Ok(identifier)
    }

    /// Summary of a single project.
    pub async fn project(&self, identifier: &str) -> Result<ProjectSummary> {
        let dir = self.resolver.project_dir(identifier, Expect::Present).await?;
        let descriptor: ProjectDescriptor = read_descriptor(&dir).await?;
        Ok(ProjectSummary::from_descriptor(identifier.trim(), descriptor))
    }

    /// All projects with a readable descriptor, by directory name.
    pub async fn list_projects(&self) -> Result<Vec<ProjectSummary>> {
        let root = self.resolver.projects_root();
        let mut projects = Vec::new();
        for id in subdirectories(root).await? {
            match read_descriptor::<ProjectDescriptor>(&root.join(&id)).await {
                Ok(descriptor) => projects.push(ProjectSummary::from_descriptor(&id, descriptor)),
                Err(e) if is_listing_gap(&e) => warn!("skipping project [{}]: {}", id, e),
                Err(e) => return Err(e),
            }
        }
        Ok(projects)
    }

    /// Move a project, reports included, into quarantine.
    pub async fn remove_project(&self, identifier: &str) -> Result<PathBuf> {
        let dir = self.resolver.project_dir(identifier, Expect::Present).await?;
        let moved = quarantine(&dir, self.resolver.quarantine_root(), identifier.trim()).await?;
        info!("removed project [{}]", identifier.trim());
        Ok(moved)
    }
}

async fn populate_project(dir: &Path, name: String, icon: Option<ProjectIcon>) -> Result<()> {
    let icon_file = match icon {
        Some(icon) => {
            let file_name = icon.file_name();
            let path = dir.join(&file_name);
            fs::write(&path, &icon.bytes)
                .await
                .map_err(|e| HubError::io("write", path, e))?;
            Some(file_name)
        }
        None => None,
    };

    let descriptor = ProjectDescriptor {
        name,
        icon: icon_file,
        created: now_millis(),
    };
    write_descriptor(dir, &descriptor).await
}
