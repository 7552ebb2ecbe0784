use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{info, warn};

use crate::error::{ArchiveError, HubError, Result};
use crate::io::ArchiveSource;
use crate::text;
use crate::zip::ZipExtractor;

use super::entry_point::{detect_entry_point, relative_entry};
use super::meta::{DESCRIPTOR_FILE, ReportDescriptor, ReportKind, read_descriptor, write_descriptor};
use super::paths::Expect;
use super::quarantine::quarantine;
use super::{ReportHub, is_listing_gap, now_millis, subdirectories};

/// Upload of one report archive.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub project: String,
    pub report: String,
    pub archive: ArchiveSource,
    /// Defaults to [`ReportKind::Nexial`].
    pub kind: Option<ReportKind>,
    /// Destroy an existing report of the same name instead of failing.
    pub override_existing: bool,
}

/// Result of a successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestOutcome {
    /// Where the archive was read from.
    pub archive: String,
    /// Link to the report on the project page, when it has an entry point.
    pub deep_link: Option<String>,
    /// Entry point relative to the report directory.
    pub index_file: Option<String>,
}

/// A report as shown in listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub name: String,
    pub kind: ReportKind,
    pub created: i64,
    /// Site path of the entry point.
    pub index_uri: Option<String>,
}

/// Steps of an ingestion, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    Validating,
    Extracting,
    Detecting,
    Persisting,
    Cleanup,
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IngestStage::Validating => "validating",
            IngestStage::Extracting => "extracting",
            IngestStage::Detecting => "detecting",
            IngestStage::Persisting => "persisting",
            IngestStage::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

impl ReportHub {
    /// Store an uploaded archive stream inside the project directory.
    ///
    /// Only `.zip` file names are accepted. The returned path is meant to
    /// be ingested as [`ArchiveSource::File`].
    pub async fn stage_upload<S>(&self, project: &str, file_name: &str, mut stream: S) -> Result<PathBuf>
    where
        S: AsyncRead + Unpin,
    {
        let plain_name = Path::new(file_name)
            .file_name()
            .is_some_and(|name| name == file_name);
        if !plain_name || !text::has_extension(file_name, &["zip"]) {
            return Err(HubError::validation(file_name, "only zip files are allowed"));
        }

        let project_dir = self.resolver.project_dir(project, Expect::Present).await?;
        let path = project_dir.join(file_name);
        let mut file = fs::File::create(&path)
            .await
            .map_err(|e| HubError::io("create", &path, e))?;
        tokio::io::copy(&mut stream, &mut file)
            .await
            .map_err(|e| HubError::io("write", &path, e))?;
        file.flush()
            .await
            .map_err(|e| HubError::io("write", &path, e))?;

        info!("new upload received: {}", path.display());
        Ok(path)
    }

    /// Unpack a report archive and publish its descriptor.
    pub async fn ingest_report(&self, request: IngestRequest) -> Result<IngestOutcome> {
        let mut stage = IngestStage::Validating;
        let result = self.run_ingest(&request, &mut stage).await;
        if let Err(e) = &result {
            warn!(
                "ingesting report [{}] of project [{}] failed while {}: {}",
                request.report.trim(),
                request.project.trim(),
                stage,
                e
            );
        }
        result
    }

    async fn run_ingest(&self, request: &IngestRequest, stage: &mut IngestStage) -> Result<IngestOutcome> {
        let location = request.archive.location();
        if let ArchiveSource::File(path) = &request.archive {
            let exists = fs::try_exists(path)
                .await
                .map_err(|e| HubError::io("inspect", path, e))?;
            if !exists {
                return Err(HubError::NotFound {
                    what: format!("uploaded archive {}", path.display()),
                    path: path.clone(),
                });
            }
        }

        let report_dir = match self
            .resolver
            .report_dir(&request.project, &request.report, Expect::Absent)
            .await
        {
            Ok(dir) => dir,
            Err(HubError::Conflict { path }) if request.override_existing => {
                info!("override enabled, destroying {}", path.display());
                fs::remove_dir_all(&path)
                    .await
                    .map_err(|e| HubError::io("remove", &path, e))?;
                path
            }
            Err(e) => return Err(e),
        };
        let project = request.project.trim();
        let report = request.report.trim();

        fs::create_dir_all(&report_dir)
            .await
            .map_err(|e| HubError::io("create", &report_dir, e))?;

        *stage = IngestStage::Extracting;
        info!("unzip {} to {}", location, report_dir.display());
        let extraction_failed = |source: ArchiveError| HubError::Extraction {
            archive: location.clone(),
            source,
        };
        let reader = request.archive.open().await.map_err(extraction_failed)?;
        // only the hub writes descriptors
        let files = ZipExtractor::new(reader, self.config.extract)
            .reserve(DESCRIPTOR_FILE)
            .extract_all(&report_dir)
            .await
            .map_err(extraction_failed)?;

        *stage = IngestStage::Detecting;
        let index_file =
            detect_entry_point(&files).and_then(|entry| relative_entry(&report_dir, entry));

        *stage = IngestStage::Persisting;
        let descriptor = ReportDescriptor {
            name: report.to_string(),
            kind: request.kind.unwrap_or_default(),
            created: now_millis(),
            index_file: index_file.clone(),
        };
        write_descriptor(&report_dir, &descriptor).await?;

        *stage = IngestStage::Cleanup;
        if let ArchiveSource::File(path) = &request.archive {
            fs::remove_file(path)
                .await
                .map_err(|e| HubError::io("delete", path, e))?;
        }

        let deep_link = index_file
            .as_ref()
            .map(|_| format!("{}/projects/{}/#{}", self.config.base_uri, project, report));

        info!(
            "report [{}] of project [{}] ingested ({} files)",
            report,
            project,
            files.len()
        );
        Ok(IngestOutcome {
            archive: location,
            deep_link,
            index_file,
        })
    }

    /// Completed reports of `kind` in a project, by directory name.
    pub async fn list_reports(&self, project: &str, kind: ReportKind) -> Result<Vec<ReportSummary>> {
        let project_dir = self.resolver.project_dir(project, Expect::Present).await?;
        let project = project.trim();

        let mut reports = Vec::new();
        for name in subdirectories(&project_dir).await? {
            let descriptor = match read_descriptor::<ReportDescriptor>(&project_dir.join(&name)).await {
                Ok(descriptor) => descriptor,
                Err(e) if is_listing_gap(&e) => {
                    warn!("skipping report [{}] of project [{}]: {}", name, project, e);
                    continue;
                }
                Err(e) => return Err(e),
            };
            if descriptor.kind != kind {
                continue;
            }
            let index_uri = descriptor
                .index_file
                .map(|index| format!("/projects/{}/{}/{}", project, name, index));
            reports.push(ReportSummary {
                name,
                kind: descriptor.kind,
                created: descriptor.created,
                index_uri,
            });
        }
        Ok(reports)
    }

    /// Move a report into the project's quarantine directory.
    pub async fn remove_report(&self, project: &str, report: &str) -> Result<PathBuf> {
        let dir = self.resolver.report_dir(project, report, Expect::Present).await?;
        let (project, report) = (project.trim(), report.trim());
        let quarantine_dir = self.resolver.quarantine_root().join(project);
        let moved = quarantine(&dir, &quarantine_dir, report).await?;
        info!("removed report [{}] of project [{}]", report, project);
        Ok(moved)
    }
}
