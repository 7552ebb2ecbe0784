//! Command-line front end of the report hub.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use tracing_subscriber::EnvFilter;

use reporthub::cli::Command;
use reporthub::text::{substring_after_last, substring_before_last};
use reporthub::{ArchiveSource, Cli, HubConfig, IngestRequest, NewProject, ProjectIcon, ReportHub};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let root = match &cli.root {
        Some(root) => root.clone(),
        None => std::env::current_dir().context("cannot determine current directory")?,
    };
    let hub = ReportHub::new(HubConfig::from_app_root(&root, cli.base_uri.clone()));

    match cli.command {
        Command::CreateProject { id, name, icon } => {
            let icon = match icon {
                Some(path) => Some(load_icon(&path).await?),
                None => None,
            };
            let id = hub
                .create_project(NewProject {
                    identifier: id,
                    display_name: name,
                    icon,
                })
                .await?;
            println!("Project [{}] created successfully", id);
        }
        Command::RemoveProject { id } => {
            let moved = hub.remove_project(&id).await?;
            println!("Project [{}] successfully removed ({})", id.trim(), moved.display());
        }
        Command::Projects => {
            for project in hub.list_projects().await? {
                println!(
                    "{:<24}  {:<32}  {}",
                    project.id,
                    project.name,
                    project.icon_uri.unwrap_or_default()
                );
            }
        }
        Command::Reports { project, kind } => {
            for report in hub.list_reports(&project, kind).await? {
                println!(
                    "{:<32}  {}",
                    report.name,
                    report.index_uri.unwrap_or_else(|| "-".to_string())
                );
            }
        }
        Command::Ingest {
            project,
            archive,
            report,
            kind,
            override_existing,
        } => {
            let file_name = substring_after_last(&archive, "/").to_string();
            let report = report.unwrap_or_else(|| substring_before_last(&file_name, ".").to_string());

            let source = match ArchiveSource::parse(&archive) {
                // ingestion consumes the upload, so work on a staged copy
                ArchiveSource::File(path) => {
                    let staged_name = file_name_of(&path)?;
                    let staged = hub
                        .resolver()
                        .projects_root()
                        .join(project.trim())
                        .join(&staged_name);
                    if same_file(&path, &staged).await {
                        ArchiveSource::File(path)
                    } else {
                        let file = tokio::fs::File::open(&path)
                            .await
                            .with_context(|| format!("cannot open {}", path.display()))?;
                        ArchiveSource::File(hub.stage_upload(&project, &staged_name, file).await?)
                    }
                }
                url => url,
            };

            let outcome = hub
                .ingest_report(IngestRequest {
                    project,
                    report,
                    archive: source,
                    kind,
                    override_existing,
                })
                .await?;
            match outcome.deep_link {
                Some(link) => println!("{}", link),
                None => println!("ingested {} (no index.html found)", outcome.archive),
            }
        }
        Command::RemoveReport { project, report } => {
            hub.remove_report(&project, &report).await?;
            println!(
                "Report [{}] of Project [{}] successfully removed",
                report.trim(),
                project.trim()
            );
        }
    }

    Ok(())
}

async fn load_icon(path: &Path) -> Result<ProjectIcon> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("cannot read icon {}", path.display()))?;
    Ok(ProjectIcon::from_file_name(&file_name_of(path)?, bytes)?)
}

fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .with_context(|| format!("{} has no file name", path.display()))
}

async fn same_file(a: &Path, b: &Path) -> bool {
    match (tokio::fs::canonicalize(a).await, tokio::fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
