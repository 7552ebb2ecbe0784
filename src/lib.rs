//! # reporthub
//!
//! Storage core of a test report hub. Users upload zipped test reports for
//! a project; the hub unpacks each archive into its own report directory,
//! finds the report's `index.html`, and records a small JSON descriptor.
//! Projects and reports are never deleted in place: removal moves them into
//! a quarantine directory.
//!
//! ## Features
//!
//! - Streaming ZIP extraction (STORED and DEFLATE, ZIP64) with CRC checks
//! - Archives read from local uploads or from HTTP URLs using Range requests
//! - Atomic descriptor writes; incomplete reports stay out of listings
//! - Collision-safe quarantine on removal
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use reporthub::{ArchiveSource, HubConfig, IngestRequest, NewProject, ReportHub};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let hub = ReportHub::new(HubConfig::from_app_root(Path::new("/srv/hub"), "http://localhost:3000"));
//!
//!     hub.create_project(NewProject {
//!         identifier: "checkout".to_string(),
//!         ..Default::default()
//!     })
//!     .await?;
//!
//!     let outcome = hub
//!         .ingest_report(IngestRequest {
//!             project: "checkout".to_string(),
//!             report: "nightly-42".to_string(),
//!             archive: ArchiveSource::File("/srv/hub/public/projects/checkout/nightly-42.zip".into()),
//!             kind: None,
//!             override_existing: false,
//!         })
//!         .await?;
//!     println!("{:?}", outcome.deep_link);
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod hub;
pub mod io;
pub mod text;
pub mod zip;

pub use cli::Cli;
pub use config::HubConfig;
pub use error::{ArchiveError, HubError, HubErrorKind, Result};
pub use hub::{
    IngestOutcome, IngestRequest, NewProject, ProjectIcon, ProjectSummary, ReportHub, ReportKind,
    ReportSummary,
};
pub use io::{ArchiveSource, HttpRangeReader, LocalFileReader, ReadAt};
pub use zip::{ExtractOptions, ZipExtractor, ZipFileEntry};
