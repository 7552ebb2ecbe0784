use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_BASE_URI;
use crate::hub::ReportKind;

#[derive(Parser, Debug)]
#[command(name = "reporthub")]
#[command(version)]
#[command(about = "Manage projects and zipped test reports of a report hub", long_about = None)]
#[command(after_help = "Examples:\n  \
  reporthub create-project checkout --name \"Checkout\" --icon logo.png\n  \
  reporthub ingest checkout nightly-42.zip --kind jmeter\n  \
  reporthub ingest checkout https://ci.example.com/r.zip --report r1 --override\n  \
  reporthub reports checkout --kind jmeter")]
pub struct Cli {
    /// Application root holding public/projects and .lostandfound
    #[arg(long, env = "REPORTHUB_ROOT", value_name = "DIR", global = true)]
    pub root: Option<PathBuf>,

    /// Public base URI used for deep links
    #[arg(long, env = "REPORTHUB_BASE_URI", default_value = DEFAULT_BASE_URI, global = true)]
    pub base_uri: String,

    /// Verbose logging
    #[arg(short = 'v', global = true)]
    pub verbose: bool,

    /// Quiet mode, warnings and errors only
    #[arg(short = 'q', global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new project
    CreateProject {
        id: String,
        /// Display name (defaults to the id)
        #[arg(long)]
        name: Option<String>,
        /// Icon image (png, jpg, jpeg or gif)
        #[arg(long, value_name = "FILE")]
        icon: Option<PathBuf>,
    },
    /// Move a project into quarantine
    RemoveProject { id: String },
    /// List projects
    Projects,
    /// List reports of a project
    Reports {
        project: String,
        #[arg(long, value_enum, default_value_t = ReportKind::Nexial)]
        kind: ReportKind,
    },
    /// Unpack a zipped report (local file or http(s) URL) into a project
    Ingest {
        project: String,
        /// ZIP file path or HTTP URL
        archive: String,
        /// Report id (defaults to the archive name without extension)
        #[arg(long)]
        report: Option<String>,
        #[arg(long, value_enum)]
        kind: Option<ReportKind>,
        /// Replace an existing report of the same id
        #[arg(long = "override")]
        override_existing: bool,
    },
    /// Move a report into quarantine
    RemoveReport { project: String, report: String },
}

impl Cli {
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}
