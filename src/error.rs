//! Error types for the report hub.
//!
//! [`HubError`] is the closed set of failures a request layer sees. Archive
//! level problems are described by [`ArchiveError`] and always reach callers
//! wrapped in [`HubError::Extraction`].

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures while reading or unpacking a ZIP container.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("not a valid ZIP file")]
    NotAZip,

    #[error("invalid {0}")]
    InvalidHeader(&'static str),

    #[error("unsupported compression method {method} for '{entry}'")]
    UnsupportedCompression { entry: String, method: u16 },

    #[error("unsafe entry path '{0}'")]
    UnsafePath(String),

    #[error("unexpected end of data in '{entry}'")]
    Truncated { entry: String },

    #[error("corrupt data in '{entry}': {reason}")]
    Corrupt { entry: String, reason: String },

    #[error("checksum mismatch in '{entry}': expected {expected:08x}, got {actual:08x}")]
    CrcMismatch {
        entry: String,
        expected: u32,
        actual: u32,
    },

    #[error("failed to create directory {path}: {source}")]
    DirectoryCreation { path: PathBuf, source: io::Error },

    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("remote archive: {0}")]
    Remote(String),

    #[error("writer task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<reqwest::Error> for ArchiveError {
    fn from(e: reqwest::Error) -> Self {
        Self::Remote(e.to_string())
    }
}

/// Coarse error category, for mapping onto transport status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubErrorKind {
    Validation,
    Conflict,
    NotFound,
    Extraction,
    CorruptData,
    Io,
}

/// Main error type of the hub.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("invalid identifier '{identifier}': {reason}")]
    Validation { identifier: String, reason: String },

    #[error("{} already exists", path.display())]
    Conflict { path: PathBuf },

    #[error("{what} does not exist")]
    NotFound { what: String, path: PathBuf },

    #[error("failed to extract {archive}: {source}")]
    Extraction {
        archive: String,
        #[source]
        source: ArchiveError,
    },

    #[error("unreadable descriptor {}: {source}", path.display())]
    CorruptData {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to {op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl HubError {
    pub fn kind(&self) -> HubErrorKind {
        match self {
            Self::Validation { .. } => HubErrorKind::Validation,
            Self::Conflict { .. } => HubErrorKind::Conflict,
            Self::NotFound { .. } => HubErrorKind::NotFound,
            Self::Extraction { .. } => HubErrorKind::Extraction,
            Self::CorruptData { .. } => HubErrorKind::CorruptData,
            Self::Io { .. } => HubErrorKind::Io,
        }
    }

    pub(crate) fn validation(identifier: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            identifier: identifier.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, HubError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        let err = HubError::validation("a/b", "contains '/'");
        assert_eq!(err.kind(), HubErrorKind::Validation);
        assert_eq!(
            err.to_string(),
            "invalid identifier 'a/b': contains '/'"
        );

        let err = HubError::Extraction {
            archive: "r.zip".to_string(),
            source: ArchiveError::NotAZip,
        };
        assert_eq!(err.kind(), HubErrorKind::Extraction);
        assert_eq!(err.to_string(), "failed to extract r.zip: not a valid ZIP file");
    }
}
