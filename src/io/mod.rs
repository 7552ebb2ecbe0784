//! Random-access archive sources.

mod http;
mod local;

pub use http::HttpRangeReader;
pub use local::LocalFileReader;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::ArchiveError;

/// Trait for random access reading from a data source
#[async_trait]
pub trait ReadAt: Send + Sync {
    /// Read data at the specified offset into the buffer.
    ///
    /// May return fewer bytes than requested only at the end of the source.
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, ArchiveError>;

    /// Get the total size of the data source
    fn size(&self) -> u64;
}

/// Where an uploaded archive lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveSource {
    /// A staged upload on local disk, removed after a successful ingestion.
    File(PathBuf),
    /// A remote archive read with HTTP Range requests.
    Url(String),
}

impl ArchiveSource {
    /// Interpret a command-line argument as a URL or a local path.
    pub fn parse(arg: &str) -> Self {
        if arg.starts_with("http://") || arg.starts_with("https://") {
            Self::Url(arg.to_string())
        } else {
            Self::File(PathBuf::from(arg))
        }
    }

    /// Human readable location, used in results and error messages.
    pub fn location(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Url(url) => url.clone(),
        }
    }

    /// Open the source for positional reads.
    pub async fn open(&self) -> Result<Arc<dyn ReadAt>, ArchiveError> {
        match self {
            Self::File(path) => Ok(Arc::new(LocalFileReader::new(path)?)),
            Self::Url(url) => Ok(Arc::new(HttpRangeReader::new(url.clone()).await?)),
        }
    }
}
