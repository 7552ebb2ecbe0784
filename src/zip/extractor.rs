use flate2::{Crc, Decompress, FlushDecompress, Status};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

use crate::error::ArchiveError;
use crate::io::ReadAt;

use super::parser::ZipParser;
use super::sanitize::sanitize_entry_name;
use super::structures::{CompressionMethod, ZipFileEntry};

type Result<T> = std::result::Result<T, ArchiveError>;

/// Chunks buffered between an entry's reader and its writer task.
const CHANNEL_DEPTH: usize = 4;

/// Bounds for the extraction pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Entries whose file write may still be in flight. `1` means an entry
    /// is only started once the previous one is fully on disk.
    pub max_pending_writes: usize,
    /// Size of each read from the archive and of each decompressed chunk.
    pub chunk_size: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            max_pending_writes: 1,
            chunk_size: 64 * 1024,
        }
    }
}

/// ZIP file extractor
pub struct ZipExtractor<R: ReadAt + ?Sized> {
    parser: ZipParser<R>,
    options: ExtractOptions,
    reserved: Vec<String>,
}

impl<R: ReadAt + ?Sized> ZipExtractor<R> {
    pub fn new(reader: Arc<R>, options: ExtractOptions) -> Self {
        Self {
            parser: ZipParser::new(reader),
            options,
            reserved: Vec::new(),
        }
    }

    /// Keep the archive from writing a top-level file called `name`, or any
    /// `name.<suffix>` sibling. Such entries are skipped.
    pub fn reserve(mut self, name: impl Into<String>) -> Self {
        self.reserved.push(name.into());
        self
    }

    fn is_reserved(&self, relative: &Path) -> bool {
        let mut parts = relative.components();
        let (Some(first), None) = (parts.next(), parts.next()) else {
            return false;
        };
        let name = first.as_os_str().to_string_lossy();
        self.reserved.iter().any(|reserved| {
            name.strip_prefix(reserved.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
        })
    }

    /// List all entries in the archive
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        self.parser.list_files().await
    }

    /// Unpack every file entry below `destination`.
    ///
    /// Entries are visited in stored order. Each one is inflated here and
    /// streamed to a spawned writer task; the next entry starts once its
    /// read side is done and a write permit is free. Returns the written
    /// paths in stored order, after every writer has finished. The first
    /// failure stops the traversal and leaves earlier files in place.
    pub async fn extract_all(&self, destination: &Path) -> Result<Vec<PathBuf>> {
        let entries = self.list_files().await?;
        let mut writers: JoinSet<Result<(usize, PathBuf)>> = JoinSet::new();
        let mut written = Vec::with_capacity(entries.len());
        let mut writer_err = None;

        let traversal = self
            .start_entries(&entries, destination, &mut writers, &mut written, &mut writer_err)
            .await;

        // writers run to completion even when the traversal failed
        while let Some(done) = writers.join_next().await {
            match joined(done) {
                Ok(file) => written.push(file),
                Err(e) => {
                    writer_err.get_or_insert(e);
                }
            }
        }

        match (traversal, writer_err) {
            // a failed writer closes its channel; report the writer's error
            (Err(ArchiveError::Task(_)), Some(e)) | (Ok(()), Some(e)) => return Err(e),
            (Err(e), _) => return Err(e),
            (Ok(()), None) => {}
        }
        written.sort_by_key(|(index, _)| *index);

        info!(
            "extracted {} files into {}",
            written.len(),
            destination.display()
        );
        Ok(written.into_iter().map(|(_, path)| path).collect())
    }

    /// Walk the entries, spawning one writer per file entry.
    async fn start_entries(
        &self,
        entries: &[ZipFileEntry],
        destination: &Path,
        writers: &mut JoinSet<Result<(usize, PathBuf)>>,
        written: &mut Vec<(usize, PathBuf)>,
        writer_err: &mut Option<ArchiveError>,
    ) -> Result<()> {
        let permits = Arc::new(Semaphore::new(self.options.max_pending_writes.max(1)));

        for (index, entry) in entries.iter().enumerate() {
            if entry.is_directory {
                debug!("skipping directory entry {}", entry.file_name);
                continue;
            }

            let relative = sanitize_entry_name(&entry.file_name)?;
            if self.is_reserved(&relative) {
                warn!("skipping reserved entry {}", entry.file_name);
                continue;
            }
            check_supported(entry)?;

            let permit = permits
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| ArchiveError::Task(e.to_string()))?;
            while let Some(done) = writers.try_join_next() {
                match joined(done) {
                    Ok(file) => written.push(file),
                    Err(e) => {
                        *writer_err = Some(e);
                        return Err(ArchiveError::Task("a writer failed".to_string()));
                    }
                }
            }

            let data_offset = self.parser.get_data_offset(entry).await?;

            let output_path = destination.join(relative);
            if let Some(parent) = output_path.parent() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|source| ArchiveError::DirectoryCreation {
                        path: parent.to_path_buf(),
                        source,
                    })?;
            }

            let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
            writers.spawn(write_entry(rx, output_path, index, permit));
            self.stream_entry(entry, data_offset, tx).await?;
        }
        Ok(())
    }

    /// Read one entry's data, inflate it if needed, and send it to the writer.
    ///
    /// The decompressed length and CRC-32 are checked against the Central
    /// Directory once the entry's data is exhausted.
    async fn stream_entry(
        &self,
        entry: &ZipFileEntry,
        data_offset: u64,
        tx: mpsc::Sender<Vec<u8>>,
    ) -> Result<()> {
        let chunk_size = self.options.chunk_size.max(1);
        let mut sink = EntrySink {
            entry,
            tx,
            crc: Crc::new(),
            produced: 0,
        };
        let mut inflater = Decompress::new(false);
        let mut input = vec![0u8; chunk_size];
        let mut offset = data_offset;
        let mut remaining = entry.compressed_size;

        while remaining > 0 {
            let want = remaining.min(chunk_size as u64) as usize;
            let n = self
                .parser
                .reader()
                .read_at(offset, &mut input[..want])
                .await?;
            if n == 0 {
                return Err(ArchiveError::Truncated {
                    entry: entry.file_name.clone(),
                });
            }
            offset += n as u64;
            remaining -= n as u64;

            match entry.compression_method {
                CompressionMethod::Deflate => {
                    inflate_chunk(&mut inflater, &input[..n], chunk_size, &mut sink).await?
                }
                _ => sink.send(input[..n].to_vec()).await?,
            }
        }

        if entry.compression_method == CompressionMethod::Deflate {
            // drain whatever the inflater still holds
            loop {
                let mut out = Vec::with_capacity(chunk_size);
                let status = inflater
                    .decompress_vec(&[], &mut out, FlushDecompress::Finish)
                    .map_err(|e| sink.corrupt(e.to_string()))?;
                let done = out.is_empty() || status == Status::StreamEnd;
                if !out.is_empty() {
                    sink.send(out).await?;
                }
                if done {
                    break;
                }
            }
        }

        sink.finish()
    }
}

/// Feed one compressed chunk through the inflater.
async fn inflate_chunk(
    inflater: &mut Decompress,
    mut input: &[u8],
    chunk_size: usize,
    sink: &mut EntrySink<'_>,
) -> Result<()> {
    while !input.is_empty() {
        let mut out = Vec::with_capacity(chunk_size);
        let before = inflater.total_in();
        let status = inflater
            .decompress_vec(input, &mut out, FlushDecompress::None)
            .map_err(|e| sink.corrupt(e.to_string()))?;
        let consumed = (inflater.total_in() - before) as usize;
        input = &input[consumed..];

        let stalled = consumed == 0 && out.is_empty();
        if !out.is_empty() {
            sink.send(out).await?;
        }
        if status == Status::StreamEnd || stalled {
            break;
        }
    }
    Ok(())
}

/// Sending half of an entry pipeline, tracking what has been produced.
struct EntrySink<'a> {
    entry: &'a ZipFileEntry,
    tx: mpsc::Sender<Vec<u8>>,
    crc: Crc,
    produced: u64,
}

impl EntrySink<'_> {
    async fn send(&mut self, data: Vec<u8>) -> Result<()> {
        if self.produced + data.len() as u64 > self.entry.uncompressed_size {
            return Err(self.corrupt(format!(
                "data exceeds the declared {} bytes",
                self.entry.uncompressed_size
            )));
        }
        self.crc.update(&data);
        self.produced += data.len() as u64;
        self.tx
            .send(data)
            .await
            .map_err(|_| ArchiveError::Task(format!("writer for '{}' stopped", self.entry.file_name)))
    }

    fn corrupt(&self, reason: String) -> ArchiveError {
        ArchiveError::Corrupt {
            entry: self.entry.file_name.clone(),
            reason,
        }
    }

    fn finish(self) -> Result<()> {
        if self.produced != self.entry.uncompressed_size {
            return Err(self.corrupt(format!(
                "expected {} bytes, got {}",
                self.entry.uncompressed_size, self.produced
            )));
        }
        let actual = self.crc.sum();
        if actual != self.entry.crc32 {
            return Err(ArchiveError::CrcMismatch {
                entry: self.entry.file_name.clone(),
                expected: self.entry.crc32,
                actual,
            });
        }
        Ok(())
    }
}

fn check_supported(entry: &ZipFileEntry) -> Result<()> {
    if entry.is_encrypted() {
        return Err(ArchiveError::Corrupt {
            entry: entry.file_name.clone(),
            reason: "encrypted entries are not supported".to_string(),
        });
    }
    match entry.compression_method {
        CompressionMethod::Stored | CompressionMethod::Deflate => Ok(()),
        CompressionMethod::Unknown(method) => Err(ArchiveError::UnsupportedCompression {
            entry: entry.file_name.clone(),
            method,
        }),
    }
}

/// Writer half of an entry pipeline. Holds its permit until the file is
/// flushed.
async fn write_entry(
    mut rx: mpsc::Receiver<Vec<u8>>,
    path: PathBuf,
    index: usize,
    _permit: OwnedSemaphorePermit,
) -> Result<(usize, PathBuf)> {
    let write_err = |source| ArchiveError::Write {
        path: path.clone(),
        source,
    };

    let file = fs::File::create(&path).await.map_err(write_err)?;
    let mut out = BufWriter::new(file);
    while let Some(chunk) = rx.recv().await {
        out.write_all(&chunk).await.map_err(write_err)?;
    }
    out.flush().await.map_err(write_err)?;

    debug!("wrote {}", path.display());
    Ok((index, path))
}

fn joined(
    done: std::result::Result<Result<(usize, PathBuf)>, JoinError>,
) -> Result<(usize, PathBuf)> {
    done.map_err(|e| ArchiveError::Task(e.to_string()))?
}
