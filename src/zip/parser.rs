//! Low-level ZIP archive parser.
//!
//! Reads the archive from the end: the End of Central Directory record
//! (and its ZIP64 counterpart when needed) locates the Central Directory,
//! which lists every entry in stored order. Entry data is located through
//! each entry's Local File Header.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};
use std::sync::Arc;

use crate::error::ArchiveError;
use crate::io::ReadAt;

use super::structures::*;

type Result<T> = std::result::Result<T, ArchiveError>;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
const MAX_COMMENT_SIZE: u64 = 65535;

/// Low-level ZIP file parser, generic over the archive source.
pub struct ZipParser<R: ReadAt + ?Sized> {
    reader: Arc<R>,
    size: u64,
}

impl<R: ReadAt + ?Sized> ZipParser<R> {
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Fill `buf` from `offset`, failing on a short read.
    async fn read_exact_at(&self, offset: u64, buf: &mut [u8], what: &'static str) -> Result<()> {
        let n = self.reader.read_at(offset, buf).await?;
        if n < buf.len() {
            return Err(ArchiveError::InvalidHeader(what));
        }
        Ok(())
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// Returns the record and its offset in the file.
    pub async fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        if self.size < EndOfCentralDirectory::SIZE as u64 {
            return Err(ArchiveError::NotAZip);
        }

        // Common case: no archive comment
        let offset = self.size - EndOfCentralDirectory::SIZE as u64;
        let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
        self.read_exact_at(offset, &mut buf, "end of central directory")
            .await?;
        if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && &buf[20..22] == b"\x00\x00" {
            let eocd = EndOfCentralDirectory::from_bytes(&buf)?;
            return Ok((eocd, offset));
        }

        // Search backwards through the maximum comment window
        let search_size = (MAX_COMMENT_SIZE + EndOfCentralDirectory::SIZE as u64).min(self.size);
        let search_start = self.size - search_size;

        let mut buf = vec![0u8; search_size as usize];
        self.read_exact_at(search_start, &mut buf, "end of central directory")
            .await?;

        for i in (0..=buf.len() - EndOfCentralDirectory::SIZE).rev() {
            if &buf[i..i + 4] == EndOfCentralDirectory::SIGNATURE {
                // the comment length must account for every trailing byte
                let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;
                if comment_len == buf.len() - i - EndOfCentralDirectory::SIZE {
                    let eocd = EndOfCentralDirectory::from_bytes(
                        &buf[i..i + EndOfCentralDirectory::SIZE],
                    )?;
                    return Ok((eocd, search_start + i as u64));
                }
            }
        }

        Err(ArchiveError::NotAZip)
    }

    /// Read the ZIP64 End of Central Directory record that precedes the
    /// regular one at `eocd_offset`.
    pub async fn read_zip64_eocd(&self, eocd_offset: u64) -> Result<Zip64EOCD> {
        let locator_offset = eocd_offset
            .checked_sub(Zip64EOCDLocator::SIZE as u64)
            .ok_or(ArchiveError::InvalidHeader("ZIP64 locator"))?;
        let mut locator_buf = vec![0u8; Zip64EOCDLocator::SIZE];
        self.read_exact_at(locator_offset, &mut locator_buf, "ZIP64 locator")
            .await?;
        let locator = Zip64EOCDLocator::from_bytes(&locator_buf)?;

        let mut eocd64_buf = vec![0u8; Zip64EOCD::MIN_SIZE];
        self.read_exact_at(
            locator.eocd64_offset,
            &mut eocd64_buf,
            "ZIP64 end of central directory",
        )
        .await?;

        Zip64EOCD::from_bytes(&eocd64_buf)
    }

    /// List every entry of the archive in Central Directory order.
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        let (eocd, eocd_offset) = self.find_eocd().await?;

        let (cd_offset, cd_size, total_entries) = if eocd.is_zip64() {
            let eocd64 = self.read_zip64_eocd(eocd_offset).await?;
            (eocd64.cd_offset, eocd64.cd_size, eocd64.total_entries)
        } else {
            (
                eocd.cd_offset as u64,
                eocd.cd_size as u64,
                eocd.total_entries as u64,
            )
        };

        if cd_offset.checked_add(cd_size).is_none_or(|end| end > self.size) {
            return Err(ArchiveError::InvalidHeader("central directory"));
        }

        // One read for the whole directory; a single range request over HTTP
        let mut cd_data = vec![0u8; cd_size as usize];
        self.read_exact_at(cd_offset, &mut cd_data, "central directory")
            .await?;

        let mut entries = Vec::with_capacity(total_entries.min(u16::MAX as u64) as usize);
        let mut cursor = Cursor::new(cd_data.as_slice());
        for _ in 0..total_entries {
            let entry = parse_cdfh(&mut cursor)
                .map_err(|_| ArchiveError::InvalidHeader("central directory file header"))?;
            entries.push(entry);
        }

        Ok(entries)
    }

    /// Offset of an entry's compressed data, past its Local File Header.
    ///
    /// The local header's variable fields may differ from the Central
    /// Directory copy, so they are read from the local header itself.
    pub async fn get_data_offset(&self, entry: &ZipFileEntry) -> Result<u64> {
        let mut lfh_buf = vec![0u8; LFH_SIZE];
        self.read_exact_at(entry.lfh_offset, &mut lfh_buf, "local file header")
            .await?;

        if &lfh_buf[0..4] != LFH_SIGNATURE {
            return Err(ArchiveError::InvalidHeader("local file header"));
        }

        let file_name_length = u16::from_le_bytes([lfh_buf[26], lfh_buf[27]]) as u64;
        let extra_field_length = u16::from_le_bytes([lfh_buf[28], lfh_buf[29]]) as u64;

        Ok(entry.lfh_offset + LFH_SIZE as u64 + file_name_length + extra_field_length)
    }

    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }
}

/// Fixed part of a Central Directory File Header.
const CDFH_FIXED_SIZE: usize = 46;
/// Extra field tag carrying 64-bit sizes and offsets.
const ZIP64_EXTRA_TAG: u16 = 0x0001;
const SATURATED: u64 = 0xFFFF_FFFF;

/// Parse one Central Directory File Header.
fn parse_cdfh(cursor: &mut Cursor<&[u8]>) -> std::io::Result<ZipFileEntry> {
    let mut fixed = [0u8; CDFH_FIXED_SIZE];
    cursor.read_exact(&mut fixed)?;
    if &fixed[0..4] != CDFH_SIGNATURE {
        return Err(std::io::ErrorKind::InvalidData.into());
    }

    // version made by, version needed, then the fields below
    let mut header = Cursor::new(&fixed[8..]);
    let flags = header.read_u16::<LittleEndian>()?;
    let method = header.read_u16::<LittleEndian>()?;
    header.set_position(header.position() + 4); // dos time and date
    let crc32 = header.read_u32::<LittleEndian>()?;
    let compressed_size = header.read_u32::<LittleEndian>()? as u64;
    let uncompressed_size = header.read_u32::<LittleEndian>()? as u64;
    let name_len = header.read_u16::<LittleEndian>()? as usize;
    let extra_len = header.read_u16::<LittleEndian>()? as usize;
    let comment_len = header.read_u16::<LittleEndian>()? as usize;
    header.set_position(header.position() + 8); // disk start and attributes
    let lfh_offset = header.read_u32::<LittleEndian>()? as u64;

    let mut name = vec![0u8; name_len];
    cursor.read_exact(&mut name)?;
    let mut extra = vec![0u8; extra_len];
    cursor.read_exact(&mut extra)?;
    let skip_to = cursor.position() + comment_len as u64;
    if skip_to > cursor.get_ref().len() as u64 {
        return Err(std::io::ErrorKind::UnexpectedEof.into());
    }
    cursor.set_position(skip_to);

    let file_name = String::from_utf8_lossy(&name).into_owned();
    let is_directory = file_name.ends_with('/') || file_name.ends_with('\\');
    let mut entry = ZipFileEntry {
        file_name,
        flags,
        compression_method: CompressionMethod::from_u16(method),
        compressed_size,
        uncompressed_size,
        crc32,
        lfh_offset,
        is_directory,
    };
    apply_zip64_extra(&mut entry, &extra)?;
    Ok(entry)
}

/// Replace saturated header values with their ZIP64 extra field copies.
///
/// The extra field only carries the values whose 32-bit header slot is
/// saturated, in the order uncompressed size, compressed size, offset.
fn apply_zip64_extra(entry: &mut ZipFileEntry, extra: &[u8]) -> std::io::Result<()> {
    let mut fields = Cursor::new(extra);
    while fields.position() + 4 <= extra.len() as u64 {
        let tag = fields.read_u16::<LittleEndian>()?;
        let len = fields.read_u16::<LittleEndian>()? as u64;
        let end = fields.position() + len;
        if tag == ZIP64_EXTRA_TAG {
            for slot in [
                &mut entry.uncompressed_size,
                &mut entry.compressed_size,
                &mut entry.lfh_offset,
            ] {
                if *slot == SATURATED && fields.position() + 8 <= end {
                    *slot = fields.read_u64::<LittleEndian>()?;
                }
            }
        }
        fields.set_position(end);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    struct Bytes(Vec<u8>);

    #[async_trait]
    impl ReadAt for Bytes {
        async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
            let start = (offset as usize).min(self.0.len());
            let n = buf.len().min(self.0.len() - start);
            buf[..n].copy_from_slice(&self.0[start..start + n]);
            Ok(n)
        }

        fn size(&self) -> u64 {
            self.0.len() as u64
        }
    }

    fn archive(comment: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        writer.start_file("report/index.html", options).unwrap();
        writer.write_all(b"<html/>").unwrap();
        writer.add_directory("report/assets/", options).unwrap();
        writer.set_comment(comment);
        writer.finish().unwrap().into_inner()
    }

    #[tokio::test]
    async fn test_finds_directory_behind_comment() {
        let parser = ZipParser::new(Arc::new(Bytes(archive("nightly build 42"))));
        let entries = parser.list_files().await.unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].file_name, "report/index.html");
        assert_eq!(entries[0].uncompressed_size, 7);
        assert!(!entries[0].is_directory);
        assert!(entries[1].is_directory);

        assert_eq!(entries[0].compression_method, CompressionMethod::Deflate);

        let offset = parser.get_data_offset(&entries[0]).await.unwrap();
        let name_len = "report/index.html".len() as u64;
        assert!(offset >= entries[0].lfh_offset + LFH_SIZE as u64 + name_len);
    }

    #[tokio::test]
    async fn test_rejects_non_archives() {
        for bytes in [Vec::new(), b"PK".to_vec(), vec![7u8; 4096]] {
            let parser = ZipParser::new(Arc::new(Bytes(bytes)));
            assert!(matches!(parser.list_files().await, Err(ArchiveError::NotAZip)));
        }
    }

    #[test]
    fn test_zip64_extra_replaces_saturated_fields() {
        let mut entry = ZipFileEntry {
            file_name: "big.bin".to_string(),
            flags: 0,
            compression_method: CompressionMethod::Stored,
            compressed_size: SATURATED,
            uncompressed_size: SATURATED,
            crc32: 0,
            lfh_offset: 128,
            is_directory: false,
        };
        let mut extra = Vec::new();
        extra.extend_from_slice(&ZIP64_EXTRA_TAG.to_le_bytes());
        extra.extend_from_slice(&16u16.to_le_bytes());
        extra.extend_from_slice(&(5u64 << 32).to_le_bytes());
        extra.extend_from_slice(&(3u64 << 32).to_le_bytes());

        apply_zip64_extra(&mut entry, &extra).unwrap();
        assert_eq!(entry.uncompressed_size, 5u64 << 32);
        assert_eq!(entry.compressed_size, 3u64 << 32);
        assert_eq!(entry.lfh_offset, 128);
    }
}
