use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use crate::error::ArchiveError;

type Result<T> = std::result::Result<T, ArchiveError>;

/// Check a record's signature and length, returning a cursor past the signature.
fn record<'a>(data: &'a [u8], signature: &[u8], min_size: usize, what: &'static str) -> Result<Cursor<&'a [u8]>> {
    if data.len() < min_size || !data.starts_with(signature) {
        return Err(ArchiveError::InvalidHeader(what));
    }
    Ok(Cursor::new(&data[signature.len()..]))
}

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
pub struct EndOfCentralDirectory {
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub disk_entries: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut fields = record(data, Self::SIGNATURE, Self::SIZE, "end of central directory")?;
        fields.set_position(4); // disk numbers
        Ok(Self {
            disk_entries: fields.read_u16::<LittleEndian>()?,
            total_entries: fields.read_u16::<LittleEndian>()?,
            cd_size: fields.read_u32::<LittleEndian>()?,
            cd_offset: fields.read_u32::<LittleEndian>()?,
        })
    }

    /// Any saturated field means the real values live in the ZIP64 record.
    pub fn is_zip64(&self) -> bool {
        [self.disk_entries, self.total_entries].contains(&u16::MAX)
            || [self.cd_size, self.cd_offset].contains(&u32::MAX)
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
pub struct Zip64EOCDLocator {
    pub eocd64_offset: u64,
}

impl Zip64EOCDLocator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut fields = record(data, Self::SIGNATURE, Self::SIZE, "ZIP64 locator")?;
        fields.set_position(4); // disk holding the ZIP64 record
        Ok(Self {
            eocd64_offset: fields.read_u64::<LittleEndian>()?,
        })
    }
}

/// ZIP64 End of Central Directory - 56 bytes minimum
pub struct Zip64EOCD {
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EOCD {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const MIN_SIZE: usize = 56;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut fields = record(data, Self::SIGNATURE, Self::MIN_SIZE, "ZIP64 end of central directory")?;
        // record size, versions, disk numbers and per-disk entry count
        fields.set_position(28);
        Ok(Self {
            total_entries: fields.read_u64::<LittleEndian>()?,
            cd_size: fields.read_u64::<LittleEndian>()?,
            cd_offset: fields.read_u64::<LittleEndian>()?,
        })
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// General purpose flag bit marking an encrypted entry.
pub const FLAG_ENCRYPTED: u16 = 0x0001;

/// Parsed ZIP file entry information
#[derive(Debug, Clone)]
pub struct ZipFileEntry {
    pub file_name: String,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub lfh_offset: u64,
    pub is_directory: bool,
}

impl ZipFileEntry {
    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }
}
