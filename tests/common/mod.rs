#![allow(dead_code)]

use std::io::{Cursor, Write};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use reporthub::{HubConfig, NewProject, ReportHub};

/// Build a ZIP archive in memory. Names ending in `/` become directory entries.
pub fn build_zip(entries: &[(&str, &[u8])], method: CompressionMethod) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(method);
    for (name, data) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}

/// Deterministic, poorly compressible payload.
pub fn noise(len: usize) -> Vec<u8> {
    let mut state: u32 = 0x2545_f491;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state & 0xff) as u8
        })
        .collect()
}

pub fn setup() -> (TempDir, ReportHub) {
    let temp = TempDir::new().unwrap();
    let hub = ReportHub::new(HubConfig::from_app_root(temp.path(), "http://localhost:3000"));
    (temp, hub)
}

pub async fn create_project(hub: &ReportHub, id: &str) {
    hub.create_project(NewProject {
        identifier: id.to_string(),
        ..Default::default()
    })
    .await
    .unwrap();
}
