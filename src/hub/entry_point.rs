use std::path::{Path, PathBuf};

/// File name that marks a report's viewable root document.
pub const ENTRY_POINT_NAME: &str = "index.html";

/// Pick the report entry point among extracted files.
///
/// Only files named exactly [`ENTRY_POINT_NAME`] qualify; the shortest path
/// wins, and among equally long paths the first one extracted.
pub fn detect_entry_point(files: &[PathBuf]) -> Option<&Path> {
    files
        .iter()
        .filter(|path| path.file_name().is_some_and(|name| name == ENTRY_POINT_NAME))
        .min_by_key(|path| path.as_os_str().len())
        .map(PathBuf::as_path)
}

/// `entry` relative to `report_dir`, with `/` separators.
pub fn relative_entry(report_dir: &Path, entry: &Path) -> Option<String> {
    let relative = entry.strip_prefix(report_dir).ok()?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    Some(parts.join("/"))
}
