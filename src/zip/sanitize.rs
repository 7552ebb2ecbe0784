use std::path::PathBuf;

use crate::error::ArchiveError;

/// Turn a stored entry name into a relative path that stays inside the
/// extraction root.
///
/// Both `/` and `\` separate components. Empty and `.` components are
/// dropped; absolute names, drive prefixes and `..` are rejected.
pub fn sanitize_entry_name(name: &str) -> Result<PathBuf, ArchiveError> {
    let unsafe_path = || ArchiveError::UnsafePath(name.to_string());

    if name.contains('\0') || name.starts_with('/') || name.starts_with('\\') {
        return Err(unsafe_path());
    }

    let mut relative = PathBuf::new();
    for (i, part) in name.split(['/', '\\']).enumerate() {
        match part {
            "" | "." => continue,
            ".." => return Err(unsafe_path()),
            _ if i == 0 && part.ends_with(':') => return Err(unsafe_path()),
            _ => relative.push(part),
        }
    }

    if relative.as_os_str().is_empty() {
        return Err(unsafe_path());
    }
    Ok(relative)
}
