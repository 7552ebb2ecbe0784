//! Small string helpers.

/// Everything after the last `delimiter`, or the whole input if it does
/// not occur.
pub fn substring_after_last<'a>(s: &'a str, delimiter: &str) -> &'a str {
    match s.rfind(delimiter) {
        Some(idx) => &s[idx + delimiter.len()..],
        None => s,
    }
}

/// Everything before the last `delimiter`, or the whole input if it does
/// not occur.
pub fn substring_before_last<'a>(s: &'a str, delimiter: &str) -> &'a str {
    match s.rfind(delimiter) {
        Some(idx) => &s[..idx],
        None => s,
    }
}

/// Lowercased extension of a file name, if it has one.
pub fn extension_of(file_name: &str) -> Option<String> {
    let ext = substring_after_last(file_name, ".");
    if ext.len() == file_name.len() || ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}

/// Case-insensitive check of a file name against allowed extensions.
pub fn has_extension(file_name: &str, allowed: &[&str]) -> bool {
    extension_of(file_name).is_some_and(|ext| allowed.contains(&ext.as_str()))
}
