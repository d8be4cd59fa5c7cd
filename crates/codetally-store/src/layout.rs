//! Naming of project and run folders.

use std::path::Path;

/// Longest folder name kept, in characters.
const MAX_COMPONENT_LEN: usize = 120;

/// Characters not allowed in a folder name on common filesystems.
const RESERVED: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

const FALLBACK_NAME: &str = "root";

/// Make `name` safe to use as a single folder name.
///
/// Reserved and control characters become `_` and the result is cut to
/// 120 characters. Names that end up empty, `.` or `..` become `root`.
pub fn sanitize_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if RESERVED.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .take(MAX_COMPONENT_LEN)
        .collect();

    match cleaned.trim() {
        "" | "." | ".." => FALLBACK_NAME.to_string(),
        trimmed => trimmed.to_string(),
    }
}

/// Folder name for results of the tree at `root`.
pub fn project_folder_name(root: &Path) -> String {
    root.file_name()
        .map(|name| sanitize_component(&name.to_string_lossy()))
        .unwrap_or_else(|| FALLBACK_NAME.to_string())
}

/// Suffix for the `index`-th run of a day, counting from 1:
/// `a`..`z`, `aa`..`az`, `ba`, and so on. Index 0 has no suffix.
pub fn run_suffix(mut index: u64) -> String {
    let mut letters = Vec::new();
    while index > 0 {
        index -= 1;
        letters.push(char::from(b'a' + (index % 26) as u8));
        index /= 26;
    }
    letters.iter().rev().collect()
}

/// Inverse of [`run_suffix`]. `None` for anything but lowercase ASCII letters.
pub fn suffix_index(suffix: &str) -> Option<u64> {
    if suffix.is_empty() {
        return None;
    }
    suffix.bytes().try_fold(0u64, |acc, b| {
        if !b.is_ascii_lowercase() {
            return None;
        }
        acc.checked_mul(26)?.checked_add(u64::from(b - b'a') + 1)
    })
}
