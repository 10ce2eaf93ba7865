//! Filesystem access: path guard, directory browsing, drive enumeration

pub mod browser;
pub mod drives;
pub mod guard;

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

pub use browser::{
    Browser, ContentItem, ContentsPage, FileEntry, FolderEntry, FolderListing, RelatedVideo,
    ScannedEntry, TreeNode,
};
pub use drives::DriveEntry;
pub use guard::PathGuard;

/// `path` relative to `root`, always with `/` separators. `path` must be
/// under `root`; anything else yields the full path.
pub fn relative_display(root: &Path, path: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) => rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.display().to_string(),
    }
}

#[cfg(windows)]
pub fn is_hidden(path: &Path, _name: &str) -> bool {
    use std::os::windows::fs::MetadataExt;

    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;

    std::fs::metadata(path)
        .map(|m| m.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0)
        .unwrap_or(false)
}

#[cfg(not(windows))]
pub fn is_hidden(_path: &Path, name: &str) -> bool {
    name.starts_with('.')
}

/// Human readable size: `N B`, `N.N KB`, `N.N MB`
pub fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;

    if size < KB {
        format!("{} B", size)
    } else if size < MB {
        format!("{:.1} KB", size as f64 / KB as f64)
    } else {
        format!("{:.1} MB", size as f64 / MB as f64)
    }
}

/// Seconds since the epoch, as the listing endpoints report timestamps
pub(crate) fn epoch_secs(time: std::io::Result<SystemTime>) -> Option<f64> {
    time.ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs_f64())
}
