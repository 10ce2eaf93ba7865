//! Directory browsing
//!
//! Two kinds of listings live here. The folder picker (`list`, `preview`,
//! `tree`) works on absolute paths anywhere outside the denylist. The
//! library views (`contents`, `related`) work on paths relative to a
//! registered source root.
//!
//! A child entry that cannot be read is skipped; only the directory being
//! listed can fail a request.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use super::drives::{self, DriveEntry};
use super::{epoch_secs, format_size, is_hidden, relative_display, PathGuard};
use crate::config::LibraryConfig;
use crate::error::{LibraryError, Result};

pub const MAX_PAGE_SIZE: usize = 200;
pub const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_RELATED: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct FolderEntry {
    pub name: String,
    pub path: String,
    pub modified: Option<f64>,
    pub created: Option<f64>,
    pub subfolder_count: usize,
    pub video_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub size: String,
    pub modified: Option<f64>,
    pub created: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TreeNode {
    pub title: String,
    pub key: String,
    pub children: Vec<TreeNode>,
    #[serde(rename = "isLeaf")]
    pub is_leaf: bool,
}

impl TreeNode {
    fn branch(title: String, key: String) -> Self {
        Self {
            title,
            key,
            children: Vec::new(),
            is_leaf: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FolderListing {
    pub current_path: String,
    pub parent_path: Option<String>,
    pub folders: Vec<FolderEntry>,
    pub drives: Vec<DriveEntry>,
    pub default_path: Option<String>,
    pub special_folders: BTreeMap<String, String>,
}

/// One folder or video found while scanning a source directory
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedEntry {
    pub name: String,
    /// Relative to the source root, `/`-separated
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub is_dir: bool,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// Paged source listing item
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentItem {
    Folder {
        name: String,
        path: String,
        size: u64,
        modified_time: Option<DateTime<Utc>>,
    },
    Video {
        name: String,
        path: String,
        size: u64,
        modified_time: Option<DateTime<Utc>>,
        duration: Option<f64>,
        thumbnail: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ContentsPage<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RelatedVideo {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct Browser {
    guard: PathGuard,
    library: LibraryConfig,
}

impl Browser {
    pub fn new(guard: PathGuard, library: LibraryConfig) -> Self {
        Self { guard, library }
    }

    pub fn guard(&self) -> &PathGuard {
        &self.guard
    }

    pub fn library(&self) -> &LibraryConfig {
        &self.library
    }

    /// Folder picker listing. An empty `path` gives the root-level view.
    pub fn list(&self, path: &str, show_hidden: bool) -> Result<FolderListing> {
        if path.trim().is_empty() {
            return self.root_listing(show_hidden);
        }
        let dir = self.guard.check(path)?;
        self.list_dir(&dir, show_hidden)
    }

    #[cfg(windows)]
    fn root_listing(&self, show_hidden: bool) -> Result<FolderListing> {
        let default = drives::home_dir();
        let folders = match &default {
            Some(home) => self.folder_entries(home, show_hidden).unwrap_or_default(),
            None => Vec::new(),
        };
        let default_path = default.map(|p| p.display().to_string());
        Ok(FolderListing {
            current_path: default_path.clone().unwrap_or_default(),
            parent_path: None,
            folders,
            drives: drives::list_drives(),
            default_path,
            special_folders: drives::special_folders(),
        })
    }

    #[cfg(not(windows))]
    fn root_listing(&self, show_hidden: bool) -> Result<FolderListing> {
        let default = drives::home_dir().unwrap_or_else(|| PathBuf::from("/"));
        let mut listing = self.list_dir(&default, show_hidden)?;
        listing.drives = drives::list_drives();
        listing.default_path = Some(default.display().to_string());
        listing.special_folders = drives::special_folders();
        Ok(listing)
    }

    fn list_dir(&self, dir: &Path, show_hidden: bool) -> Result<FolderListing> {
        let folders = self.folder_entries(dir, show_hidden)?;
        Ok(FolderListing {
            current_path: dir.display().to_string(),
            parent_path: dir.parent().map(|p| p.display().to_string()),
            folders,
            drives: Vec::new(),
            default_path: None,
            special_folders: BTreeMap::new(),
        })
    }

    fn folder_entries(&self, dir: &Path, show_hidden: bool) -> Result<Vec<FolderEntry>> {
        let mut folders: Vec<FolderEntry> = read_dir_checked(dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                let name = entry.file_name().to_string_lossy().into_owned();
                if !show_hidden && is_hidden(&path, &name) {
                    return None;
                }
                // follows symlinks; broken links and unreadable dirs drop out
                let meta = fs::metadata(&path).ok()?;
                if !meta.is_dir() {
                    return None;
                }
                let (subfolder_count, video_count) = match self.child_counts(&path) {
                    Ok(counts) => counts,
                    Err(e) => {
                        debug!(path = %path.display(), error = %e, "skipping unreadable folder");
                        return None;
                    }
                };
                Some(FolderEntry {
                    name,
                    path: path.display().to_string(),
                    modified: epoch_secs(meta.modified()),
                    created: epoch_secs(meta.created()),
                    subfolder_count,
                    video_count,
                })
            })
            .collect();
        folders.sort_by_cached_key(|f| f.name.to_lowercase());
        Ok(folders)
    }

    /// Immediate subdirectory and video counts of `dir`
    fn child_counts(&self, dir: &Path) -> std::io::Result<(usize, usize)> {
        let mut subfolders = 0;
        let mut videos = 0;
        for entry in fs::read_dir(dir)?.filter_map(|e| e.ok()) {
            let path = entry.path();
            match fs::metadata(&path) {
                Ok(meta) if meta.is_dir() => subfolders += 1,
                Ok(meta) if meta.is_file() => {
                    if self.library.is_video_name(&entry.file_name().to_string_lossy()) {
                        videos += 1;
                    }
                }
                _ => {}
            }
        }
        Ok((subfolders, videos))
    }

    /// Files directly inside `path`, sorted, capped at the preview limit
    pub fn preview(&self, path: &str) -> Result<Vec<FileEntry>> {
        if path.trim().is_empty() {
            return Ok(Vec::new());
        }
        let dir = self.guard.check(path)?;
        let mut files: Vec<FileEntry> = read_dir_checked(&dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                let meta = fs::metadata(&path).ok()?;
                if !meta.is_file() {
                    return None;
                }
                Some(FileEntry {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    path: path.display().to_string(),
                    size: format_size(meta.len()),
                    modified: epoch_secs(meta.modified()),
                    created: epoch_secs(meta.created()),
                })
            })
            .collect();
        files.sort_by_cached_key(|f| f.name.to_lowercase());
        files.truncate(self.library.preview_limit);
        Ok(files)
    }

    /// Lazy folder tree: drive roots for an empty path, otherwise one
    /// branch node per visible subdirectory.
    pub fn tree(&self, path: &str, show_hidden: bool) -> Result<Vec<TreeNode>> {
        if path.trim().is_empty() {
            return Ok(drives::root_paths()
                .into_iter()
                .map(|root| TreeNode::branch(root.clone(), root))
                .collect());
        }
        let dir = self.guard.check(path)?;
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut nodes: Vec<TreeNode> = read_dir_checked(&dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                let name = entry.file_name().to_string_lossy().into_owned();
                if !show_hidden && is_hidden(&path, &name) {
                    return None;
                }
                if !fs::metadata(&path).ok()?.is_dir() {
                    return None;
                }
                Some(TreeNode::branch(name, path.display().to_string()))
            })
            .collect();
        nodes.sort_by_cached_key(|n| n.title.to_lowercase());
        Ok(nodes)
    }

    /// Home directory, or an empty string when there is none
    pub fn default_path() -> String {
        drives::home_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    }

    /// Whether `path` is a readable directory the guard allows
    pub fn validate(&self, path: &str) -> bool {
        self.guard.validate(path)
    }

    /// Folders and videos directly inside `path` (relative to `root`),
    /// hidden entries excluded, sorted by name.
    pub fn scan_source_dir(&self, root: &Path, path: &str) -> Result<Vec<ScannedEntry>> {
        let root = self.guard.canonical_root(root)?;
        let dir = self.guard.resolve(&root, path)?;
        if !dir.is_dir() {
            return Err(LibraryError::NotFound(format!("folder {}", path)));
        }

        let mut entries: Vec<ScannedEntry> = read_dir_checked(&dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                let name = entry.file_name().to_string_lossy().into_owned();
                if is_hidden(&path, &name) {
                    return None;
                }
                let meta = fs::metadata(&path).ok()?;
                let is_dir = meta.is_dir();
                if !is_dir && !(meta.is_file() && self.library.is_video_name(&name)) {
                    return None;
                }
                Some(ScannedEntry {
                    relative_path: relative_display(&root, &path),
                    absolute_path: path,
                    name,
                    is_dir,
                    size: if is_dir { 0 } else { meta.len() },
                    modified: meta.modified().ok().map(DateTime::<Utc>::from),
                })
            })
            .collect();
        entries.sort_by_cached_key(|e| e.name.to_lowercase());
        Ok(entries)
    }

    /// One page of [`Browser::scan_source_dir`]
    pub fn contents(
        &self,
        root: &Path,
        path: &str,
        page: usize,
        page_size: usize,
    ) -> Result<ContentsPage<ScannedEntry>> {
        let entries = self.scan_source_dir(root, path)?;
        Ok(paginate(entries, page, page_size))
    }

    /// Up to ten other videos next to `relative_path`
    pub fn related(&self, root: &Path, relative_path: &str) -> Result<Vec<RelatedVideo>> {
        let root = self.guard.canonical_root(root)?;
        let video = self.guard.resolve(&root, relative_path)?;
        if !video.is_file() {
            return Err(LibraryError::NotFound(relative_path.to_string()));
        }
        let dir = match video.parent() {
            Some(dir) => dir,
            None => return Ok(Vec::new()),
        };
        let dir_relative = relative_display(&root, dir);

        let mut related: Vec<RelatedVideo> = self
            .scan_source_dir(&root, &dir_relative)?
            .into_iter()
            .filter(|e| !e.is_dir && e.absolute_path != video)
            .map(|e| RelatedVideo {
                name: e.name,
                path: e.relative_path,
            })
            .collect();
        related.truncate(MAX_RELATED);
        Ok(related)
    }
}

/// Slice `items` for a 1-based `page`. Out-of-range values are clamped:
/// `page` to at least 1, `page_size` to `1..=200`.
pub fn paginate<T>(items: Vec<T>, page: usize, page_size: usize) -> ContentsPage<T> {
    let page = page.max(1);
    let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
    let total = items.len();
    let items = items
        .into_iter()
        .skip((page - 1).saturating_mul(page_size))
        .take(page_size)
        .collect();
    ContentsPage {
        items,
        total,
        page,
        page_size,
    }
}

fn read_dir_checked(dir: &Path) -> Result<fs::ReadDir> {
    fs::read_dir(dir).map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => {
            LibraryError::PermissionDenied(dir.display().to_string())
        }
        std::io::ErrorKind::NotFound => {
            LibraryError::BadRequest(format!("folder does not exist: {}", dir.display()))
        }
        _ if !dir.is_dir() => {
            LibraryError::BadRequest(format!("not a folder: {}", dir.display()))
        }
        _ => LibraryError::Io(e),
    })
}
