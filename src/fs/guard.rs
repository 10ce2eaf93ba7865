//! Path guard
//!
//! Every path that reaches the filesystem goes through here first. Paths are
//! canonicalized (symlinks, `.`/`..`, mixed separators) and compared by
//! component against the allowed root and the system-directory denylist;
//! raw string comparison is never used.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{LibraryError, Result};

#[derive(Debug, Clone)]
pub struct PathGuard {
    denylist: Vec<PathBuf>,
}

impl PathGuard {
    pub fn new(denied: &[PathBuf]) -> Self {
        let denylist = denied
            .iter()
            .map(|p| fs::canonicalize(p).unwrap_or_else(|_| lexical_normalize(p)))
            .collect();
        Self { denylist }
    }

    /// Canonical form of a source root. The root must exist.
    pub fn canonical_root(&self, root: &Path) -> Result<PathBuf> {
        fs::canonicalize(root).map_err(|e| LibraryError::from_io(e, root))
    }

    /// Resolve `requested` against `root` and make sure the result stays at
    /// or below the root and outside the denylist. Relative requests are
    /// joined onto the root; absolute ones must already point inside it.
    /// The target itself does not have to exist.
    pub fn resolve(&self, root: &Path, requested: &str) -> Result<PathBuf> {
        let root = self.canonical_root(root)?;
        let requested = normalize_separators(requested);
        let candidate = if requested.is_absolute() {
            requested
        } else {
            root.join(requested)
        };

        let resolved = canonicalize_lenient(&candidate);
        if !resolved.starts_with(&root) {
            tracing::warn!(
                root = %root.display(),
                requested = %candidate.display(),
                "rejected path outside source root"
            );
            return Err(LibraryError::PathViolation(candidate.display().to_string()));
        }
        self.check_denylist(&resolved)?;
        Ok(resolved)
    }

    /// Root-less variant used by the folder picker: only the denylist
    /// applies. Relative paths are taken from the working directory.
    pub fn check(&self, requested: &str) -> Result<PathBuf> {
        let requested = normalize_separators(requested);
        let absolute = if requested.is_absolute() {
            requested
        } else {
            std::env::current_dir()?.join(requested)
        };
        let resolved = canonicalize_lenient(&absolute);
        self.check_denylist(&resolved)?;
        Ok(resolved)
    }

    fn check_denylist(&self, path: &Path) -> Result<()> {
        if self.is_denied(path) {
            tracing::warn!(path = %path.display(), "rejected system directory");
            return Err(LibraryError::PathViolation(format!(
                "access to system directory denied: {}",
                path.display()
            )));
        }
        Ok(())
    }

    pub fn is_denied(&self, path: &Path) -> bool {
        self.denylist.iter().any(|d| path.starts_with(d))
    }

    /// Whether `path` is an existing, readable directory that the guard
    /// allows. Never fails; every problem folds into `false`.
    pub fn validate(&self, requested: &str) -> bool {
        let path = match self.check(requested) {
            Ok(p) => p,
            Err(_) => return false,
        };
        match fs::metadata(&path) {
            Ok(meta) if meta.is_dir() => fs::read_dir(&path).is_ok(),
            _ => false,
        }
    }
}

/// Treat `\` and `/` alike so Windows-style input cannot smuggle `..\`
/// past a POSIX comparison.
fn normalize_separators(requested: &str) -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(requested)
    } else {
        PathBuf::from(requested.replace('\\', "/"))
    }
}

/// Canonicalize `path` the way the OS would resolve it, even when part of it
/// does not exist. The longest existing prefix is canonicalized; the rest is
/// applied one component at a time, and whenever the partial result exists
/// again (a `..` stepping back out of a missing directory) it is
/// re-canonicalized so later symlinks are followed too.
fn canonicalize_lenient(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }

    for ancestor in path.ancestors().skip(1) {
        if ancestor.as_os_str().is_empty() {
            break;
        }
        if let Ok(base) = fs::canonicalize(ancestor) {
            let rest = path.strip_prefix(ancestor).unwrap_or(Path::new(""));
            let mut out = base;
            for component in rest.components() {
                match component {
                    Component::ParentDir => {
                        out.pop();
                    }
                    Component::Normal(part) => out.push(part),
                    _ => continue,
                }
                out = resolve_existing(out);
            }
            return out;
        }
    }

    lexical_normalize(path)
}

/// Canonical form of `path` if it exists. A dangling symlink is replaced by
/// its lexically resolved target so containment checks see where it points.
fn resolve_existing(path: PathBuf) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(&path) {
        return canonical;
    }
    match fs::read_link(&path) {
        Ok(target) => {
            let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
            lexical_normalize(&base.join(target))
        }
        Err(_) => path,
    }
}

/// Resolve `.` and `..` without touching the filesystem
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
