//! Drive roots, disk capacity and well-known user folders

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct DriveEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub drive_type: String,
    #[serde(rename = "total")]
    pub total_gb: f64,
    #[serde(rename = "free")]
    pub free_gb: f64,
}

/// Bytes to GiB, one decimal
pub fn to_gb(bytes: u64) -> f64 {
    (bytes as f64 / (1024.0 * 1024.0 * 1024.0) * 10.0).round() / 10.0
}

/// The user's home directory when it exists
pub fn home_dir() -> Option<PathBuf> {
    dirs_next::home_dir().filter(|p| p.is_dir())
}

/// Desktop, Documents, Downloads, Pictures, Music and Videos, when the
/// platform knows them and they exist.
pub fn special_folders() -> BTreeMap<String, String> {
    let candidates = [
        ("Desktop", dirs_next::desktop_dir()),
        ("Documents", dirs_next::document_dir()),
        ("Downloads", dirs_next::download_dir()),
        ("Pictures", dirs_next::picture_dir()),
        ("Music", dirs_next::audio_dir()),
        ("Videos", dirs_next::video_dir()),
    ];
    candidates
        .into_iter()
        .filter_map(|(name, dir)| {
            dir.filter(|d| d.is_dir())
                .map(|d| (name.to_string(), d.display().to_string()))
        })
        .collect()
}

#[cfg(windows)]
pub fn list_drives() -> Vec<DriveEntry> {
    use windows::Win32::Storage::FileSystem::{GetDriveTypeW, GetLogicalDrives};

    let mask = unsafe { GetLogicalDrives() };
    let mut drives = Vec::new();
    for (i, letter) in ('A'..='Z').enumerate() {
        if mask & (1 << i) == 0 {
            continue;
        }
        let root = format!("{}:\\", letter);
        let wide = to_wide(&root);
        let kind = unsafe { GetDriveTypeW(windows::core::PCWSTR(wide.as_ptr())) };
        let drive_type = match kind {
            2 => "Removable Disk",
            3 => "Local Disk",
            4 => "Network Drive",
            5 => "CD-ROM Drive",
            6 => "RAM Disk",
            _ => continue,
        };
        let (total, free) = capacity(Path::new(&root)).unwrap_or((0, 0));
        drives.push(DriveEntry {
            name: format!("{}:", letter),
            path: root,
            drive_type: drive_type.to_string(),
            total_gb: to_gb(total),
            free_gb: to_gb(free),
        });
    }
    drives
}

#[cfg(not(windows))]
pub fn list_drives() -> Vec<DriveEntry> {
    let (total, free) = capacity(Path::new("/")).unwrap_or((0, 0));
    vec![DriveEntry {
        name: "/".to_string(),
        path: "/".to_string(),
        drive_type: "Local Disk".to_string(),
        total_gb: to_gb(total),
        free_gb: to_gb(free),
    }]
}

/// Drive roots as reported by the folder tree
pub fn root_paths() -> Vec<String> {
    list_drives().into_iter().map(|d| d.path).collect()
}

/// `(total, free)` bytes of the volume holding `path`
#[cfg(windows)]
pub fn capacity(path: &Path) -> Option<(u64, u64)> {
    use windows::Win32::Storage::FileSystem::GetDiskFreeSpaceExW;

    let wide = to_wide(&path.to_string_lossy());
    let mut free: u64 = 0;
    let mut total: u64 = 0;
    unsafe {
        GetDiskFreeSpaceExW(
            windows::core::PCWSTR(wide.as_ptr()),
            Some(&mut free as *mut u64),
            Some(&mut total as *mut u64),
            None,
        )
    }
    .ok()?;
    Some((total, free))
}

#[cfg(unix)]
#[allow(clippy::unnecessary_cast)]
pub fn capacity(path: &Path) -> Option<(u64, u64)> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).ok()?;
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if rc != 0 {
        return None;
    }
    let block = stat.f_frsize as u64;
    Some((stat.f_blocks as u64 * block, stat.f_bavail as u64 * block))
}

#[cfg(not(any(unix, windows)))]
pub fn capacity(_path: &Path) -> Option<(u64, u64)> {
    None
}

#[cfg(windows)]
fn to_wide(s: &str) -> Vec<u16> {
    use std::os::windows::ffi::OsStrExt;
    std::ffi::OsStr::new(s)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_gb() {
        assert_eq!(to_gb(0), 0.0);
        assert_eq!(to_gb(1024 * 1024 * 1024), 1.0);
        assert_eq!(to_gb(1536 * 1024 * 1024), 1.5);
    }

    #[test]
    fn test_list_drives_not_empty() {
        let drives = list_drives();
        assert!(!drives.is_empty());
        assert!(drives.iter().all(|d| d.free_gb <= d.total_gb));
    }

    #[cfg(unix)]
    #[test]
    fn test_root_capacity() {
        let (total, free) = capacity(Path::new("/")).unwrap();
        assert!(total > 0);
        assert!(free <= total);
        assert!(capacity(Path::new("/definitely/not/here")).is_none());
    }
}
