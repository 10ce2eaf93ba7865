use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use super::frame::{fit_cover, FrameGrabber};
use super::ThumbnailError;
use crate::config::{LibraryConfig, ThumbnailConfig};

const JPEG_QUALITY: u8 = 85;

#[derive(Clone)]
pub struct ThumbnailCache {
    config: ThumbnailConfig,
    library: LibraryConfig,
    grabber: Arc<dyn FrameGrabber>,
    permits: Arc<Semaphore>,
}

impl ThumbnailCache {
    pub fn new(
        config: ThumbnailConfig,
        library: LibraryConfig,
        grabber: Arc<dyn FrameGrabber>,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        Self {
            config,
            library,
            grabber,
            permits,
        }
    }

    /// Root of the cache tree inside a source
    pub fn cache_root(&self, source_root: &Path) -> PathBuf {
        source_root.join(&self.config.dir_name)
    }

    /// Cache location for a video, `None` when the video is not under
    /// `source_root`. Both paths are expected in canonical form.
    pub fn cache_path(&self, video: &Path, source_root: &Path) -> Option<PathBuf> {
        let relative = video.strip_prefix(source_root).ok()?;
        if relative.as_os_str().is_empty() {
            return None;
        }
        Some(self.cache_root(source_root).join(relative).with_extension("jpg"))
    }

    /// Cached JPEG for `video`, generating it on a miss. Never fails: any
    /// problem is logged and yields `None`.
    pub async fn get_or_create(&self, video: PathBuf, source_root: PathBuf) -> Option<Vec<u8>> {
        let cache = self.cache_path(&video, &source_root)?;
        if let Ok(bytes) = tokio::fs::read(&cache).await {
            return Some(bytes);
        }

        let _permit = self.permits.clone().acquire_owned().await.ok()?;
        let this = self.clone();
        match tokio::task::spawn_blocking(move || this.get_or_create_blocking(&video, &source_root))
            .await
        {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "thumbnail task aborted");
                None
            }
        }
    }

    /// Synchronous variant of [`ThumbnailCache::get_or_create`]
    pub fn get_or_create_blocking(&self, video: &Path, source_root: &Path) -> Option<Vec<u8>> {
        match self.try_get_or_create(video, source_root) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(video = %video.display(), error = %e, "no thumbnail");
                None
            }
        }
    }

    pub fn try_get_or_create(
        &self,
        video: &Path,
        source_root: &Path,
    ) -> Result<Vec<u8>, ThumbnailError> {
        let cache = self
            .cache_path(video, source_root)
            .ok_or_else(|| ThumbnailError::OutsideRoot(video.display().to_string()))?;

        if let Ok(bytes) = fs::read(&cache) {
            return Ok(bytes);
        }

        let frame = self.grabber.grab(video)?;
        let thumb = fit_cover(&frame, self.config.width, self.config.height);

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY).encode_image(&thumb)?;

        write_atomic(&cache, &jpeg)?;
        debug!(path = %cache.display(), bytes = jpeg.len(), "thumbnail written");
        Ok(jpeg)
    }

    /// Delete cached thumbnails whose video no longer exists under any
    /// recognized extension. Returns the number of files removed.
    pub fn sweep_orphans(&self, source_root: &Path) -> usize {
        let cache_root = self.cache_root(source_root);
        if !cache_root.is_dir() {
            return 0;
        }

        let mut removed = 0;
        for entry in WalkDir::new(&cache_root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let thumb = entry.path();
            let is_jpg = thumb
                .extension()
                .map(|e| e.eq_ignore_ascii_case("jpg"))
                .unwrap_or(false);
            if !is_jpg {
                continue;
            }
            let (Some(dir), Some(stem)) = (thumb.parent(), thumb.file_stem()) else {
                continue;
            };
            let Ok(relative_dir) = dir.strip_prefix(&cache_root) else {
                continue;
            };

            if self.video_exists(&source_root.join(relative_dir), &stem.to_string_lossy()) {
                continue;
            }
            match fs::remove_file(thumb) {
                Ok(()) => {
                    removed += 1;
                    debug!(path = %thumb.display(), "removed orphaned thumbnail");
                }
                Err(e) => warn!(path = %thumb.display(), error = %e, "could not remove thumbnail"),
            }
        }

        if removed > 0 {
            info!(source = %source_root.display(), removed, "thumbnail sweep finished");
        }
        removed
    }

    fn video_exists(&self, dir: &Path, stem: &str) -> bool {
        let Ok(entries) = fs::read_dir(dir) else {
            return false;
        };
        entries.filter_map(|e| e.ok()).any(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            Path::new(name.as_ref())
                .file_stem()
                .map(|s| s.to_string_lossy() == stem)
                .unwrap_or(false)
                && self.library.is_video_name(&name)
                && entry.path().is_file()
        })
    }
}

/// `data:` URL for inline JPEG thumbnails
pub fn data_url(jpeg: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", STANDARD.encode(jpeg))
}

/// Write through a uniquely named sibling and rename into place, so readers
/// never see a partial file. The temporary file is removed on failure.
fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<(), ThumbnailError> {
    let write_err = |source: std::io::Error| ThumbnailError::Write {
        path: dest.display().to_string(),
        source,
    };

    let dir = dest
        .parent()
        .ok_or_else(|| write_err(std::io::Error::other("cache path has no parent")))?;
    fs::create_dir_all(dir).map_err(write_err)?;

    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = dir.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()));

    let result = fs::write(&tmp, bytes).and_then(|_| fs::rename(&tmp, dest));
    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(write_err(e));
    }
    Ok(())
}
