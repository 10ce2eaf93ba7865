//! Thumbnail cache
//!
//! Each source keeps its thumbnails in a hidden directory at its root that
//! mirrors the source tree: `movies/a.mp4` is cached as
//! `<root>/.thumbnails/movies/a.jpg`. The file's presence is the cache
//! state; there is no index.

pub mod cache;
pub mod frame;

use thiserror::Error;

use crate::error::{FfmpegError, LibraryError};

pub use cache::ThumbnailCache;
pub use frame::{fit_cover, FfmpegFrameGrabber, FrameGrabber};

#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error(transparent)]
    Ffmpeg(#[from] FfmpegError),

    #[error("JPEG encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} is not inside the source root")]
    OutsideRoot(String),

    #[error("frame backend failed: {0}")]
    Backend(String),
}

impl From<ThumbnailError> for LibraryError {
    fn from(err: ThumbnailError) -> Self {
        match err {
            ThumbnailError::Ffmpeg(e) => LibraryError::Ffmpeg(e),
            ThumbnailError::OutsideRoot(p) => LibraryError::PathViolation(p),
            other => LibraryError::CacheWriteFailure(other.to_string()),
        }
    }
}
