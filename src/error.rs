use thiserror::Error;

use crate::store::StoreError;
use crate::transcribe::engine::EngineError;

/// Main error type for the media library
#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Path escapes its allowed root: {0}")]
    PathViolation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Transcription engine failed: {0}")]
    EngineFailure(#[from] EngineError),

    #[error("Thumbnail cache write failed: {0}")]
    CacheWriteFailure(String),

    #[error("Invalid task transition: {from} -> {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    #[error("Transcription queue is full")]
    QueueFull,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("FFmpeg error: {0}")]
    Ffmpeg(#[from] FfmpegError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LibraryError {
    /// Classify an I/O error raised while touching `path`.
    pub fn from_io(err: std::io::Error, path: &std::path::Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => LibraryError::NotFound(path.display().to_string()),
            std::io::ErrorKind::PermissionDenied => {
                LibraryError::PermissionDenied(path.display().to_string())
            }
            _ => LibraryError::Io(err),
        }
    }
}

/// FFmpeg-specific errors
#[derive(Error, Debug)]
pub enum FfmpegError {
    #[error("FFmpeg initialization failed: {0}")]
    InitFailed(String),

    #[error("Failed to open input file: {0}")]
    OpenInput(String),

    #[error("No video stream in {0}")]
    NoVideoStream(String),

    #[error("Failed to create decoder: {0}")]
    DecoderCreate(String),

    #[error("Failed to create scaler: {0}")]
    ScalerCreate(String),

    #[error("Video has no frames: {0}")]
    NoFrames(String),

    #[error("Failed to read frame: {0}")]
    ReadFrame(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, LibraryError>;
