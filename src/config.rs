//! Server configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default recognized video extensions (lowercase, without the dot)
pub const DEFAULT_VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mkv", "mov", "wmv", "flv"];

/// Library / browsing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Extensions counted and listed as videos
    pub video_extensions: Vec<String>,

    /// System directories that may never be browsed or served
    pub denied_paths: Vec<PathBuf>,

    /// Maximum number of files returned by the preview endpoint
    pub preview_limit: usize,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            video_extensions: DEFAULT_VIDEO_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            denied_paths: default_denied_paths(),
            preview_limit: 100,
        }
    }
}

impl LibraryConfig {
    /// Check whether a file name carries a recognized video extension
    pub fn is_video_name(&self, name: &str) -> bool {
        std::path::Path::new(name)
            .extension()
            .map(|ext| {
                let ext = ext.to_string_lossy().to_lowercase();
                self.video_extensions.iter().any(|v| *v == ext)
            })
            .unwrap_or(false)
    }
}

#[cfg(windows)]
fn default_denied_paths() -> Vec<PathBuf> {
    vec![
        PathBuf::from("C:\\Windows"),
        PathBuf::from("C:\\Program Files"),
        PathBuf::from("C:\\Program Files (x86)"),
    ]
}

#[cfg(not(windows))]
fn default_denied_paths() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/proc"),
        PathBuf::from("/sys"),
        PathBuf::from("/dev"),
    ]
}

/// Range streaming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Size of each body chunk in bytes
    pub chunk_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024 * 1024,
        }
    }
}

/// Thumbnail cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThumbnailConfig {
    /// Name of the hidden cache directory inside each source root
    pub dir_name: String,

    /// Output width in pixels
    pub width: u32,

    /// Output height in pixels
    pub height: u32,

    /// Maximum thumbnails generated concurrently
    pub max_concurrent: usize,

    /// Interval between orphan sweeps in seconds (0 disables the sweep)
    pub sweep_interval_secs: u64,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            dir_name: ".thumbnails".to_string(),
            width: 200,
            height: 280,
            max_concurrent: 2,
            sweep_interval_secs: 3600,
        }
    }
}

/// Transcription job configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Number of concurrent transcription workers
    pub workers: usize,

    /// Jobs that may wait in the queue before new ones are rejected
    pub queue_capacity: usize,

    /// Language used when the request does not name one
    pub default_language: String,

    /// External speech-to-text program
    pub engine_command: String,

    /// Arguments for the engine; `{input}` and `{language}` are substituted
    pub engine_args: Vec<String>,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 16,
            default_language: "zh".to_string(),
            engine_command: "whisper-json".to_string(),
            engine_args: vec![
                "--language".to_string(),
                "{language}".to_string(),
                "{input}".to_string(),
            ],
        }
    }
}

/// Caller identification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Owner id assumed when a request carries no `X-User-Id` header
    pub default_user_id: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { default_user_id: 1 }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Library configuration
    pub library: LibraryConfig,

    /// Streaming configuration
    pub stream: StreamConfig,

    /// Thumbnail configuration
    pub thumbnails: ThumbnailConfig,

    /// Transcription configuration
    pub transcription: TranscriptionConfig,

    /// Caller identification
    pub auth: AuthConfig,

    /// Enable CORS
    pub cors_enabled: bool,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Log format (pretty, json)
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            library: LibraryConfig::default(),
            stream: StreamConfig::default(),
            thumbnails: ThumbnailConfig::default(),
            transcription: TranscriptionConfig::default(),
            auth: AuthConfig::default(),
            cors_enabled: true,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
