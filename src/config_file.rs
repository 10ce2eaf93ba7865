//! Configuration file support
//!
//! Loads server configuration from TOML files. Every section except
//! `[server]` is optional and falls back to the built-in defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::{
    AuthConfig, LibraryConfig, ServerConfig, StreamConfig, ThumbnailConfig, TranscriptionConfig,
};

/// Configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Server settings
    pub server: ServerSettings,
    /// Library settings
    pub library: Option<LibrarySettings>,
    /// Streaming settings
    pub stream: Option<StreamSettings>,
    /// Thumbnail settings
    pub thumbnails: Option<ThumbnailSettings>,
    /// Transcription settings
    pub transcription: Option<TranscriptionSettings>,
    /// Caller identification settings
    pub auth: Option<AuthSettings>,
    /// Logging settings
    pub logging: Option<LoggingSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Enable CORS
    pub cors_enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibrarySettings {
    /// Recognized video extensions
    pub video_extensions: Option<Vec<String>>,
    /// Directories that may never be browsed
    pub denied_paths: Option<Vec<PathBuf>>,
    /// Preview cap
    pub preview_limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSettings {
    /// Body chunk size in bytes
    pub chunk_size: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThumbnailSettings {
    pub dir_name: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub max_concurrent: Option<usize>,
    pub sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionSettings {
    pub workers: Option<usize>,
    pub queue_capacity: Option<usize>,
    pub default_language: Option<String>,
    pub engine_command: Option<String>,
    pub engine_args: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    pub default_user_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: Option<String>,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: ConfigFile = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Generate default configuration file
    pub fn default_config() -> Self {
        let defaults = ServerConfig::default();
        Self {
            server: ServerSettings {
                host: defaults.host,
                port: defaults.port,
                cors_enabled: Some(defaults.cors_enabled),
            },
            library: Some(LibrarySettings {
                video_extensions: Some(defaults.library.video_extensions),
                denied_paths: Some(defaults.library.denied_paths),
                preview_limit: Some(defaults.library.preview_limit),
            }),
            stream: Some(StreamSettings {
                chunk_size: Some(defaults.stream.chunk_size),
            }),
            thumbnails: Some(ThumbnailSettings {
                dir_name: Some(defaults.thumbnails.dir_name),
                width: Some(defaults.thumbnails.width),
                height: Some(defaults.thumbnails.height),
                max_concurrent: Some(defaults.thumbnails.max_concurrent),
                sweep_interval_secs: Some(defaults.thumbnails.sweep_interval_secs),
            }),
            transcription: Some(TranscriptionSettings {
                workers: Some(defaults.transcription.workers),
                queue_capacity: Some(defaults.transcription.queue_capacity),
                default_language: Some(defaults.transcription.default_language),
                engine_command: Some(defaults.transcription.engine_command),
                engine_args: Some(defaults.transcription.engine_args),
            }),
            auth: Some(AuthSettings {
                default_user_id: Some(defaults.auth.default_user_id),
            }),
            logging: Some(LoggingSettings {
                level: defaults.log_level,
                format: Some(defaults.log_format),
            }),
        }
    }

    /// Convert to ServerConfig
    pub fn into_server_config(self) -> ServerConfig {
        let library = match self.library {
            Some(l) => {
                let d = LibraryConfig::default();
                LibraryConfig {
                    video_extensions: l
                        .video_extensions
                        .map(|exts| {
                            exts.into_iter()
                                .map(|e| e.trim_start_matches('.').to_lowercase())
                                .collect()
                        })
                        .unwrap_or(d.video_extensions),
                    denied_paths: l.denied_paths.unwrap_or(d.denied_paths),
                    preview_limit: l.preview_limit.unwrap_or(d.preview_limit),
                }
            }
            None => LibraryConfig::default(),
        };

        let stream = match self.stream {
            Some(s) => StreamConfig {
                chunk_size: s
                    .chunk_size
                    .filter(|&c| c > 0)
                    .unwrap_or(StreamConfig::default().chunk_size),
            },
            None => StreamConfig::default(),
        };

        let thumbnails = match self.thumbnails {
            Some(t) => {
                let d = ThumbnailConfig::default();
                ThumbnailConfig {
                    dir_name: t.dir_name.unwrap_or(d.dir_name),
                    width: t.width.filter(|&w| w > 0).unwrap_or(d.width),
                    height: t.height.filter(|&h| h > 0).unwrap_or(d.height),
                    max_concurrent: t.max_concurrent.filter(|&n| n > 0).unwrap_or(d.max_concurrent),
                    sweep_interval_secs: t.sweep_interval_secs.unwrap_or(d.sweep_interval_secs),
                }
            }
            None => ThumbnailConfig::default(),
        };

        let transcription = match self.transcription {
            Some(t) => {
                let d = TranscriptionConfig::default();
                TranscriptionConfig {
                    workers: t.workers.filter(|&n| n > 0).unwrap_or(d.workers),
                    queue_capacity: t.queue_capacity.filter(|&n| n > 0).unwrap_or(d.queue_capacity),
                    default_language: t.default_language.unwrap_or(d.default_language),
                    engine_command: t.engine_command.unwrap_or(d.engine_command),
                    engine_args: t.engine_args.unwrap_or(d.engine_args),
                }
            }
            None => TranscriptionConfig::default(),
        };

        let auth = AuthConfig {
            default_user_id: self
                .auth
                .and_then(|a| a.default_user_id)
                .unwrap_or(AuthConfig::default().default_user_id),
        };

        let (log_level, log_format) = match self.logging {
            Some(l) => (l.level, l.format.unwrap_or_else(|| "pretty".to_string())),
            None => ("info".to_string(), "pretty".to_string()),
        };

        ServerConfig {
            host: self.server.host,
            port: self.server.port,
            library,
            stream,
            thumbnails,
            transcription,
            auth,
            cors_enabled: self.server.cors_enabled.unwrap_or(true),
            log_level,
            log_format,
        }
    }
}

/// Generate default configuration file at the specified path
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigFile::default_config();
    config.to_file(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = ConfigFile::default_config();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.stream.as_ref().unwrap().chunk_size, Some(1024 * 1024));
    }

    #[test]
    fn test_minimal_file_uses_defaults() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[server]\nhost = \"127.0.0.1\"\nport = 9000\n")
            .unwrap();

        let config = ConfigFile::from_file(temp_file.path())
            .unwrap()
            .into_server_config();
        assert_eq!(config.socket_addr(), "127.0.0.1:9000");
        assert_eq!(config.thumbnails.dir_name, ".thumbnails");
        assert_eq!(config.transcription.default_language, "zh");
        assert!(config.cors_enabled);
    }

    #[test]
    fn test_extensions_are_normalized() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(
                b"[server]\nhost = \"0.0.0.0\"\nport = 1\n[library]\nvideo_extensions = [\".MP4\", \"webm\"]\n",
            )
            .unwrap();

        let config = ConfigFile::from_file(temp_file.path())
            .unwrap()
            .into_server_config();
        assert_eq!(config.library.video_extensions, vec!["mp4", "webm"]);
    }

    #[test]
    fn test_generate_default_config() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_path_buf();

        generate_default_config(&path).unwrap();

        let loaded = ConfigFile::from_file(&path).unwrap().into_server_config();
        assert_eq!(loaded.port, 8000);
        assert_eq!(loaded.transcription.workers, 2);
    }
}
