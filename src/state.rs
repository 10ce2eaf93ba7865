//! Application state management
//!
//! `AppState` is shared by every request handler and by the maintenance
//! loop. It owns the configuration, the persistence store, the filesystem
//! browser and the two background services (thumbnail cache and
//! transcription workers). Backends are handed in ready-made.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::error::{LibraryError, Result};
use crate::fs::{Browser, PathGuard};
use crate::store::{Source, Store};
use crate::thumbnail::{FrameGrabber, ThumbnailCache};
use crate::transcribe::{SpeechEngine, TranscriptionManager};

/// Application state shared across all requests
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,

    /// Sources, tasks and transcripts
    pub store: Arc<dyn Store>,

    /// Folder picker and source listings
    pub browser: Browser,

    /// Per-source thumbnail cache
    pub thumbnails: ThumbnailCache,

    /// Background transcription jobs
    pub transcriber: Arc<TranscriptionManager>,
}

impl AppState {
    /// Create the state and start the transcription workers. Must be called
    /// from inside a tokio runtime.
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn Store>,
        grabber: Arc<dyn FrameGrabber>,
        engine: Arc<dyn SpeechEngine>,
    ) -> Self {
        let guard = PathGuard::new(&config.library.denied_paths);
        let browser = Browser::new(guard.clone(), config.library.clone());
        let thumbnails = ThumbnailCache::new(
            config.thumbnails.clone(),
            config.library.clone(),
            grabber,
        );
        let transcriber =
            TranscriptionManager::start(&config.transcription, store.clone(), guard, engine);

        Self {
            config,
            store,
            browser,
            thumbnails,
            transcriber,
        }
    }

    pub fn guard(&self) -> &PathGuard {
        self.browser.guard()
    }

    /// Source owned by `owner_id`, or `NotFound`
    pub fn source(&self, id: u64, owner_id: u64) -> Result<Source> {
        self.store
            .get_source(id, owner_id)
            .ok_or_else(|| LibraryError::NotFound(format!("source {}", id)))
    }

    /// Canonical root of an owned source
    pub fn source_root(&self, id: u64, owner_id: u64) -> Result<PathBuf> {
        let source = self.source(id, owner_id)?;
        self.guard().canonical_root(&source.root_path)
    }

    /// Remove orphaned thumbnails under every registered source. Blocks;
    /// sources whose root has disappeared are skipped.
    pub fn sweep_thumbnails(&self) -> usize {
        let mut removed = 0;
        for source in self.store.all_sources() {
            match self.guard().canonical_root(&source.root_path) {
                Ok(root) => removed += self.thumbnails.sweep_orphans(&root),
                Err(e) => {
                    tracing::debug!(source_id = source.id, error = %e, "skipping sweep")
                }
            }
        }
        removed
    }
}
