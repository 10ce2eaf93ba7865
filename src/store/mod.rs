//! Persistence store
//!
//! Sources, transcription tasks and transcripts live behind the [`Store`]
//! trait so the HTTP layer and the job manager never depend on a concrete
//! backend. [`MemoryStore`] is the in-process implementation.

pub mod memory;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::error::Result;
use crate::transcribe::task::{NewTask, Segment, TranscriptionTask};

pub use memory::MemoryStore;

/// Persistence-layer errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("duplicate source path for owner {owner_id}: {path}")]
    DuplicateSource { owner_id: u64, path: String },
}

/// A registered media folder
#[derive(Debug, Clone, Serialize)]
pub struct Source {
    pub id: u64,
    pub name: String,
    pub root_path: PathBuf,
    pub owner_id: u64,
    pub created_at: DateTime<Utc>,
}

/// Completed transcription output (append-only)
#[derive(Debug, Clone, Serialize)]
pub struct VideoTranscript {
    pub id: u64,
    pub source_id: u64,
    pub relative_video_path: String,
    pub title: String,
    pub text: String,
    pub segments: Vec<Segment>,
    pub language: String,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when a transcript is appended
#[derive(Debug, Clone)]
pub struct NewTranscript {
    pub source_id: u64,
    pub relative_video_path: String,
    pub title: String,
    pub text: String,
    pub segments: Vec<Segment>,
    pub language: String,
}

/// Task mutation applied atomically by [`Store::update_task`]
pub type TaskUpdate<'a> = &'a mut dyn FnMut(&mut TranscriptionTask) -> Result<()>;

pub trait Store: Send + Sync {
    /// Register a source. The caller has already checked the directory.
    fn create_source(&self, owner_id: u64, name: &str, root_path: &Path) -> Result<Source>;

    fn list_sources(&self, owner_id: u64) -> Vec<Source>;

    /// Every registered source, across owners (maintenance only)
    fn all_sources(&self) -> Vec<Source>;

    fn get_source(&self, id: u64, owner_id: u64) -> Option<Source>;

    fn delete_source(&self, id: u64, owner_id: u64) -> bool;

    fn insert_task(&self, task: NewTask) -> Result<TranscriptionTask>;

    fn get_task(&self, id: u64) -> Option<TranscriptionTask>;

    /// Apply `update` to the task; nothing is written when it fails.
    fn update_task(&self, id: u64, update: TaskUpdate<'_>) -> Result<TranscriptionTask>;

    fn insert_transcript(&self, transcript: NewTranscript) -> Result<VideoTranscript>;

    /// Newest transcript recorded for `(source_id, relative_video_path)`
    fn find_transcript(&self, source_id: u64, relative_video_path: &str)
        -> Option<VideoTranscript>;
}
