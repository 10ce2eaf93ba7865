//! In-process store backed by `DashMap`

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;

use super::{NewTranscript, Source, Store, StoreError, TaskUpdate, VideoTranscript};
use crate::error::{LibraryError, Result};
use crate::transcribe::task::{NewTask, TranscriptionTask};

pub struct MemoryStore {
    sources: DashMap<u64, Source>,
    tasks: DashMap<u64, TranscriptionTask>,
    transcripts: DashMap<u64, VideoTranscript>,
    /// Serializes the duplicate check with the insert
    source_registration: Mutex<()>,
    next_source_id: AtomicU64,
    next_task_id: AtomicU64,
    next_transcript_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            sources: DashMap::new(),
            tasks: DashMap::new(),
            transcripts: DashMap::new(),
            source_registration: Mutex::new(()),
            next_source_id: AtomicU64::new(1),
            next_task_id: AtomicU64::new(1),
            next_transcript_id: AtomicU64::new(1),
        }
    }

    /// Number of transcripts recorded for a video
    pub fn transcript_count(&self, source_id: u64, relative_video_path: &str) -> usize {
        self.transcripts
            .iter()
            .filter(|t| t.source_id == source_id && t.relative_video_path == relative_video_path)
            .count()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn create_source(&self, owner_id: u64, name: &str, root_path: &Path) -> Result<Source> {
        let _guard = self.source_registration.lock();

        let duplicate = self
            .sources
            .iter()
            .any(|s| s.owner_id == owner_id && s.root_path == root_path);
        if duplicate {
            return Err(StoreError::DuplicateSource {
                owner_id,
                path: root_path.display().to_string(),
            }
            .into());
        }

        let source = Source {
            id: self.next_source_id.fetch_add(1, Ordering::Relaxed),
            name: name.to_string(),
            root_path: root_path.to_path_buf(),
            owner_id,
            created_at: Utc::now(),
        };
        self.sources.insert(source.id, source.clone());
        Ok(source)
    }

    fn list_sources(&self, owner_id: u64) -> Vec<Source> {
        let mut sources: Vec<Source> = self
            .sources
            .iter()
            .filter(|s| s.owner_id == owner_id)
            .map(|s| s.clone())
            .collect();
        sources.sort_by_key(|s| s.id);
        sources
    }

    fn all_sources(&self) -> Vec<Source> {
        self.sources.iter().map(|s| s.clone()).collect()
    }

    fn get_source(&self, id: u64, owner_id: u64) -> Option<Source> {
        self.sources
            .get(&id)
            .filter(|s| s.owner_id == owner_id)
            .map(|s| s.clone())
    }

    fn delete_source(&self, id: u64, owner_id: u64) -> bool {
        self.sources
            .remove_if(&id, |_, s| s.owner_id == owner_id)
            .is_some()
    }

    fn insert_task(&self, task: NewTask) -> Result<TranscriptionTask> {
        let id = self.next_task_id.fetch_add(1, Ordering::Relaxed);
        let task = TranscriptionTask::new(id, task);
        self.tasks.insert(id, task.clone());
        Ok(task)
    }

    fn get_task(&self, id: u64) -> Option<TranscriptionTask> {
        self.tasks.get(&id).map(|t| t.clone())
    }

    fn update_task(&self, id: u64, update: TaskUpdate<'_>) -> Result<TranscriptionTask> {
        let mut entry = self
            .tasks
            .get_mut(&id)
            .ok_or_else(|| LibraryError::NotFound(format!("transcription task {}", id)))?;

        let mut next = entry.clone();
        update(&mut next)?;
        *entry = next.clone();
        Ok(next)
    }

    fn insert_transcript(&self, transcript: NewTranscript) -> Result<VideoTranscript> {
        let record = VideoTranscript {
            id: self.next_transcript_id.fetch_add(1, Ordering::Relaxed),
            source_id: transcript.source_id,
            relative_video_path: transcript.relative_video_path,
            title: transcript.title,
            text: transcript.text,
            segments: transcript.segments,
            language: transcript.language,
            created_at: Utc::now(),
        };
        self.transcripts.insert(record.id, record.clone());
        Ok(record)
    }

    fn find_transcript(
        &self,
        source_id: u64,
        relative_video_path: &str,
    ) -> Option<VideoTranscript> {
        self.transcripts
            .iter()
            .filter(|t| t.source_id == source_id && t.relative_video_path == relative_video_path)
            .max_by_key(|t| t.id)
            .map(|t| t.clone())
    }
}
