//! Background transcription jobs
//!
//! Jobs go through a bounded channel to a fixed set of workers. A full
//! channel rejects new jobs instead of growing. Each worker runs the speech
//! engine on the blocking pool and records the outcome through the store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use super::engine::SpeechEngine;
use super::task::{join_text, normalize_segments, NewTask, Segment, TranscriptionTask};
use crate::config::TranscriptionConfig;
use crate::error::{LibraryError, Result};
use crate::fs::{relative_display, PathGuard};
use crate::store::{NewTranscript, Store, VideoTranscript};

/// One queued unit of work
#[derive(Debug)]
struct Job {
    task_id: u64,
    source_id: u64,
    relative_video_path: String,
    absolute_path: PathBuf,
    language: String,
}

pub struct TranscriptionManager {
    store: Arc<dyn Store>,
    guard: PathGuard,
    queue: mpsc::Sender<Job>,
    default_language: String,
}

impl TranscriptionManager {
    /// Build the manager and spawn its workers on the current runtime.
    pub fn start(
        config: &TranscriptionConfig,
        store: Arc<dyn Store>,
        guard: PathGuard,
        engine: Arc<dyn SpeechEngine>,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let workers = config.workers.max(1);
        for worker_id in 0..workers {
            let rx = rx.clone();
            let store = store.clone();
            let engine = engine.clone();
            tokio::spawn(async move {
                loop {
                    // hold the lock only while waiting for the next job
                    let job = { rx.lock().await.recv().await };
                    match job {
                        Some(job) => run_job(&store, &engine, job).await,
                        None => break,
                    }
                }
                debug!(worker_id, "transcription worker stopped");
            });
        }
        info!(
            workers,
            queue_capacity = config.queue_capacity,
            "transcription workers started"
        );

        Arc::new(Self {
            store,
            guard,
            queue: tx,
            default_language: config.default_language.clone(),
        })
    }

    /// Validate the request, persist a pending task and queue it. Returns
    /// as soon as the job is queued.
    pub async fn create(
        &self,
        owner_id: u64,
        source_id: u64,
        relative_path: &str,
        language: Option<&str>,
    ) -> Result<TranscriptionTask> {
        let source = self
            .store
            .get_source(source_id, owner_id)
            .ok_or_else(|| LibraryError::NotFound(format!("source {}", source_id)))?;

        let absolute_path = self.guard.resolve(&source.root_path, relative_path)?;
        if !absolute_path.is_file() {
            return Err(LibraryError::NotFound(relative_path.to_string()));
        }
        let root = self.guard.canonical_root(&source.root_path)?;
        let relative_video_path = relative_display(&root, &absolute_path);

        let language = language
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(&self.default_language)
            .to_string();

        // reserve before persisting so a rejected job leaves no task behind
        let permit = match self.queue.try_reserve() {
            Ok(permit) => permit,
            Err(mpsc::error::TrySendError::Full(())) => {
                warn!(source_id, path = %relative_video_path, "transcription queue full");
                return Err(LibraryError::QueueFull);
            }
            Err(mpsc::error::TrySendError::Closed(())) => {
                return Err(LibraryError::Internal(
                    "transcription workers are not running".to_string(),
                ));
            }
        };

        let task = self.store.insert_task(NewTask {
            source_id,
            user_id: owner_id,
            relative_video_path: relative_video_path.clone(),
            language: language.clone(),
        })?;

        permit.send(Job {
            task_id: task.id,
            source_id,
            relative_video_path,
            absolute_path,
            language,
        });
        info!(task_id = task.id, source_id, "transcription queued");

        Ok(task)
    }

    /// Task state for its owner. Foreign tasks look the same as unknown ones.
    pub fn get_status(&self, task_id: u64, owner_id: u64) -> Result<TranscriptionTask> {
        self.store
            .get_task(task_id)
            .filter(|t| t.user_id == owner_id)
            .ok_or_else(|| LibraryError::NotFound(format!("transcription task {}", task_id)))
    }

    /// Newest transcript for a video, `None` when there is none or the
    /// source does not belong to the caller.
    pub fn check_existing(
        &self,
        owner_id: u64,
        source_id: u64,
        video_path: &str,
    ) -> Result<Option<VideoTranscript>> {
        let source = match self.store.get_source(source_id, owner_id) {
            Some(source) => source,
            None => return Ok(None),
        };
        let root = self.guard.canonical_root(&source.root_path)?;
        let absolute = self.guard.resolve(&root, video_path)?;
        let relative = relative_display(&root, &absolute);
        Ok(self.store.find_transcript(source_id, &relative))
    }
}

async fn run_job(store: &Arc<dyn Store>, engine: &Arc<dyn SpeechEngine>, job: Job) {
    let task_id = job.task_id;

    if let Err(e) = store.update_task(task_id, &mut |t: &mut TranscriptionTask| t.start()) {
        error!(task_id, error = %e, "could not start transcription task");
        return;
    }
    info!(task_id, path = %job.relative_video_path, language = %job.language, "transcription started");

    let result = {
        let store = store.clone();
        let engine = engine.clone();
        let path = job.absolute_path.clone();
        let language = job.language.clone();
        tokio::task::spawn_blocking(move || {
            let report = |fraction: f32| {
                let percent = (fraction.clamp(0.0, 1.0) * 100.0) as u8;
                if let Err(e) =
                    store.update_task(task_id, &mut |t: &mut TranscriptionTask| {
                        t.report_progress(percent)
                    })
                {
                    debug!(task_id, error = %e, "progress update dropped");
                }
            };
            engine.transcribe(&path, &language, &report)
        })
        .await
    };

    let outcome = match result {
        Ok(Ok(segments)) => record_success(store, &job, segments),
        Ok(Err(e)) => Err(LibraryError::from(e)),
        Err(e) => Err(LibraryError::Internal(format!("engine task aborted: {}", e))),
    };

    match outcome {
        Ok(()) => info!(task_id, "transcription finished"),
        Err(e) => {
            error!(task_id, error = %e, "transcription failed");
            let message = e.to_string();
            if let Err(e) =
                store.update_task(task_id, &mut |t: &mut TranscriptionTask| t.fail(message.clone()))
            {
                error!(task_id, error = %e, "could not record transcription failure");
            }
        }
    }
}

fn record_success(store: &Arc<dyn Store>, job: &Job, segments: Vec<Segment>) -> Result<()> {
    let segments = normalize_segments(segments);
    let text = join_text(&segments);

    // appended inside the task update; a task that cannot move to success
    // leaves no transcript behind
    store.update_task(job.task_id, &mut |t: &mut TranscriptionTask| {
        t.succeed(text.clone(), segments.clone())?;
        store.insert_transcript(NewTranscript {
            source_id: job.source_id,
            relative_video_path: job.relative_video_path.clone(),
            title: video_title(&job.relative_video_path),
            text: text.clone(),
            segments: segments.clone(),
            language: job.language.clone(),
        })?;
        Ok(())
    })?;
    Ok(())
}

fn video_title(relative_video_path: &str) -> String {
    Path::new(relative_video_path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| relative_video_path.to_string())
}
