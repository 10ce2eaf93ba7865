//! Transcription endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::handlers::{Caller, HttpError};
use crate::store::VideoTranscript;
use crate::state::AppState;
use crate::transcribe::{Segment, TaskStatus, TranscriptionTask};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscribeRequest {
    pub source_id: u64,
    pub relative_path: String,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscribeResponse {
    pub task_id: u64,
    pub status: &'static str,
    pub message: String,
}

/// Polling view of a task. Text only on success, error only on failure.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusResponse {
    pub task_id: u64,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub segments: Vec<Segment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub progress: u8,
}

impl From<TranscriptionTask> for TaskStatusResponse {
    fn from(task: TranscriptionTask) -> Self {
        let (text, segments) = match task.status {
            TaskStatus::Success => (task.text, task.segments.unwrap_or_default()),
            _ => (None, Vec::new()),
        };
        let error = match task.status {
            TaskStatus::Error => task.error,
            _ => None,
        };
        Self {
            task_id: task.id,
            status: task.status,
            text,
            segments,
            error,
            progress: task.progress,
        }
    }
}

/// Stored transcript as returned by the existence check
#[derive(Debug, Serialize)]
pub struct ExistingTranscript {
    pub status: TaskStatus,
    pub title: String,
    pub text: String,
    pub segments: Vec<Segment>,
    pub language: String,
    pub progress: u8,
}

impl From<VideoTranscript> for ExistingTranscript {
    fn from(t: VideoTranscript) -> Self {
        Self {
            status: TaskStatus::Success,
            title: t.title,
            text: t.text,
            segments: t.segments,
            language: t.language,
            progress: 100,
        }
    }
}

/// POST /videos/transcribe
pub async fn create_transcription(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(request): Json<TranscribeRequest>,
) -> Result<Json<TranscribeResponse>, HttpError> {
    let task = state
        .transcriber
        .create(
            caller.0,
            request.source_id,
            &request.relative_path,
            request.language.as_deref(),
        )
        .await?;

    Ok(Json(TranscribeResponse {
        task_id: task.id,
        status: TaskStatus::Processing.as_str(),
        message: "transcription started".to_string(),
    }))
}

/// GET /videos/transcript/{task_id}
pub async fn transcription_status(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(task_id): Path<u64>,
) -> Result<Json<TaskStatusResponse>, HttpError> {
    let task = state.transcriber.get_status(task_id, caller.0)?;
    Ok(Json(task.into()))
}

/// GET /videos/transcript/exists/{source_id}/{*video_path}
pub async fn existing_transcript(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path((source_id, video_path)): Path<(u64, String)>,
) -> Result<Json<Option<ExistingTranscript>>, HttpError> {
    let transcriber = state.transcriber.clone();
    let found = super::handlers::blocking(move || {
        transcriber.check_existing(caller.0, source_id, &video_path)
    })
    .await?;
    Ok(Json(found.map(Into::into)))
}
