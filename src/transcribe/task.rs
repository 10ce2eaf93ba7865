//! Transcription task records and their state machine
//!
//! A task moves `pending -> processing -> {success | error}`. Terminal
//! states are final and progress never moves backwards while processing;
//! every mutation goes through the methods below so the store can apply
//! them atomically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LibraryError, Result};

/// Lifecycle state of a transcription task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Success,
    Error,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Success => "success",
            TaskStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Error)
    }
}

/// One timed piece of transcript text, in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Fields supplied when a task is first persisted
#[derive(Debug, Clone)]
pub struct NewTask {
    pub source_id: u64,
    pub user_id: u64,
    pub relative_video_path: String,
    pub language: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionTask {
    pub id: u64,
    pub source_id: u64,
    pub user_id: u64,
    pub relative_video_path: String,
    pub status: TaskStatus,
    pub progress: u8,
    pub text: Option<String>,
    pub segments: Option<Vec<Segment>>,
    pub language: String,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TranscriptionTask {
    pub fn new(id: u64, new: NewTask) -> Self {
        let now = Utc::now();
        Self {
            id,
            source_id: new.source_id,
            user_id: new.user_id,
            relative_video_path: new.relative_video_path,
            status: TaskStatus::Pending,
            progress: 0,
            text: None,
            segments: None,
            language: new.language,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn transition(&mut self, to: TaskStatus) -> Result<()> {
        let allowed = matches!(
            (self.status, to),
            (TaskStatus::Pending, TaskStatus::Processing)
                | (TaskStatus::Pending, TaskStatus::Error)
                | (TaskStatus::Processing, TaskStatus::Success)
                | (TaskStatus::Processing, TaskStatus::Error)
        );
        if !allowed {
            return Err(LibraryError::InvalidTransition {
                from: self.status.as_str(),
                to: to.as_str(),
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// `pending -> processing`
    pub fn start(&mut self) -> Result<()> {
        self.transition(TaskStatus::Processing)?;
        self.progress = 0;
        Ok(())
    }

    /// Raise progress while processing. Values below the current progress
    /// are ignored and 100 is reserved for completion.
    pub fn report_progress(&mut self, percent: u8) -> Result<()> {
        if self.status != TaskStatus::Processing {
            return Err(LibraryError::InvalidTransition {
                from: self.status.as_str(),
                to: "progress",
            });
        }
        let capped = percent.min(99);
        if capped > self.progress {
            self.progress = capped;
            self.updated_at = Utc::now();
        }
        Ok(())
    }

    /// `processing -> success`
    pub fn succeed(&mut self, text: String, segments: Vec<Segment>) -> Result<()> {
        self.transition(TaskStatus::Success)?;
        self.progress = 100;
        self.text = Some(text);
        self.segments = Some(segments);
        self.error = None;
        Ok(())
    }

    /// `{pending, processing} -> error`
    pub fn fail(&mut self, message: impl Into<String>) -> Result<()> {
        self.transition(TaskStatus::Error)?;
        self.error = Some(message.into());
        self.text = None;
        self.segments = None;
        Ok(())
    }
}

/// Sort segments by start time, clip overlaps against the previous segment
/// and drop anything left empty.
pub fn normalize_segments(mut segments: Vec<Segment>) -> Vec<Segment> {
    segments.retain(|s| s.start.is_finite() && s.end.is_finite());
    segments.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut out: Vec<Segment> = Vec::with_capacity(segments.len());
    for mut seg in segments {
        seg.text = seg.text.trim().to_string();
        if let Some(prev) = out.last() {
            if seg.start < prev.end {
                seg.start = prev.end;
            }
        }
        if seg.end <= seg.start || seg.text.is_empty() {
            continue;
        }
        out.push(seg);
    }
    out
}

/// Join segment texts into the full transcript text
pub fn join_text(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}
