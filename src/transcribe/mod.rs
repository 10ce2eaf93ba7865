//! Transcription jobs: task state machine, speech engines and the worker pool

pub mod engine;
pub mod manager;
pub mod task;

pub use engine::{CommandEngine, EngineError, SpeechEngine};
pub use manager::TranscriptionManager;
pub use task::{Segment, TaskStatus, TranscriptionTask};
