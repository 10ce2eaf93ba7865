//! HTTP server module
//!
//! This module handles HTTP request routing and handling:
//! - Folder picker endpoints under `/files`
//! - Source listings, streaming and thumbnails under `/videos`
//! - Transcription jobs under `/videos/transcribe` and `/videos/transcript`
//! - JSON error bodies, caller identification and request logging

pub mod files;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod transcripts;
pub mod videos;

pub use routes::create_router;
