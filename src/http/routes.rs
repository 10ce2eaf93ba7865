//! Axum router configuration

use axum::{
    http::{header, HeaderName, Method},
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

use super::files::{default_path, folder_tree, list_folders, preview_files, validate_path};
use super::handlers::{health_check, version_check, USER_ID_HEADER};
use super::middleware::request_logger;
use super::transcripts::{create_transcription, existing_transcript, transcription_status};
use super::videos::{
    create_source, delete_source, list_sources, related_videos, source_contents, stream_video,
    thumbnail,
};

/// Create the Axum router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors_enabled = state.config.cors_enabled;

    let mut router = Router::new()
        // Health and version endpoints
        .route("/health", get(health_check))
        .route("/version", get(version_check))
        // Folder picker
        .route("/files/folders", get(list_folders))
        .route("/files/validate", post(validate_path))
        .route("/files/preview", get(preview_files))
        .route("/files/default-path", get(default_path))
        .route("/files/tree", get(folder_tree))
        // Sources
        .route("/videos/sources", get(list_sources).post(create_source))
        .route("/videos/sources/{id}", delete(delete_source))
        .route("/videos/sources/{id}/contents", get(source_contents))
        // Per-video resources
        .route("/videos/stream/{source_id}/{*relative_path}", get(stream_video))
        .route("/videos/thumbnail/{source_id}/{*relative_path}", get(thumbnail))
        .route("/videos/related/{source_id}/{*relative_path}", get(related_videos))
        // Transcription
        .route("/videos/transcribe", post(create_transcription))
        .route("/videos/transcript/{task_id}", get(transcription_status))
        .route(
            "/videos/transcript/exists/{source_id}/{*video_path}",
            get(existing_transcript),
        )
        // Middleware
        .layer(middleware::from_fn(request_logger))
        .layer(TraceLayer::new_for_http());

    if cors_enabled {
        // Range and the caller header must survive preflight for players
        // served from another origin.
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::DELETE,
                Method::OPTIONS,
                Method::HEAD,
            ])
            .allow_headers([
                header::ACCEPT,
                header::RANGE,
                header::CONTENT_TYPE,
                header::ORIGIN,
                HeaderName::from_static(USER_ID_HEADER),
            ])
            .expose_headers([
                header::CONTENT_RANGE,
                header::ACCEPT_RANGES,
                header::CONTENT_LENGTH,
            ])
            .max_age(Duration::from_secs(3600));
        router = router.layer(cors);
    }

    router.with_state(state)
}
