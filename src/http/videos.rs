//! Source-scoped endpoints (`/videos/...`)
//!
//! Every path taken from a request is relative to a source the caller owns
//! and goes through the path guard before it touches the disk.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures_util::future::join_all;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use super::handlers::{blocking, Caller, HttpError};
use crate::error::LibraryError;
use crate::fs::browser::DEFAULT_PAGE_SIZE;
use crate::fs::{relative_display, ContentItem, ContentsPage, RelatedVideo, ScannedEntry};
use crate::state::AppState;
use crate::store::Source;
use crate::thumbnail::cache::data_url;

#[derive(Debug, Deserialize)]
pub struct NewSourceRequest {
    #[serde(default)]
    pub name: String,
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct ContentsQuery {
    #[serde(default)]
    pub path: String,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

/// GET /videos/sources
pub async fn list_sources(State(state): State<Arc<AppState>>, caller: Caller) -> Json<Vec<Source>> {
    Json(state.store.list_sources(caller.0))
}

/// POST /videos/sources
pub async fn create_source(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(request): Json<NewSourceRequest>,
) -> Result<(StatusCode, Json<Source>), HttpError> {
    let guard = state.guard().clone();
    let requested = request.path.clone();
    let root = blocking(move || {
        let dir = guard.check(&requested)?;
        if !dir.is_dir() {
            return Err(LibraryError::BadRequest(format!(
                "not an existing folder: {}",
                requested
            )));
        }
        guard.canonical_root(&dir)
    })
    .await?;

    let name = match request.name.trim() {
        "" => root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string()),
        name => name.to_string(),
    };
    let source = state.store.create_source(caller.0, &name, &root)?;
    info!(source_id = source.id, owner_id = caller.0, path = %root.display(), "source registered");
    Ok((StatusCode::CREATED, Json(source)))
}

/// DELETE /videos/sources/{id}
pub async fn delete_source(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<u64>,
) -> Result<Json<Value>, HttpError> {
    if !state.store.delete_source(id, caller.0) {
        return Err(HttpError::not_found(format!("source {} not found", id)));
    }
    info!(source_id = id, owner_id = caller.0, "source deleted");
    Ok(Json(json!({ "message": "source deleted" })))
}

/// GET /videos/sources/{id}/contents
pub async fn source_contents(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<u64>,
    Query(query): Query<ContentsQuery>,
) -> Result<Json<ContentsPage<ContentItem>>, HttpError> {
    let root = state.source_root(id, caller.0)?;

    let browser = state.browser.clone();
    let scan_root = root.clone();
    let page = blocking(move || {
        browser.contents(
            &scan_root,
            &query.path,
            query.page.unwrap_or(1),
            query.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        )
    })
    .await?;

    // only the visible page is probed and thumbnailed
    let items = join_all(
        page.items
            .into_iter()
            .map(|entry| describe(&state, entry, root.clone())),
    )
    .await;

    Ok(Json(ContentsPage {
        items,
        total: page.total,
        page: page.page,
        page_size: page.page_size,
    }))
}

async fn describe(state: &AppState, entry: ScannedEntry, root: PathBuf) -> ContentItem {
    if entry.is_dir {
        return ContentItem::Folder {
            name: entry.name,
            path: entry.relative_path,
            size: entry.size,
            modified_time: entry.modified,
        };
    }

    let probe_path = entry.absolute_path.clone();
    let duration = match tokio::task::spawn_blocking(move || {
        crate::ffmpeg::probe_duration(&probe_path)
    })
    .await
    {
        Ok(Ok(duration)) => duration,
        Ok(Err(e)) => {
            debug!(path = %entry.relative_path, error = %e, "no duration");
            None
        }
        Err(_) => None,
    };
    let thumbnail = state
        .thumbnails
        .get_or_create(entry.absolute_path.clone(), root)
        .await
        .map(|jpeg| data_url(&jpeg));

    ContentItem::Video {
        name: entry.name,
        path: entry.relative_path,
        size: entry.size,
        modified_time: entry.modified,
        duration,
        thumbnail,
    }
}

/// GET /videos/stream/{source_id}/{*relative_path}
pub async fn stream_video(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path((source_id, relative_path)): Path<(u64, String)>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    let path = resolve_video(&state, caller, source_id, relative_path).await?;

    let range = headers
        .get(header::RANGE)
        .map(|v| {
            v.to_str()
                .map_err(|_| LibraryError::InvalidRange("non-ASCII range header".to_string()))
        })
        .transpose()?;

    let response =
        crate::stream::stream_file(&path, range, state.config.stream.chunk_size).await?;
    Ok(response)
}

/// Resolve a source-relative path on the blocking pool
async fn resolve_video(
    state: &Arc<AppState>,
    caller: Caller,
    source_id: u64,
    relative_path: String,
) -> Result<PathBuf, LibraryError> {
    let state = state.clone();
    blocking(move || {
        let root = state.source_root(source_id, caller.0)?;
        state.guard().resolve(&root, &relative_path)
    })
    .await
}

/// GET /videos/thumbnail/{source_id}/{*relative_path}
pub async fn thumbnail(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path((source_id, relative_path)): Path<(u64, String)>,
) -> Result<Response, HttpError> {
    let is_video = state.browser.library().is_video_name(&relative_path);
    let (root, video, is_file) = {
        let state = state.clone();
        blocking(move || {
            let root = state.source_root(source_id, caller.0)?;
            let video = state.guard().resolve(&root, &relative_path)?;
            let is_file = video.is_file();
            Ok((root, video, is_file))
        })
        .await?
    };
    if !is_file || !is_video {
        return Err(HttpError::not_found(format!(
            "video {} not found",
            relative_display(&root, &video)
        )));
    }

    let jpeg = state
        .thumbnails
        .get_or_create(video, root)
        .await
        .ok_or_else(|| HttpError::not_found("thumbnail unavailable"))?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/jpeg"),
            (header::CACHE_CONTROL, "max-age=3600"),
        ],
        jpeg,
    )
        .into_response())
}

/// GET /videos/related/{source_id}/{*relative_path}
pub async fn related_videos(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path((source_id, relative_path)): Path<(u64, String)>,
) -> Result<Json<Vec<RelatedVideo>>, HttpError> {
    let root = state.source_root(source_id, caller.0)?;
    let browser = state.browser.clone();
    let related = blocking(move || browser.related(&root, &relative_path)).await?;
    Ok(Json(related))
}
