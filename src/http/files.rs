//! Folder picker endpoints (`/files/...`)
//!
//! These take absolute paths anywhere on the machine except the denylist.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::handlers::{blocking, HttpError};
use crate::fs::{Browser, FileEntry, FolderListing, TreeNode};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct FolderQuery {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub show_hidden: bool,
}

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub path: String,
}

/// GET /files/folders
pub async fn list_folders(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FolderQuery>,
) -> Result<Json<FolderListing>, HttpError> {
    let browser = state.browser.clone();
    let listing = blocking(move || browser.list(&query.path, query.show_hidden))
        .await
        .map_err(HttpError::picker)?;
    Ok(Json(listing))
}

/// POST /files/validate
pub async fn validate_path(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ValidateRequest>,
) -> Json<Value> {
    let browser = state.browser.clone();
    let valid = blocking(move || Ok(browser.validate(&request.path)))
        .await
        .unwrap_or(false);
    Json(json!({ "valid": valid }))
}

/// GET /files/preview
pub async fn preview_files(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PathQuery>,
) -> Result<Json<Value>, HttpError> {
    let browser = state.browser.clone();
    let files: Vec<FileEntry> = blocking(move || browser.preview(&query.path))
        .await
        .map_err(HttpError::picker)?;
    Ok(Json(json!({ "files": files })))
}

/// GET /files/default-path
pub async fn default_path() -> Json<Value> {
    Json(json!({ "path": Browser::default_path() }))
}

/// GET /files/tree
pub async fn folder_tree(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FolderQuery>,
) -> Result<Json<Vec<TreeNode>>, HttpError> {
    let browser = state.browser.clone();
    let nodes = blocking(move || browser.tree(&query.path, query.show_hidden))
        .await
        .map_err(HttpError::picker)?;
    Ok(Json(nodes))
}
