//! End-to-end integration tests
//!
//! Every scenario goes through the real router with `oneshot`, against a
//! temporary source directory.

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use crate::http::create_router;
use crate::integration::fixtures::{
    test_library, test_library_with, wait_for_task, ScriptedEngine, TestLibrary, OWNER,
    VIDEO_SIZE,
};

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

async fn send(app: &Router, request: Request<Body>) -> Reply {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    Reply {
        status,
        headers,
        body,
    }
}

async fn get(app: &Router, uri: &str) -> Reply {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn get_as(app: &Router, uri: &str, user: u64) -> Reply {
    let request = Request::get(uri)
        .header("X-User-Id", user.to_string())
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

async fn post_json(app: &Router, uri: &str, body: Value) -> Reply {
    let request = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

fn app(lib: &TestLibrary) -> Router {
    create_router(lib.state.clone())
}

#[tokio::test]
async fn test_stream_full_and_ranged() {
    let lib = test_library().await;
    let app = app(&lib);
    let data = lib.video_bytes();
    let base = format!("/videos/stream/{}/a.mp4", lib.source.id);

    let reply = get(&app, &base).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.headers[header::CONTENT_LENGTH], VIDEO_SIZE.to_string().as_str());
    assert_eq!(reply.headers[header::ACCEPT_RANGES], "bytes");
    assert_eq!(reply.headers[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(&reply.body[..], &data[..]);

    let request = Request::get(&base)
        .header(header::RANGE, "bytes=100-199")
        .body(Body::empty())
        .unwrap();
    let reply = send(&app, request).await;
    assert_eq!(reply.status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(reply.headers[header::CONTENT_RANGE], "bytes 100-199/1000");
    assert_eq!(reply.headers[header::CONTENT_LENGTH], "100");
    assert_eq!(&reply.body[..], &data[100..200]);

    let request = Request::get(&base)
        .header(header::RANGE, "bytes=100-")
        .body(Body::empty())
        .unwrap();
    let reply = send(&app, request).await;
    assert_eq!(reply.status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(reply.headers[header::CONTENT_RANGE], "bytes 100-999/1000");
    assert_eq!(&reply.body[..], &data[100..]);
}

#[tokio::test]
async fn test_stream_rejections() {
    let lib = test_library().await;
    let app = app(&lib);
    let id = lib.source.id;

    let request = Request::get(format!("/videos/stream/{}/a.mp4", id))
        .header(header::RANGE, "bytes=5000-")
        .body(Body::empty())
        .unwrap();
    let reply = send(&app, request).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(reply.json()["detail"].is_string());

    let reply = get(&app, &format!("/videos/stream/{}/..%2F..%2Fetc%2Fpasswd", id)).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = get(&app, &format!("/videos/stream/{}/missing.mp4", id)).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    // another owner cannot see the source at all
    let reply = get_as(&app, &format!("/videos/stream/{}/a.mp4", id), OWNER + 1).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[cfg(unix)]
#[tokio::test]
async fn test_stream_rejects_symlink_after_missing_dir() {
    let lib = test_library().await;
    let app = app(&lib);
    let id = lib.source.id;

    let outside = tempfile::tempdir().unwrap();
    std::fs::write(outside.path().join("secret.txt"), b"secret").unwrap();
    std::os::unix::fs::symlink(outside.path(), lib.root().join("up")).unwrap();

    let reply = get(&app, &format!("/videos/stream/{}/nope/%2E%2E/up/secret.txt", id)).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(!reply.body.starts_with(b"secret"));

    let reply = get(&app, &format!("/videos/stream/{}/up/secret.txt", id)).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_contents_pages_and_thumbnails() {
    let lib = test_library().await;
    let app = app(&lib);
    let uri = format!("/videos/sources/{}/contents", lib.source.id);

    let reply = get(&app, &uri).await;
    assert_eq!(reply.status, StatusCode::OK);
    let page = reply.json();
    assert_eq!(page["total"], 3);
    assert_eq!(page["page"], 1);
    let items = page["items"].as_array().unwrap();
    let names: Vec<&str> = items.iter().map(|i| i["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["a.mp4", "b.mkv", "movies"]);

    assert_eq!(items[0]["type"], "video");
    assert_eq!(items[0]["path"], "a.mp4");
    assert_eq!(items[0]["size"], VIDEO_SIZE as u64);
    assert!(items[0]["thumbnail"]
        .as_str()
        .unwrap()
        .starts_with("data:image/jpeg;base64,"));
    assert_eq!(items[2]["type"], "folder");
    assert!(items[2].get("thumbnail").is_none());
    assert_eq!(lib.grabber.calls(), 2);

    // the second listing is served from the cache
    let reply = get(&app, &uri).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(lib.grabber.calls(), 2);
    assert!(lib.root().join(".thumbnails").join("a.jpg").is_file());

    let reply = get(&app, &format!("{}?page=2&page_size=2", uri)).await;
    let page = reply.json();
    assert_eq!(page["total"], 3);
    assert_eq!(page["items"].as_array().unwrap().len(), 1);
    assert_eq!(page["items"][0]["name"], "movies");

    let reply = get(&app, &format!("{}?path=movies", uri)).await;
    let page = reply.json();
    assert_eq!(page["items"][0]["path"], "movies/c.mp4");

    let reply = get(&app, &format!("{}?path=nowhere", uri)).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = get(&app, "/videos/sources/999/contents").await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[cfg(unix)]
#[tokio::test]
async fn test_contents_skips_broken_entries() {
    let lib = test_library().await;
    std::os::unix::fs::symlink(
        lib.root().join("does-not-exist.mp4"),
        lib.root().join("broken.mp4"),
    )
    .unwrap();
    let app = app(&lib);

    let reply = get(&app, &format!("/videos/sources/{}/contents", lib.source.id)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["total"], 3);
}

#[tokio::test]
async fn test_thumbnail_and_related() {
    let lib = test_library().await;
    let app = app(&lib);
    let id = lib.source.id;

    let reply = get(&app, &format!("/videos/thumbnail/{}/a.mp4", id)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.headers[header::CONTENT_TYPE], "image/jpeg");
    assert_eq!(&reply.body[..2], &[0xFF, 0xD8]);

    let reply = get(&app, &format!("/videos/thumbnail/{}/notes.txt", id)).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = get(&app, &format!("/videos/related/{}/a.mp4", id)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json(), json!([{ "name": "b.mkv", "path": "b.mkv" }]));

    let reply = get(&app, &format!("/videos/related/{}/..%2Fa.mp4", id)).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_source_registration() {
    let lib = test_library().await;
    let app = app(&lib);
    let other = tempfile::TempDir::new().unwrap();
    let other_path = other.path().display().to_string();

    let reply = post_json(&app, "/videos/sources", json!({ "name": "films", "path": other_path })).await;
    assert_eq!(reply.status, StatusCode::CREATED);
    let created = reply.json();
    assert_eq!(created["name"], "films");
    let new_id = created["id"].as_u64().unwrap();

    let reply = post_json(&app, "/videos/sources", json!({ "name": "again", "path": other_path })).await;
    assert_eq!(reply.status, StatusCode::CONFLICT);

    let missing = other.path().join("missing").display().to_string();
    let reply = post_json(&app, "/videos/sources", json!({ "name": "x", "path": missing })).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = get(&app, "/videos/sources").await;
    assert_eq!(reply.json().as_array().unwrap().len(), 2);
    let reply = get_as(&app, "/videos/sources", OWNER + 1).await;
    assert_eq!(reply.json(), json!([]));

    let request = Request::delete(format!("/videos/sources/{}", new_id))
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, request).await.status, StatusCode::OK);
    let request = Request::delete(format!("/videos/sources/{}", new_id))
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, request).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_transcription_flow() {
    let lib = test_library().await;
    let app = app(&lib);
    let id = lib.source.id;

    let reply = get(&app, &format!("/videos/transcript/exists/{}/a.mp4", id)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json(), Value::Null);

    let reply = post_json(
        &app,
        "/videos/transcribe",
        json!({ "sourceId": id, "relativePath": "a.mp4", "language": "en" }),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    let created = reply.json();
    assert_eq!(created["status"], "processing");
    let task_id = created["taskId"].as_u64().unwrap();

    wait_for_task(&lib.state, task_id, OWNER).await;

    let reply = get(&app, &format!("/videos/transcript/{}", task_id)).await;
    assert_eq!(reply.status, StatusCode::OK);
    let status = reply.json();
    assert_eq!(status["status"], "success");
    assert_eq!(status["progress"], 100);
    assert_eq!(status["text"], "hello world");
    assert_eq!(status["segments"][0]["text"], "hello");
    assert_eq!(status["segments"][1]["start"], 1.5);
    assert!(status.get("error").is_none());

    let reply = get(&app, &format!("/videos/transcript/exists/{}/a.mp4", id)).await;
    let existing = reply.json();
    assert_eq!(existing["status"], "success");
    assert_eq!(existing["text"], "hello world");
    assert_eq!(existing["progress"], 100);

    // tasks are private to their owner
    let reply = get_as(&app, &format!("/videos/transcript/{}", task_id), OWNER + 1).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    let reply = get_as(&app, &format!("/videos/transcript/exists/{}/a.mp4", id), OWNER + 1).await;
    assert_eq!(reply.json(), Value::Null);
}

#[tokio::test]
async fn test_transcription_rejections_and_failure() {
    let lib = test_library_with(ScriptedEngine::failing("model not loaded")).await;
    let app = app(&lib);
    let id = lib.source.id;

    let reply = post_json(
        &app,
        "/videos/transcribe",
        json!({ "sourceId": id, "relativePath": "../../etc/passwd" }),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = post_json(
        &app,
        "/videos/transcribe",
        json!({ "sourceId": id, "relativePath": "missing.mp4" }),
    )
    .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = post_json(
        &app,
        "/videos/transcribe",
        json!({ "sourceId": 999, "relativePath": "a.mp4" }),
    )
    .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = post_json(
        &app,
        "/videos/transcribe",
        json!({ "sourceId": id, "relativePath": "a.mp4" }),
    )
    .await;
    let task_id = reply.json()["taskId"].as_u64().unwrap();
    wait_for_task(&lib.state, task_id, OWNER).await;

    let status = get(&app, &format!("/videos/transcript/{}", task_id)).await.json();
    assert_eq!(status["status"], "error");
    assert!(status["error"].as_str().unwrap().contains("model not loaded"));
    assert!(status.get("text").is_none());
    assert_eq!(status["segments"], json!([]));

    let reply = get(&app, &format!("/videos/transcript/exists/{}/a.mp4", id)).await;
    assert_eq!(reply.json(), Value::Null);
}

#[tokio::test]
async fn test_folder_picker() {
    let lib = test_library().await;
    let app = app(&lib);
    let root = lib.root().display().to_string();

    let reply = post_json(&app, "/files/validate", json!({ "path": root })).await;
    assert_eq!(reply.json(), json!({ "valid": true }));
    let missing = lib.root().join("missing").display().to_string();
    let reply = post_json(&app, "/files/validate", json!({ "path": missing })).await;
    assert_eq!(reply.json(), json!({ "valid": false }));

    let uri = format!("/files/folders?path={}", root);
    let listing = get(&app, &uri).await.json();
    let folders = listing["folders"].as_array().unwrap();
    assert_eq!(folders.len(), 1);
    assert_eq!(folders[0]["name"], "movies");
    assert_eq!(folders[0]["video_count"], 1);

    let reply = get(&app, &format!("/files/preview?path={}", root)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["files"].as_array().unwrap().len(), 4);

    let nodes = get(&app, &format!("/files/tree?path={}", root)).await.json();
    assert_eq!(nodes[0]["title"], "movies");
    assert_eq!(nodes[0]["isLeaf"], false);

    let reply = get(&app, &format!("/files/folders?path={}", missing)).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = get(&app, "/files/default-path").await;
    assert!(reply.json()["path"].is_string());
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_folder_picker_denies_system_dirs() {
    let lib = test_library().await;
    let app = app(&lib);

    let reply = get(&app, "/files/folders?path=/proc").await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    let reply = post_json(&app, "/files/validate", json!({ "path": "/proc" })).await;
    assert_eq!(reply.json(), json!({ "valid": false }));
}
