//! Test fixtures for integration tests
//!
//! A temporary source directory with fake media files, a frame grabber that
//! paints a solid colour instead of decoding, and a speech engine that
//! returns scripted segments.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use image::{Rgb, RgbImage};
use tempfile::TempDir;

use crate::config::ServerConfig;
use crate::state::AppState;
use crate::store::{MemoryStore, Source, Store};
use crate::thumbnail::{FrameGrabber, ThumbnailError};
use crate::transcribe::{EngineError, Segment, SpeechEngine, TranscriptionTask};

/// Owner of the fixture source
pub const OWNER: u64 = 1;

/// Size of the fake `a.mp4`
pub const VIDEO_SIZE: usize = 1000;

/// Grabber that returns a 320x180 frame of one colour
#[derive(Debug)]
pub struct SolidGrabber {
    pub colour: [u8; 3],
    pub calls: AtomicUsize,
}

impl Default for SolidGrabber {
    fn default() -> Self {
        Self {
            colour: [200, 30, 30],
            calls: AtomicUsize::new(0),
        }
    }
}

impl SolidGrabber {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FrameGrabber for SolidGrabber {
    fn grab(&self, _path: &Path) -> Result<RgbImage, ThumbnailError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(RgbImage::from_pixel(320, 180, Rgb(self.colour)))
    }
}

/// Engine that reports progress and then returns fixed segments, or fails
#[derive(Debug)]
pub struct ScriptedEngine {
    pub segments: Vec<Segment>,
    pub failure: Option<String>,
    pub calls: AtomicUsize,
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self {
            // out of order on purpose; the manager sorts them
            segments: vec![
                Segment {
                    start: 1.5,
                    end: 3.0,
                    text: " world ".to_string(),
                },
                Segment {
                    start: 0.0,
                    end: 1.5,
                    text: "hello".to_string(),
                },
            ],
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }
}

impl ScriptedEngine {
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Default::default()
        }
    }
}

impl SpeechEngine for ScriptedEngine {
    fn transcribe(
        &self,
        _path: &Path,
        _language: &str,
        progress: &dyn Fn(f32),
    ) -> Result<Vec<Segment>, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        progress(0.25);
        progress(0.5);
        match &self.failure {
            Some(message) => Err(EngineError::Other(message.clone())),
            None => {
                progress(1.0);
                Ok(self.segments.clone())
            }
        }
    }
}

/// Temporary library with one registered source:
///
/// ```text
/// a.mp4            1000 bytes, (i % 251) pattern
/// b.mkv
/// notes.txt
/// .hidden.mp4
/// movies/c.mp4
/// ```
pub struct TestLibrary {
    pub dir: TempDir,
    pub state: Arc<AppState>,
    pub source: Source,
    pub grabber: Arc<SolidGrabber>,
    pub engine: Arc<ScriptedEngine>,
}

impl TestLibrary {
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Contents of the fake `a.mp4`
    pub fn video_bytes(&self) -> Vec<u8> {
        std::fs::read(self.root().join("a.mp4")).unwrap()
    }
}

pub async fn test_library() -> TestLibrary {
    test_library_with(ScriptedEngine::default()).await
}

pub async fn test_library_with(engine: ScriptedEngine) -> TestLibrary {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let data: Vec<u8> = (0..VIDEO_SIZE).map(|i| (i % 251) as u8).collect();
    std::fs::write(root.join("a.mp4"), &data).unwrap();
    std::fs::write(root.join("b.mkv"), b"mkv").unwrap();
    std::fs::write(root.join("notes.txt"), b"notes").unwrap();
    std::fs::write(root.join(".hidden.mp4"), b"hidden").unwrap();
    std::fs::create_dir(root.join("movies")).unwrap();
    std::fs::write(root.join("movies").join("c.mp4"), b"c").unwrap();

    let store = Arc::new(MemoryStore::new());
    let canonical = std::fs::canonicalize(root).unwrap();
    let source = store.create_source(OWNER, "fixture", &canonical).unwrap();

    let grabber = Arc::new(SolidGrabber::default());
    let engine = Arc::new(engine);
    let state = Arc::new(AppState::new(
        ServerConfig::default(),
        store,
        grabber.clone(),
        engine.clone(),
    ));

    TestLibrary {
        dir,
        state,
        source,
        grabber,
        engine,
    }
}

/// Poll until the task reaches a terminal state
pub async fn wait_for_task(state: &AppState, task_id: u64, owner_id: u64) -> TranscriptionTask {
    for _ in 0..200 {
        let task = state.transcriber.get_status(task_id, owner_id).unwrap();
        if task.status.is_terminal() {
            return task;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task {} did not finish", task_id);
}

