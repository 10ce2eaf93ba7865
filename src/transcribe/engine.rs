//! Speech-to-text engines
//!
//! The job manager only talks to [`SpeechEngine`]. [`CommandEngine`] drives
//! an external program that prints its result as JSON on stdout:
//!
//! ```text
//! {"segments": [{"start": 0.0, "end": 2.4, "text": "..."}, ...]}
//! ```
//!
//! Lines on stderr of the form `progress: <0..100>` are forwarded to the
//! progress callback.

use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};

use serde::Deserialize;
use thiserror::Error;

use super::task::Segment;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to start {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("engine exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },

    #[error("unreadable engine output: {0}")]
    Output(String),

    #[error("{0}")]
    Other(String),
}

/// Opaque speech-to-text backend. Implementations block; callers run them on
/// the blocking pool. `progress` receives a fraction in `0.0..=1.0`.
pub trait SpeechEngine: Send + Sync {
    fn transcribe(
        &self,
        path: &Path,
        language: &str,
        progress: &dyn Fn(f32),
    ) -> Result<Vec<Segment>, EngineError>;
}

#[derive(Deserialize)]
struct EngineOutput {
    segments: Vec<Segment>,
}

/// Runs a configured program once per job
#[derive(Debug, Clone)]
pub struct CommandEngine {
    command: String,
    args: Vec<String>,
}

impl CommandEngine {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    fn expand_args(&self, path: &Path, language: &str) -> Vec<String> {
        let input = path.to_string_lossy();
        self.args
            .iter()
            .map(|a| a.replace("{input}", &input).replace("{language}", language))
            .collect()
    }
}

impl SpeechEngine for CommandEngine {
    fn transcribe(
        &self,
        path: &Path,
        language: &str,
        progress: &dyn Fn(f32),
    ) -> Result<Vec<Segment>, EngineError> {
        let args = self.expand_args(path, language);
        tracing::debug!(command = %self.command, ?args, "starting speech engine");

        let mut child = Command::new(&self.command)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| EngineError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        // stdout is drained on its own thread so a chatty engine cannot
        // block on a full pipe while we are reading stderr
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Other("engine stdout unavailable".to_string()))?;
        let reader = std::thread::spawn(move || {
            let mut buf = String::new();
            stdout.read_to_string(&mut buf).map(|_| buf)
        });

        let mut stderr_tail = Vec::new();
        if let Some(stderr) = child.stderr.take() {
            for line in BufReader::new(stderr).lines().map_while(|l| l.ok()) {
                match parse_progress_line(&line) {
                    Some(fraction) => progress(fraction),
                    None => {
                        stderr_tail.push(line);
                        if stderr_tail.len() > 20 {
                            stderr_tail.remove(0);
                        }
                    }
                }
            }
        }

        let status = child.wait().map_err(|e| EngineError::Other(e.to_string()))?;
        let stdout = reader
            .join()
            .map_err(|_| EngineError::Other("engine output reader panicked".to_string()))?
            .map_err(|e| EngineError::Output(e.to_string()))?;

        if !status.success() {
            return Err(EngineError::Exit {
                status: status.to_string(),
                stderr: stderr_tail.join("\n"),
            });
        }

        parse_output(&stdout)
    }
}

fn parse_progress_line(line: &str) -> Option<f32> {
    let value = line.trim().strip_prefix("progress:")?.trim();
    let percent: f32 = value.trim_end_matches('%').parse().ok()?;
    Some((percent / 100.0).clamp(0.0, 1.0))
}

fn parse_output(stdout: &str) -> Result<Vec<Segment>, EngineError> {
    let output: EngineOutput =
        serde_json::from_str(stdout.trim()).map_err(|e| EngineError::Output(e.to_string()))?;
    Ok(output.segments)
}
