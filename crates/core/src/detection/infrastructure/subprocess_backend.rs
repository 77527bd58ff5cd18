use std::ffi::OsStr;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use serde::Serialize;
use serde_json::Value;

use crate::detection::domain::detection_backend::{DetectionBackend, DetectionBackendError};
use crate::shared::match_rect::MatchSet;

#[derive(Serialize)]
struct InitLine<'a> {
    init: &'a Value,
}

#[derive(Serialize)]
struct RequestLine<'a> {
    width: u32,
    height: u32,
    intensity: &'a [f32],
}

/// Runs an external detector process over newline-delimited JSON.
///
/// Protocol, one JSON document per line:
/// - to the process: `{"init": <payload>}` once, then
///   `{"width": w, "height": h, "intensity": [...]}` per request;
/// - from the process: `[{"x":..,"y":..,"width":..,"height":..}, ...]` per request.
pub struct SubprocessBackend {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    line: String,
}

impl SubprocessBackend {
    pub fn spawn<I, S>(program: impl AsRef<OsStr>, args: I) -> Result<Self, DetectionBackendError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let program = program.as_ref();
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                DetectionBackendError::Initialization(format!(
                    "failed to launch {}: {e}",
                    program.to_string_lossy()
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DetectionBackendError::Initialization("detector stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DetectionBackendError::Initialization("detector stdout unavailable".into()))?;

        log::info!("Launched detector process {} (pid {})", program.to_string_lossy(), child.id());
        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            line: String::new(),
        })
    }

    fn send<T: Serialize>(&mut self, message: &T) -> Result<(), DetectionBackendError> {
        serde_json::to_writer(&mut self.stdin, message)
            .map_err(|e| DetectionBackendError::Protocol(e.to_string()))?;
        self.stdin.write_all(b"\n")?;
        self.stdin.flush()?;
        Ok(())
    }

    fn receive(&mut self) -> Result<MatchSet, DetectionBackendError> {
        self.line.clear();
        if self.stdout.read_line(&mut self.line)? == 0 {
            return Err(DetectionBackendError::Crashed);
        }
        serde_json::from_str(self.line.trim_end())
            .map_err(|e| DetectionBackendError::Protocol(format!("{e}: {}", self.line.trim_end())))
    }
}

impl DetectionBackend for SubprocessBackend {
    fn initialize(&mut self, payload: &[u8]) -> Result<(), DetectionBackendError> {
        let value: Value = serde_json::from_slice(payload)
            .map_err(|e| DetectionBackendError::Initialization(format!("payload is not JSON: {e}")))?;
        self.send(&InitLine { init: &value })
    }

    fn detect(
        &mut self,
        width: u32,
        height: u32,
        intensity: &[f32],
    ) -> Result<MatchSet, DetectionBackendError> {
        self.send(&RequestLine {
            width,
            height,
            intensity,
        })?;
        self.receive()
    }
}

impl Drop for SubprocessBackend {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
