use std::time::Duration;

use thiserror::Error;

use crate::shared::match_rect::MatchSet;

#[derive(Debug, Error)]
pub enum DetectionBackendError {
    #[error("detection backend failed to initialize: {0}")]
    Initialization(String),
    #[error("detection failed: {0}")]
    Detection(String),
    #[error("detection worker is gone")]
    Crashed,
    #[error("detection worker is still busy with an earlier request")]
    Busy,
    #[error("no detection result after {0:?}")]
    TimedOut(Duration),
    #[error("malformed detector message: {0}")]
    Protocol(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The opaque detection algorithm.
///
/// Runs only on the detection worker thread. Implementations may keep
/// state between calls, hence `&mut self`.
pub trait DetectionBackend: Send {
    /// Receives the one-off initialization payload (e.g. cascade data),
    /// before the first `detect`. Default: ignore it.
    fn initialize(&mut self, _payload: &[u8]) -> Result<(), DetectionBackendError> {
        Ok(())
    }

    fn detect(
        &mut self,
        width: u32,
        height: u32,
        intensity: &[f32],
    ) -> Result<MatchSet, DetectionBackendError>;
}
