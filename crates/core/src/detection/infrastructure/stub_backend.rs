use std::thread;
use std::time::Duration;

use crate::detection::domain::detection_backend::{DetectionBackend, DetectionBackendError};
use crate::shared::match_rect::MatchSet;

/// Backend that answers every request with the same matches.
///
/// An optional latency makes it stand in for a slow detector.
pub struct StubBackend {
    matches: MatchSet,
    latency: Duration,
}

impl StubBackend {
    pub fn new(matches: MatchSet) -> Self {
        Self {
            matches,
            latency: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new(MatchSet::empty())
    }
}

impl DetectionBackend for StubBackend {
    fn detect(
        &mut self,
        width: u32,
        height: u32,
        intensity: &[f32],
    ) -> Result<MatchSet, DetectionBackendError> {
        let expected = (width as usize) * (height as usize);
        if intensity.len() != expected {
            return Err(DetectionBackendError::Detection(format!(
                "buffer holds {} values, expected {expected}",
                intensity.len()
            )));
        }
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        Ok(self.matches.clone())
    }
}
