use std::time::Duration;

use crate::shared::constants::{CAPTURE_INTERVAL, RENDER_INTERVAL};

/// Knobs for one live session.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    pub capture_interval: Duration,
    pub render_interval: Duration,
    /// Abandon a detection that has not answered in this long. Off by default.
    pub detection_timeout: Option<Duration>,
    /// Merge mutually overlapping rectangles before publishing.
    pub join_overlaps: bool,
    /// Stop after this many capture ticks; run until told otherwise when `None`.
    pub max_capture_ticks: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capture_interval: CAPTURE_INTERVAL,
            render_interval: RENDER_INTERVAL,
            detection_timeout: None,
            join_overlaps: false,
            max_capture_ticks: None,
        }
    }
}
