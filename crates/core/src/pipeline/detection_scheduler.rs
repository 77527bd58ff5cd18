use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

use crate::capture::domain::frame_provider::FrameProvider;
use crate::detection::domain::detection_backend::DetectionBackendError;
use crate::detection::domain::grayscale_normalizer::normalize;
use crate::detection::domain::pending_detection::{
    DetectionOutcome, DetectionSubmitter, PendingDetection,
};
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use crate::shared::intensity::DetectionRequest;
use crate::shared::match_rect::MatchSet;

/// The most recently completed match set.
///
/// Cloning shares the cell. Sets are swapped in whole, so a reader's
/// `Arc<MatchSet>` never changes under it.
#[derive(Clone, Debug, Default)]
pub struct PublishedMatches {
    inner: Arc<Mutex<Arc<MatchSet>>>,
}

impl PublishedMatches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, matches: MatchSet) {
        let mut slot = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Arc::new(matches);
    }

    pub fn latest(&self) -> Arc<MatchSet> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Pending,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// A new request went out.
    Submitted,
    /// A request is still running; nothing was submitted.
    Skipped,
    /// Submission itself failed; still idle.
    SubmitFailed,
}

/// Back-pressure counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub skipped_ticks: u64,
}

struct InFlight {
    handle: PendingDetection,
    submitted_at: Instant,
    skipped: u64,
}

/// Decides, once per capture tick, whether to start a detection.
///
/// At most one request is ever outstanding: while one is pending, capture
/// ticks are dropped for detection purposes rather than queued. Completed
/// results replace the published set; failures keep the previous one.
pub struct DetectionScheduler {
    submitter: Box<dyn DetectionSubmitter>,
    published: PublishedMatches,
    in_flight: Option<InFlight>,
    timeout: Option<Duration>,
    stats: SchedulerStats,
    logger: Box<dyn PipelineLogger>,
}

impl DetectionScheduler {
    pub fn new(submitter: Box<dyn DetectionSubmitter>) -> Self {
        Self {
            submitter,
            published: PublishedMatches::new(),
            in_flight: None,
            timeout: None,
            stats: SchedulerStats::default(),
            logger: Box::new(NullPipelineLogger),
        }
    }

    /// Abandon a request that has not answered within `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_logger(mut self, logger: Box<dyn PipelineLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn state(&self) -> SchedulerState {
        if self.in_flight.is_some() {
            SchedulerState::Pending
        } else {
            SchedulerState::Idle
        }
    }

    pub fn awaiting_result(&self) -> bool {
        self.in_flight.is_some()
    }

    /// A handle on the published cell, for the renderer.
    pub fn published(&self) -> PublishedMatches {
        self.published.clone()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    pub fn logger(&self) -> &dyn PipelineLogger {
        &*self.logger
    }

    pub fn logger_mut(&mut self) -> &mut dyn PipelineLogger {
        &mut *self.logger
    }

    /// Receiver for the outstanding request's reply, if any.
    pub fn completion_receiver(&self) -> Option<Receiver<DetectionOutcome>> {
        self.in_flight
            .as_ref()
            .map(|f| f.handle.receiver().clone())
    }

    /// One capture tick. Frames are only pulled when a request goes out.
    ///
    /// A tick whose submission the worker refuses as busy counts as skipped.
    pub fn on_capture_tick(&mut self, frames: &dyn FrameProvider, now: Instant) -> TickOutcome {
        self.poll(now);

        if let Some(ref mut in_flight) = self.in_flight {
            in_flight.skipped += 1;
            self.stats.skipped_ticks += 1;
            log::trace!("Detection pending; skipping capture tick");
            return TickOutcome::Skipped;
        }

        let frame = frames.current_frame();
        let request = DetectionRequest::from(normalize(&frame));
        match self.submitter.submit(request) {
            Ok(handle) => {
                log::trace!("Submitted detection {} for frame {}", handle.id(), frame.index());
                self.stats.submitted += 1;
                self.in_flight = Some(InFlight {
                    handle,
                    submitted_at: now,
                    skipped: 0,
                });
                TickOutcome::Submitted
            }
            Err(DetectionBackendError::Busy) => {
                // An abandoned request is still running on the worker.
                self.stats.skipped_ticks += 1;
                log::trace!("Detection worker busy; skipping capture tick");
                TickOutcome::Skipped
            }
            Err(e) => {
                self.stats.failed += 1;
                log::warn!("Could not submit detection: {e}");
                TickOutcome::SubmitFailed
            }
        }
    }

    /// Picks up a reply that has already arrived, or expires a request
    /// past its timeout. Safe to call at any time.
    pub fn poll(&mut self, now: Instant) {
        let Some(ref in_flight) = self.in_flight else {
            return;
        };
        if let Some(outcome) = in_flight.handle.try_result() {
            self.on_completion(outcome, now);
            return;
        }
        if let Some(timeout) = self.timeout {
            if now.saturating_duration_since(in_flight.submitted_at) >= timeout {
                self.on_completion(Err(DetectionBackendError::TimedOut(timeout)), now);
            }
        }
    }

    /// Applies the outstanding request's result and returns to idle.
    ///
    /// Ignored when nothing is outstanding.
    pub fn on_completion(&mut self, outcome: DetectionOutcome, now: Instant) {
        let Some(in_flight) = self.in_flight.take() else {
            log::debug!("Dropping detection result with no request outstanding");
            return;
        };

        let elapsed_ms = now
            .saturating_duration_since(in_flight.submitted_at)
            .as_secs_f64()
            * 1000.0;
        self.logger.metric("skipped_ticks", in_flight.skipped as f64);

        match outcome {
            Ok(matches) => {
                self.stats.completed += 1;
                self.logger.timing("detect", elapsed_ms);
                log::debug!(
                    "Detection {} returned {} matches in {elapsed_ms:.1}ms",
                    in_flight.handle.id(),
                    matches.len()
                );
                self.published.publish(matches);
            }
            Err(DetectionBackendError::TimedOut(timeout)) => {
                self.stats.timed_out += 1;
                log::warn!(
                    "Detection {} gave no result within {timeout:?}; keeping previous overlay",
                    in_flight.handle.id()
                );
            }
            Err(e) => {
                self.stats.failed += 1;
                log::warn!(
                    "Detection {} failed: {e}; keeping previous overlay",
                    in_flight.handle.id()
                );
            }
        }
    }
}
