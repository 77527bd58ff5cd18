use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::detection::domain::detection_backend::DetectionBackendError;
use crate::shared::intensity::DetectionRequest;
use crate::shared::match_rect::MatchSet;

pub type DetectionOutcome = Result<MatchSet, DetectionBackendError>;

/// Port for handing a request to whatever runs detection.
///
/// The caller is responsible for keeping at most one request in flight.
pub trait DetectionSubmitter: Send {
    fn submit(&mut self, request: DetectionRequest)
        -> Result<PendingDetection, DetectionBackendError>;
}

/// Creates a linked responder/handle pair for request `id`.
pub fn pending_pair(id: u64) -> (DetectionResponder, PendingDetection) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    (DetectionResponder { tx }, PendingDetection { id, rx })
}

/// Completes one request. Consumed on use, so it answers at most once.
#[derive(Debug)]
pub struct DetectionResponder {
    tx: Sender<DetectionOutcome>,
}

impl DetectionResponder {
    /// Returns false when nobody is listening any more.
    pub fn complete(self, outcome: DetectionOutcome) -> bool {
        self.tx.send(outcome).is_ok()
    }
}

/// The caller's side of an in-flight request.
///
/// A responder dropped without answering (worker crash) reads as
/// [`DetectionBackendError::Crashed`].
#[derive(Debug)]
pub struct PendingDetection {
    id: u64,
    rx: Receiver<DetectionOutcome>,
}

impl PendingDetection {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Non-blocking check; `None` while the request is still running.
    pub fn try_result(&self) -> Option<DetectionOutcome> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(DetectionBackendError::Crashed)),
        }
    }

    pub fn wait(self) -> DetectionOutcome {
        self.rx
            .recv()
            .unwrap_or(Err(DetectionBackendError::Crashed))
    }

    pub fn wait_timeout(self, timeout: Duration) -> DetectionOutcome {
        match self.rx.recv_timeout(timeout) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => Err(DetectionBackendError::TimedOut(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(DetectionBackendError::Crashed),
        }
    }

    /// For use in `select!` alongside other event sources.
    pub fn receiver(&self) -> &Receiver<DetectionOutcome> {
        &self.rx
    }
}
