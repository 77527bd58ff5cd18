use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::detection::domain::detection_backend::{DetectionBackend, DetectionBackendError};
use crate::detection::domain::pending_detection::{
    pending_pair, DetectionOutcome, DetectionResponder, DetectionSubmitter, PendingDetection,
};
use crate::shared::intensity::DetectionRequest;

/// Builds the backend. Runs on the worker thread, once.
pub type BackendFactory =
    Box<dyn FnOnce() -> Result<Box<dyn DetectionBackend>, DetectionBackendError> + Send>;

#[derive(Clone, Debug, Default)]
pub struct WorkerOptions {
    /// Sent to the backend once, before its first request.
    pub init_payload: Option<Vec<u8>>,
    /// Collapse overlapping rectangles before replying.
    pub join_overlaps: bool,
}

struct Job {
    request: DetectionRequest,
    responder: DetectionResponder,
}

struct Worker {
    inbox: Sender<Job>,
    handle: JoinHandle<()>,
}

/// Runs detection on one persistent background thread.
///
/// The thread is created on the first `submit` and reused for every later
/// request. Each request gets its own reply channel, so every handle
/// resolves exactly once. Only one request is held at a time: a submit
/// while the worker is still busy, including with a request its caller
/// has given up on, fails with [`DetectionBackendError::Busy`].
pub struct WorkerChannel {
    factory: Option<BackendFactory>,
    options: WorkerOptions,
    worker: Option<Worker>,
    next_id: u64,
    in_flight: Arc<AtomicUsize>,
}

impl WorkerChannel {
    pub fn new(factory: BackendFactory, options: WorkerOptions) -> Self {
        Self {
            factory: Some(factory),
            options,
            worker: None,
            next_id: 0,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Requests handed to the worker and not yet answered.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn is_started(&self) -> bool {
        self.worker.is_some()
    }

    /// Closes the inbox and waits for the worker to drain.
    ///
    /// Dropping the channel instead detaches the thread; any request still
    /// running finishes and its reply is discarded.
    pub fn shutdown(mut self) -> Result<(), DetectionBackendError> {
        match self.worker.take() {
            Some(Worker { inbox, handle }) => {
                drop(inbox);
                handle.join().map_err(|_| DetectionBackendError::Crashed)
            }
            None => Ok(()),
        }
    }

    fn ensure_worker(&mut self) -> Result<&Sender<Job>, DetectionBackendError> {
        if self
            .worker
            .as_ref()
            .is_some_and(|worker| worker.handle.is_finished())
        {
            return Err(DetectionBackendError::Crashed);
        }
        if self.worker.is_none() {
            let factory = self.factory.take().ok_or(DetectionBackendError::Crashed)?;
            let (inbox, jobs) = crossbeam_channel::bounded::<Job>(1);
            let options = self.options.clone();
            let in_flight = self.in_flight.clone();

            let handle = thread::Builder::new()
                .name("detection-worker".into())
                .spawn(move || run_worker(factory, options, jobs, in_flight))?;
            log::debug!("Detection worker started");
            self.worker = Some(Worker { inbox, handle });
        }

        match self.worker {
            Some(ref worker) => Ok(&worker.inbox),
            None => Err(DetectionBackendError::Crashed),
        }
    }
}

impl DetectionSubmitter for WorkerChannel {
    fn submit(
        &mut self,
        request: DetectionRequest,
    ) -> Result<PendingDetection, DetectionBackendError> {
        let id = self.next_id;
        let in_flight = self.in_flight.clone();
        let inbox = self.ensure_worker()?.clone();

        if in_flight
            .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::debug!("Detection worker busy; request rejected");
            return Err(DetectionBackendError::Busy);
        }

        let (responder, pending) = pending_pair(id);
        match inbox.try_send(Job { request, responder }) {
            Ok(()) => {
                self.next_id += 1;
                Ok(pending)
            }
            Err(TrySendError::Full(_)) => {
                in_flight.store(0, Ordering::SeqCst);
                Err(DetectionBackendError::Busy)
            }
            Err(TrySendError::Disconnected(_)) => {
                in_flight.store(0, Ordering::SeqCst);
                Err(DetectionBackendError::Crashed)
            }
        }
    }
}

/// Releases the in-flight slot when a job ends, including by panic.
struct InFlightSlot(Arc<AtomicUsize>);

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        self.0.store(0, Ordering::SeqCst);
    }
}

fn run_worker(
    factory: BackendFactory,
    options: WorkerOptions,
    jobs: Receiver<Job>,
    in_flight: Arc<AtomicUsize>,
) {
    let mut backend = factory().and_then(|mut backend| {
        if let Some(ref payload) = options.init_payload {
            backend.initialize(payload)?;
        }
        Ok(backend)
    });
    match backend {
        Ok(_) => log::debug!("Detection backend initialized"),
        Err(ref e) => log::warn!("{e}"),
    }

    for job in jobs {
        let slot = InFlightSlot(in_flight.clone());
        let outcome = match backend {
            Ok(ref mut b) => run_job(&mut **b, &job.request, options.join_overlaps),
            Err(ref e) => Err(DetectionBackendError::Initialization(init_failure(e))),
        };
        drop(slot);
        job.responder.complete(outcome);
    }
    log::debug!("Detection worker stopped");
}

fn run_job(
    backend: &mut dyn DetectionBackend,
    request: &DetectionRequest,
    join_overlaps: bool,
) -> DetectionOutcome {
    let matches = backend.detect(request.width(), request.height(), request.intensity())?;
    Ok(if join_overlaps {
        matches.join_overlaps()
    } else {
        matches
    })
}

fn init_failure(e: &DetectionBackendError) -> String {
    match e {
        DetectionBackendError::Initialization(msg) => msg.clone(),
        other => other.to_string(),
    }
}
