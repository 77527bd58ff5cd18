use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{select, Receiver, RecvTimeoutError, Sender};
use image::imageops::FilterType;
use image::RgbaImage;

use crate::capture::domain::capture_device::{
    CameraError, CaptureDevice, StreamConstraints, VideoStream,
};
use crate::capture::domain::frame_provider::FrameProvider;
use crate::shared::constants::{OUTPUT_HEIGHT, READY_POLL_INTERVAL};
use crate::shared::frame::Frame;

/// Size of every frame handed out by a [`LiveCamera`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputDimensions {
    pub width: u32,
    pub height: u32,
}

impl OutputDimensions {
    /// Scales native dimensions to [`OUTPUT_HEIGHT`], keeping the aspect
    /// ratio. Returns `None` until the device reports a non-zero size.
    pub fn from_native(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        let scale = f64::from(OUTPUT_HEIGHT) / f64::from(height);
        Some(Self {
            width: ((f64::from(width) * scale).round() as u32).max(1),
            height: OUTPUT_HEIGHT,
        })
    }
}

/// Which signal declared the stream ready.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadyPath {
    MetadataEvent,
    DimensionPoll,
}

/// Owns a capture device and starts it at most once.
pub struct Camera {
    device: Arc<dyn CaptureDevice>,
    poll_interval: Duration,
    started: bool,
}

impl Camera {
    pub fn new(device: Arc<dyn CaptureDevice>) -> Self {
        Self {
            device,
            poll_interval: READY_POLL_INTERVAL,
            started: false,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Begins device negotiation on a helper thread and returns immediately.
    ///
    /// Only a missing capture API (or a second call) fails here; denial and
    /// device failures arrive through the returned [`PendingCamera`].
    pub fn start(&mut self) -> Result<PendingCamera, CameraError> {
        if self.started {
            return Err(CameraError::AlreadyStarted);
        }
        if !self.device.is_available() {
            return Err(CameraError::Unavailable);
        }
        self.started = true;

        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let (cancel_tx, cancel_rx) = crossbeam_channel::bounded::<()>(0);
        let device = self.device.clone();
        let poll_interval = self.poll_interval;

        thread::Builder::new()
            .name("camera-start".into())
            .spawn(move || {
                let result = negotiate(&*device, poll_interval, &cancel_rx);
                if let Err(ref e) = result {
                    log::warn!("Camera start failed: {e}");
                }
                let _ = ready_tx.send(result);
            })
            .map_err(|e| CameraError::DeviceFailure(e.to_string()))?;

        Ok(PendingCamera {
            ready: ready_rx,
            _cancel: cancel_tx,
        })
    }
}

/// The outcome of one `start()`, delivered exactly once.
///
/// Dropping it abandons a negotiation that has not finished yet.
pub struct PendingCamera {
    ready: Receiver<Result<LiveCamera, CameraError>>,
    _cancel: Sender<()>,
}

impl PendingCamera {
    pub fn wait(self) -> Result<LiveCamera, CameraError> {
        self.ready.recv().unwrap_or_else(|_| {
            Err(CameraError::DeviceFailure(
                "camera negotiation thread exited".into(),
            ))
        })
    }

    /// Like [`wait`](Self::wait), giving up with `NotReady` after `timeout`.
    pub fn wait_timeout(self, timeout: Duration) -> Result<LiveCamera, CameraError> {
        match self.ready.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(CameraError::NotReady),
            Err(RecvTimeoutError::Disconnected) => Err(CameraError::DeviceFailure(
                "camera negotiation thread exited".into(),
            )),
        }
    }
}

/// A started camera, sampling the live stream on demand.
pub struct LiveCamera {
    stream: Box<dyn VideoStream>,
    output: OutputDimensions,
    ready_path: ReadyPath,
    next_index: AtomicU64,
}

impl LiveCamera {
    fn new(stream: Box<dyn VideoStream>, output: OutputDimensions, ready_path: ReadyPath) -> Self {
        Self {
            stream,
            output,
            ready_path,
            next_index: AtomicU64::new(0),
        }
    }

    /// Fixed once the camera is ready.
    pub fn output_dimensions(&self) -> OutputDimensions {
        self.output
    }

    pub fn ready_path(&self) -> ReadyPath {
        self.ready_path
    }
}

impl FrameProvider for LiveCamera {
    fn current_frame(&self) -> Frame {
        let index = self.next_index.fetch_add(1, Ordering::Relaxed);
        scale_frame(self.stream.read_frame(), self.output, index)
    }
}

fn negotiate(
    device: &dyn CaptureDevice,
    poll_interval: Duration,
    cancel: &Receiver<()>,
) -> Result<LiveCamera, CameraError> {
    let stream = device.request_access(&StreamConstraints::default())?;
    let path = await_ready(&*stream, poll_interval, cancel)?;

    let (width, height) = stream.native_dimensions();
    let output = OutputDimensions::from_native(width, height).ok_or_else(|| {
        CameraError::DeviceFailure("stream lost its dimensions after becoming ready".into())
    })?;
    log::info!(
        "Camera ready via {path:?}: native {width}x{height}, output {}x{}",
        output.width,
        output.height
    );
    Ok(LiveCamera::new(stream, output, path))
}

/// Races the stream's metadata event against a dimension poll.
///
/// First to see non-zero dimensions wins; both receivers are dropped on
/// return, which stops the other path.
fn await_ready(
    stream: &dyn VideoStream,
    poll_interval: Duration,
    cancel: &Receiver<()>,
) -> Result<ReadyPath, CameraError> {
    let metadata = stream.metadata_loaded();
    let poll = crossbeam_channel::tick(poll_interval);
    let mut metadata_open = true;

    loop {
        let metadata_rx = if metadata_open {
            metadata.clone()
        } else {
            crossbeam_channel::never()
        };

        select! {
            recv(metadata_rx) -> msg => match msg {
                Ok(()) if has_dimensions(stream) => return Ok(ReadyPath::MetadataEvent),
                Ok(()) => log::debug!("Metadata event arrived before dimensions; polling"),
                Err(_) => metadata_open = false,
            },
            recv(poll) -> _ => {
                if has_dimensions(stream) {
                    return Ok(ReadyPath::DimensionPoll);
                }
            }
            recv(cancel) -> _ => return Err(CameraError::NotReady),
        }
    }
}

fn has_dimensions(stream: &dyn VideoStream) -> bool {
    let (width, height) = stream.native_dimensions();
    width > 0 && height > 0
}

fn scale_frame(native: Frame, target: OutputDimensions, index: u64) -> Frame {
    let (width, height) = (native.width(), native.height());
    if width == target.width && height == target.height {
        return Frame::new(native.into_data(), width, height, index);
    }

    match RgbaImage::from_raw(width, height, native.into_data()) {
        Some(img) => {
            let scaled = image::imageops::resize(&img, target.width, target.height, FilterType::Triangle);
            Frame::new(scaled.into_raw(), target.width, target.height, index)
        }
        None => {
            log::warn!("Stream returned a malformed {width}x{height} frame");
            Frame::filled(target.width, target.height, [0, 0, 0, 255], index)
        }
    }
}
