use crossbeam_channel::Receiver;
use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("no capture capability is available on this host")]
    Unavailable,
    #[error("camera access denied: {0}")]
    Denied(String),
    #[error("camera device failure: {0}")]
    DeviceFailure(String),
    #[error("camera has already been started")]
    AlreadyStarted,
    #[error("camera did not become ready in time")]
    NotReady,
}

/// What the frame source asks the device for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamConstraints {
    pub video: bool,
    pub audio: bool,
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self {
            video: true,
            audio: false,
        }
    }
}

/// Host capture capability.
///
/// `request_access` may block for as long as device negotiation takes;
/// the frame source only ever calls it off the caller's thread.
pub trait CaptureDevice: Send + Sync {
    /// False when the host has no capture API at all.
    fn is_available(&self) -> bool;

    fn request_access(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn VideoStream>, CameraError>;
}

/// A negotiated live stream.
pub trait VideoStream: Send + Sync {
    /// Native `(width, height)`; `(0, 0)` until the device has reported them.
    fn native_dimensions(&self) -> (u32, u32);

    /// The host's "metadata loaded" event.
    ///
    /// Some hosts never deliver it, so callers must not rely on it alone.
    fn metadata_loaded(&self) -> Receiver<()>;

    /// The picture currently on the stream, at native resolution.
    fn read_frame(&self) -> Frame;
}
