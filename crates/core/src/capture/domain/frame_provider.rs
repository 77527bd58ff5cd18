use crate::shared::frame::Frame;

/// Anything that can hand out the current frame on demand.
///
/// The scheduler and the renderer both pull frames through this port, at
/// their own cadence.
pub trait FrameProvider: Send {
    fn current_frame(&self) -> Frame;
}
