use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use crate::capture::domain::capture_device::{
    CameraError, CaptureDevice, StreamConstraints, VideoStream,
};
use crate::shared::frame::{Frame, RGBA_CHANNELS};

/// Pixels per millisecond the test-pattern square moves.
const SQUARE_SPEED_DIVISOR: u128 = 20;

/// A capture device producing a moving test pattern.
///
/// Used for demos and tests; its knobs reproduce the host behaviours the
/// frame source has to cope with (no capture API, denied access, a
/// metadata event that never arrives, slow dimension reporting).
#[derive(Clone, Debug)]
pub struct SyntheticDevice {
    width: u32,
    height: u32,
    available: bool,
    denial: Option<String>,
    metadata_event: bool,
    dimensions_delay: Duration,
}

impl SyntheticDevice {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            available: true,
            denial: None,
            metadata_event: true,
            dimensions_delay: Duration::ZERO,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(0, 0)
        }
    }

    pub fn denying(mut self, reason: &str) -> Self {
        self.denial = Some(reason.to_string());
        self
    }

    pub fn without_metadata_event(mut self) -> Self {
        self.metadata_event = false;
        self
    }

    /// Native dimensions read as zero until `delay` has passed since access.
    pub fn with_dimensions_delay(mut self, delay: Duration) -> Self {
        self.dimensions_delay = delay;
        self
    }
}

impl CaptureDevice for SyntheticDevice {
    fn is_available(&self) -> bool {
        self.available
    }

    fn request_access(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn VideoStream>, CameraError> {
        if let Some(ref reason) = self.denial {
            return Err(CameraError::Denied(reason.clone()));
        }
        if !constraints.video {
            return Err(CameraError::DeviceFailure("no video track requested".into()));
        }
        Ok(Box::new(SyntheticStream::new(self)))
    }
}

struct SyntheticStream {
    width: u32,
    height: u32,
    opened: Instant,
    dimensions_delay: Duration,
    metadata_rx: Receiver<()>,
    // Held open when the event is suppressed so the receiver never disconnects.
    _metadata_tx: Option<Sender<()>>,
}

impl SyntheticStream {
    fn new(device: &SyntheticDevice) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let held = if device.metadata_event {
            let _ = tx.send(());
            None
        } else {
            Some(tx)
        };
        Self {
            width: device.width,
            height: device.height,
            opened: Instant::now(),
            dimensions_delay: device.dimensions_delay,
            metadata_rx: rx,
            _metadata_tx: held,
        }
    }
}

impl VideoStream for SyntheticStream {
    fn native_dimensions(&self) -> (u32, u32) {
        if self.opened.elapsed() >= self.dimensions_delay {
            (self.width, self.height)
        } else {
            (0, 0)
        }
    }

    fn metadata_loaded(&self) -> Receiver<()> {
        self.metadata_rx.clone()
    }

    fn read_frame(&self) -> Frame {
        let (w, h) = (self.width as usize, self.height as usize);
        let side = (h / 4).max(1).min(w);
        let travel = (w - side).max(1) as u128;
        let left = ((self.opened.elapsed().as_millis() / SQUARE_SPEED_DIVISOR) % travel) as usize;
        let top = (h - side.min(h)) / 2;

        let mut data = Vec::with_capacity(w * h * RGBA_CHANNELS);
        for y in 0..h {
            for x in 0..w {
                let inside = x >= left && x < left + side && y >= top && y < top + side;
                if inside {
                    data.extend_from_slice(&[255, 255, 255, 255]);
                } else {
                    let shade = (x * 160 / w.max(1)) as u8 + 32;
                    data.extend_from_slice(&[shade, shade, shade, 255]);
                }
            }
        }
        Frame::new(data, self.width, self.height, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_device_reports_no_capture_api() {
        assert!(!SyntheticDevice::unavailable().is_available());
    }

    #[test]
    fn test_denying_device_refuses_access() {
        let device = SyntheticDevice::new(64, 48).denying("blocked");
        let result = device.request_access(&StreamConstraints::default());
        assert_eq!(result.err(), Some(CameraError::Denied("blocked".into())));
    }

    #[test]
    fn test_audio_only_request_fails() {
        let device = SyntheticDevice::new(64, 48);
        let constraints = StreamConstraints {
            video: false,
            audio: true,
        };
        assert!(matches!(
            device.request_access(&constraints),
            Err(CameraError::DeviceFailure(_))
        ));
    }

    #[test]
    fn test_metadata_event_fires_once_then_closes() {
        let stream = SyntheticDevice::new(64, 48)
            .request_access(&StreamConstraints::default())
            .unwrap();
        let rx = stream.metadata_loaded();
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_suppressed_metadata_event_stays_pending() {
        let stream = SyntheticDevice::new(64, 48)
            .without_metadata_event()
            .request_access(&StreamConstraints::default())
            .unwrap();
        let rx = stream.metadata_loaded();
        assert!(rx.try_recv().unwrap_err().is_empty());
    }

    #[test]
    fn test_dimensions_hidden_until_delay_elapses() {
        let stream = SyntheticDevice::new(64, 48)
            .with_dimensions_delay(Duration::from_secs(3600))
            .request_access(&StreamConstraints::default())
            .unwrap();
        assert_eq!(stream.native_dimensions(), (0, 0));
    }

    #[test]
    fn test_read_frame_is_native_size_rgba() {
        let stream = SyntheticDevice::new(64, 48)
            .request_access(&StreamConstraints::default())
            .unwrap();
        let frame = stream.read_frame();
        assert_eq!((frame.width(), frame.height()), (64, 48));
        assert_eq!(frame.data().len(), 64 * 48 * 4);
        assert!(frame.data().chunks_exact(4).any(|px| px == [255, 255, 255, 255]));
    }
}
