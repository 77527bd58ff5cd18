use std::path::{Path, PathBuf};

use crossbeam_channel::Receiver;

use crate::capture::domain::capture_device::{
    CameraError, CaptureDevice, StreamConstraints, VideoStream,
};
use crate::shared::frame::Frame;

/// Serves a still image as if it were a live camera stream.
///
/// Decoding happens at access time, so a missing or corrupt file shows up
/// as a device failure on the pending start.
pub struct ImageFileDevice {
    path: PathBuf,
}

impl ImageFileDevice {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CaptureDevice for ImageFileDevice {
    fn is_available(&self) -> bool {
        true
    }

    fn request_access(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn VideoStream>, CameraError> {
        if !constraints.video {
            return Err(CameraError::DeviceFailure("no video track requested".into()));
        }
        let img = image::open(&self.path)
            .map_err(|e| CameraError::DeviceFailure(format!("{}: {e}", self.path.display())))?
            .to_rgba8();
        let (width, height) = img.dimensions();
        log::debug!("Opened {} as a {width}x{height} still stream", self.path.display());

        let (tx, rx) = crossbeam_channel::bounded(1);
        let _ = tx.send(());
        Ok(Box::new(StillStream {
            frame: Frame::new(img.into_raw(), width, height, 0),
            metadata_rx: rx,
        }))
    }
}

struct StillStream {
    frame: Frame,
    metadata_rx: Receiver<()>,
}

impl VideoStream for StillStream {
    fn native_dimensions(&self) -> (u32, u32) {
        (self.frame.width(), self.frame.height())
    }

    fn metadata_loaded(&self) -> Receiver<()> {
        self.metadata_rx.clone()
    }

    fn read_frame(&self) -> Frame {
        self.frame.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serves_decoded_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("still.png");
        image::RgbaImage::from_pixel(40, 30, image::Rgba([10, 20, 30, 255]))
            .save(&path)
            .unwrap();

        let stream = ImageFileDevice::new(&path)
            .request_access(&StreamConstraints::default())
            .unwrap();

        assert_eq!(stream.native_dimensions(), (40, 30));
        assert!(stream.metadata_loaded().try_recv().is_ok());
        let frame = stream.read_frame();
        assert_eq!(&frame.data()[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn test_missing_file_is_a_device_failure() {
        let device = ImageFileDevice::new("/nonexistent/still.png");
        assert!(matches!(
            device.request_access(&StreamConstraints::default()),
            Err(CameraError::DeviceFailure(_))
        ));
    }
}
