use std::time::Duration;

/// Height of every captured frame; width follows the stream's aspect ratio.
pub const OUTPUT_HEIGHT: u32 = 192;

/// Capture/render cadence (10 fps).
pub const CAPTURE_INTERVAL: Duration = Duration::from_millis(100);
pub const RENDER_INTERVAL: Duration = Duration::from_millis(100);

/// How often the frame source polls for native dimensions when the
/// stream's metadata event does not arrive.
pub const READY_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Sum of the RGB channel maxima; dividing by it maps intensity into `[0, 1]`.
pub const INTENSITY_SCALE: f32 = 3.0 * 255.0;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
