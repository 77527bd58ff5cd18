use ndarray::ArrayView3;

/// Bytes per pixel: frames are always RGBA.
pub const RGBA_CHANNELS: usize = 4;

/// A captured video frame: contiguous RGBA bytes in row-major order.
///
/// Frames are immutable once built. The normalizer and the renderer each
/// read the same frame independently.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    index: u64,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, index: u64) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * RGBA_CHANNELS,
            "data length must equal width * height * 4"
        );
        Self {
            data,
            width,
            height,
            index,
        }
    }

    /// A frame with every pixel set to `rgba`.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4], index: u64) -> Self {
        let pixels = (width as usize) * (height as usize);
        let data = rgba.iter().copied().cycle().take(pixels * RGBA_CHANNELS).collect();
        Self::new(data, width, height, index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Capture sequence number, assigned by the frame source.
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    fn shape(&self) -> (usize, usize, usize) {
        (self.height as usize, self.width as usize, RGBA_CHANNELS)
    }
}
