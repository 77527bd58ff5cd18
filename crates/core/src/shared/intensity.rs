/// Single-channel detector input: one value in `[0, 1]` per pixel, row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct IntensityBuffer {
    values: Vec<f32>,
    width: u32,
    height: u32,
}

impl IntensityBuffer {
    pub fn new(values: Vec<f32>, width: u32, height: u32) -> Self {
        debug_assert_eq!(
            values.len(),
            (width as usize) * (height as usize),
            "intensity length must equal width * height"
        );
        Self {
            values,
            width,
            height,
        }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One unit of work for the detection worker.
///
/// The buffer is moved in; the submitter keeps no reference to it.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionRequest {
    buffer: IntensityBuffer,
}

impl DetectionRequest {
    pub fn new(buffer: IntensityBuffer) -> Self {
        Self { buffer }
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn intensity(&self) -> &[f32] {
        self.buffer.values()
    }
}

impl From<IntensityBuffer> for DetectionRequest {
    fn from(buffer: IntensityBuffer) -> Self {
        Self::new(buffer)
    }
}
