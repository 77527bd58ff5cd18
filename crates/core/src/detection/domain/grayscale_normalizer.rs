use ndarray::Axis;

use crate::shared::constants::INTENSITY_SCALE;
use crate::shared::frame::Frame;
use crate::shared::intensity::IntensityBuffer;

/// Maps each RGBA pixel to `(R + G + B) / 765`, ignoring alpha.
pub fn normalize(frame: &Frame) -> IntensityBuffer {
    let pixels = frame.as_ndarray();
    let values: Vec<f32> = pixels
        .lanes(Axis(2))
        .into_iter()
        .map(|px| (f32::from(px[0]) + f32::from(px[1]) + f32::from(px[2])) / INTENSITY_SCALE)
        .collect();
    IntensityBuffer::new(values, frame.width(), frame.height())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[rstest]
    #[case::one_pixel(1, 1)]
    #[case::row(7, 1)]
    #[case::column(1, 5)]
    #[case::canonical(256, 192)]
    fn test_length_matches_pixel_count(#[case] width: u32, #[case] height: u32) {
        let frame = Frame::filled(width, height, [12, 34, 56, 255], 0);
        let buffer = normalize(&frame);
        assert_eq!(buffer.len(), (width * height) as usize);
        assert_eq!((buffer.width(), buffer.height()), (width, height));
    }

    #[test]
    fn test_white_is_one() {
        let buffer = normalize(&Frame::filled(4, 3, [255, 255, 255, 255], 0));
        assert!(buffer.values().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_black_is_zero() {
        let buffer = normalize(&Frame::filled(4, 3, [0, 0, 0, 255], 0));
        assert!(buffer.values().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_alpha_is_ignored() {
        let opaque = normalize(&Frame::filled(2, 2, [90, 60, 30, 255], 0));
        let clear = normalize(&Frame::filled(2, 2, [90, 60, 30, 0], 0));
        assert_eq!(opaque, clear);
    }

    #[test]
    fn test_channels_are_averaged() {
        let buffer = normalize(&Frame::filled(1, 1, [255, 0, 0, 255], 0));
        assert_relative_eq!(buffer.values()[0], 1.0 / 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_row_major_order() {
        // 2x2: top-left white, bottom-right mid grey, others black.
        let mut data = vec![0u8; 16];
        data[..4].copy_from_slice(&[255, 255, 255, 255]);
        data[12..].copy_from_slice(&[51, 51, 51, 255]);
        let buffer = normalize(&Frame::new(data, 2, 2, 0));

        assert_relative_eq!(buffer.values()[0], 1.0);
        assert_relative_eq!(buffer.values()[1], 0.0);
        assert_relative_eq!(buffer.values()[2], 0.0);
        assert_relative_eq!(buffer.values()[3], 0.2, epsilon = 1e-6);
    }

    #[test]
    fn test_values_stay_in_unit_range() {
        let data: Vec<u8> = (0..=255u8).flat_map(|v| [v, 255 - v, v / 2, 255]).collect();
        let buffer = normalize(&Frame::new(data, 16, 16, 0));
        assert!(buffer.values().iter().all(|&v| (0.0..=1.0).contains(&v)));
    }
}
