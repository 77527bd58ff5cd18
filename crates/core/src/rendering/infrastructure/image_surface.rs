use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::rendering::domain::render_surface::RenderSurface;
use crate::shared::frame::Frame;
use crate::shared::match_rect::MatchRect;

const STROKE: Rgba<u8> = Rgba([255, 0, 0, 255]);
const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Renders into an in-memory RGBA canvas using the `image` crate.
///
/// With a snapshot directory set, every presented tick is written out as
/// `frame_NNNNNN.png`.
pub struct ImageSurface {
    canvas: RgbaImage,
    snapshot_dir: Option<PathBuf>,
    presented: u64,
}

impl ImageSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: RgbaImage::from_pixel(width, height, CLEAR),
            snapshot_dir: None,
            presented: 0,
        }
    }

    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = Some(dir.into());
        self
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }

    pub fn save(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.canvas.save(path)?;
        Ok(())
    }

    /// Stroke width scales with the canvas, never below one pixel.
    fn line_width(&self) -> u32 {
        (self.canvas.width() / 500).max(1)
    }
}

impl RenderSurface for ImageSurface {
    fn clear(&mut self) {
        for px in self.canvas.pixels_mut() {
            *px = CLEAR;
        }
    }

    fn draw_image(&mut self, frame: &Frame) {
        match RgbaImage::from_raw(frame.width(), frame.height(), frame.data().to_vec()) {
            Some(img) => image::imageops::replace(&mut self.canvas, &img, 0, 0),
            None => log::warn!("Skipping malformed frame {}", frame.index()),
        }
    }

    fn stroke_rect(&mut self, rect: &MatchRect) {
        for inset in 0..self.line_width() {
            let width = rect.width.saturating_sub(2 * inset);
            let height = rect.height.saturating_sub(2 * inset);
            if width == 0 || height == 0 {
                break;
            }
            let (Ok(x), Ok(y)) = (i32::try_from(rect.x + inset), i32::try_from(rect.y + inset)) else {
                break;
            };
            draw_hollow_rect_mut(&mut self.canvas, Rect::at(x, y).of_size(width, height), STROKE);
        }
    }

    fn present(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.presented += 1;
        if let Some(ref dir) = self.snapshot_dir {
            let path = dir.join(format!("frame_{:06}.png", self.presented));
            self.save(&path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grey_frame(width: u32, height: u32) -> Frame {
        Frame::filled(width, height, [100, 100, 100, 255], 0)
    }

    #[test]
    fn test_draw_image_copies_pixels() {
        let mut surface = ImageSurface::new(8, 6);
        surface.draw_image(&grey_frame(8, 6));
        assert!(surface.canvas().pixels().all(|p| *p == Rgba([100, 100, 100, 255])));
    }

    #[test]
    fn test_clear_resets_canvas() {
        let mut surface = ImageSurface::new(4, 4);
        surface.draw_image(&grey_frame(4, 4));
        surface.clear();
        assert!(surface.canvas().pixels().all(|p| *p == CLEAR));
    }

    #[test]
    fn test_stroke_rect_draws_outline_only() {
        let mut surface = ImageSurface::new(64, 64);
        surface.draw_image(&grey_frame(64, 64));
        surface.stroke_rect(&MatchRect::new(10, 10, 20, 20));

        let canvas = surface.canvas();
        assert_eq!(*canvas.get_pixel(10, 10), STROKE);
        assert_eq!(*canvas.get_pixel(29, 29), STROKE);
        assert_eq!(*canvas.get_pixel(20, 10), STROKE);
        assert_eq!(*canvas.get_pixel(20, 20), Rgba([100, 100, 100, 255]));
        assert_eq!(*canvas.get_pixel(31, 31), Rgba([100, 100, 100, 255]));
    }

    #[test]
    fn test_stroke_rect_past_edge_is_clipped() {
        let mut surface = ImageSurface::new(16, 16);
        surface.stroke_rect(&MatchRect::new(10, 10, 40, 40));
        assert_eq!(*surface.canvas().get_pixel(10, 15), STROKE);
        assert_eq!(*surface.canvas().get_pixel(15, 10), STROKE);
    }

    #[test]
    fn test_zero_sized_rect_draws_nothing() {
        let mut surface = ImageSurface::new(8, 8);
        surface.stroke_rect(&MatchRect::new(2, 2, 0, 5));
        assert!(surface.canvas().pixels().all(|p| *p == CLEAR));
    }

    #[test]
    fn test_line_width_scales_with_canvas() {
        assert_eq!(ImageSurface::new(256, 192).line_width(), 1);
        assert_eq!(ImageSurface::new(1200, 900).line_width(), 2);
    }

    #[test]
    fn test_present_writes_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let mut surface = ImageSurface::new(8, 8).with_snapshot_dir(dir.path().join("shots"));

        surface.present().unwrap();
        surface.present().unwrap();

        assert_eq!(surface.presented(), 2);
        assert!(dir.path().join("shots/frame_000001.png").exists());
        assert!(dir.path().join("shots/frame_000002.png").exists());
    }

    #[test]
    fn test_present_without_dir_only_counts() {
        let mut surface = ImageSurface::new(8, 8);
        surface.present().unwrap();
        assert_eq!(surface.presented(), 1);
    }
}
