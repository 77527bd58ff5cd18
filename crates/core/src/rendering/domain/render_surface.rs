use crate::shared::frame::Frame;
use crate::shared::match_rect::MatchRect;

/// Where a render tick draws to.
///
/// Rectangles reaching past the surface edge are clipped by the surface.
pub trait RenderSurface: Send {
    fn clear(&mut self);

    fn draw_image(&mut self, frame: &Frame);

    fn stroke_rect(&mut self, rect: &MatchRect);

    /// Called once the tick's drawing is done. Default: no-op.
    fn present(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }
}
