use crate::capture::domain::frame_provider::FrameProvider;
use crate::pipeline::detection_scheduler::PublishedMatches;
use crate::rendering::domain::render_surface::RenderSurface;

/// Draws the freshest frame with the latest completed matches on top.
///
/// The overlay may lag the picture by a few ticks; the renderer never
/// waits for detection.
pub struct Renderer {
    matches: PublishedMatches,
}

impl Renderer {
    pub fn new(matches: PublishedMatches) -> Self {
        Self { matches }
    }

    /// One render tick. Returns the number of rectangles drawn.
    pub fn render_tick(&self, frames: &dyn FrameProvider, surface: &mut dyn RenderSurface) -> usize {
        let frame = frames.current_frame();
        let matches = self.matches.latest();

        surface.clear();
        surface.draw_image(&frame);
        for rect in matches.iter() {
            surface.stroke_rect(rect);
        }
        if let Err(e) = surface.present() {
            log::warn!("Failed to present frame {}: {e}", frame.index());
        }
        matches.len()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::shared::frame::Frame;
    use crate::shared::match_rect::{MatchRect, MatchSet};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Debug, PartialEq)]
    pub(crate) enum Op {
        Clear,
        Image(u64),
        Rect(MatchRect),
        Present,
    }

    /// Records every call; clones share the log.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingSurface {
        pub(crate) ops: Arc<Mutex<Vec<Op>>>,
    }

    impl RecordingSurface {
        pub(crate) fn rects(&self) -> Vec<MatchRect> {
            self.ops
                .lock()
                .unwrap()
                .iter()
                .filter_map(|op| match op {
                    Op::Rect(r) => Some(*r),
                    _ => None,
                })
                .collect()
        }

        pub(crate) fn take(&self) -> Vec<Op> {
            std::mem::take(&mut *self.ops.lock().unwrap())
        }
    }

    impl RenderSurface for RecordingSurface {
        fn clear(&mut self) {
            self.ops.lock().unwrap().push(Op::Clear);
        }

        fn draw_image(&mut self, frame: &Frame) {
            self.ops.lock().unwrap().push(Op::Image(frame.index()));
        }

        fn stroke_rect(&mut self, rect: &MatchRect) {
            self.ops.lock().unwrap().push(Op::Rect(*rect));
        }

        fn present(&mut self) -> Result<(), Box<dyn std::error::Error>> {
            self.ops.lock().unwrap().push(Op::Present);
            Ok(())
        }
    }

    struct CountingFrames {
        next: Mutex<u64>,
    }

    impl FrameProvider for CountingFrames {
        fn current_frame(&self) -> Frame {
            let mut next = self.next.lock().unwrap();
            *next += 1;
            Frame::filled(2, 2, [0, 0, 0, 255], *next)
        }
    }

    fn frames() -> CountingFrames {
        CountingFrames {
            next: Mutex::new(0),
        }
    }

    #[test]
    fn test_empty_matches_draw_frame_only() {
        let renderer = Renderer::new(PublishedMatches::new());
        let mut surface = RecordingSurface::default();

        let drawn = renderer.render_tick(&frames(), &mut surface);

        assert_eq!(drawn, 0);
        assert_eq!(surface.take(), vec![Op::Clear, Op::Image(1), Op::Present]);
    }

    #[test]
    fn test_published_rect_drawn_every_tick_until_superseded() {
        let published = PublishedMatches::new();
        let renderer = Renderer::new(published.clone());
        let source = frames();
        let mut surface = RecordingSurface::default();
        let rect = MatchRect::new(10, 10, 20, 20);

        published.publish(MatchSet::new(vec![rect]));
        renderer.render_tick(&source, &mut surface);
        renderer.render_tick(&source, &mut surface);
        assert_eq!(surface.rects(), vec![rect, rect]);

        surface.take();
        published.publish(MatchSet::empty());
        renderer.render_tick(&source, &mut surface);
        assert!(surface.rects().is_empty());
    }

    #[test]
    fn test_frame_drawn_before_rects() {
        let published = PublishedMatches::new();
        published.publish(MatchSet::new(vec![
            MatchRect::new(0, 0, 5, 5),
            MatchRect::new(1, 1, 5, 5),
        ]));
        let renderer = Renderer::new(published);
        let mut surface = RecordingSurface::default();

        renderer.render_tick(&frames(), &mut surface);

        assert_eq!(
            surface.take(),
            vec![
                Op::Clear,
                Op::Image(1),
                Op::Rect(MatchRect::new(0, 0, 5, 5)),
                Op::Rect(MatchRect::new(1, 1, 5, 5)),
                Op::Present,
            ]
        );
    }
}
