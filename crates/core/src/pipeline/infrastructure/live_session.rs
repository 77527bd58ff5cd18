use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{select, Receiver};

use crate::capture::domain::frame_provider::FrameProvider;
use crate::detection::domain::detection_backend::DetectionBackendError;
use crate::detection::domain::pending_detection::DetectionOutcome;
use crate::pipeline::detection_scheduler::{DetectionScheduler, SchedulerStats};
use crate::pipeline::session_config::SessionConfig;
use crate::rendering::domain::render_surface::RenderSurface;
use crate::rendering::renderer::Renderer;
use crate::shared::match_rect::MatchSet;

/// What a finished session looked like.
#[derive(Clone, Debug)]
pub struct SessionReport {
    pub capture_ticks: u64,
    pub render_ticks: u64,
    pub stats: SchedulerStats,
    pub last_matches: Arc<MatchSet>,
}

enum Event {
    Capture(Instant),
    Render,
    Completion(DetectionOutcome),
    Stop,
}

/// Drives capture ticks, render ticks and detection replies from one thread.
///
/// Layout: `capture tick → scheduler → worker`, `worker reply → scheduler →
/// published set`, `render tick → renderer → surface`.
///
/// Neither ticker waits on detection; a slow backend only makes the overlay
/// older.
pub struct LiveSession {
    frames: Box<dyn FrameProvider>,
    scheduler: DetectionScheduler,
    renderer: Renderer,
    surface: Box<dyn RenderSurface>,
    config: SessionConfig,
}

impl LiveSession {
    pub fn new(
        frames: Box<dyn FrameProvider>,
        scheduler: DetectionScheduler,
        surface: Box<dyn RenderSurface>,
        config: SessionConfig,
    ) -> Self {
        let scheduler = scheduler.with_timeout(config.detection_timeout);
        let renderer = Renderer::new(scheduler.published());
        Self {
            frames,
            scheduler,
            renderer,
            surface,
            config,
        }
    }

    pub fn scheduler(&self) -> &DetectionScheduler {
        &self.scheduler
    }

    /// Runs until `stop` fires (or its sender goes away) or the configured
    /// number of capture ticks has elapsed.
    pub fn run(&mut self, stop: &Receiver<()>) -> SessionReport {
        let capture = crossbeam_channel::tick(self.config.capture_interval);
        let render = crossbeam_channel::tick(self.config.render_interval);
        let mut capture_ticks = 0u64;
        let mut render_ticks = 0u64;

        let started = format!(
            "Session running (capture every {:?}, render every {:?})",
            self.config.capture_interval, self.config.render_interval
        );
        self.scheduler.logger_mut().info(&started);

        loop {
            let completion = self
                .scheduler
                .completion_receiver()
                .unwrap_or_else(crossbeam_channel::never);

            let event = select! {
                recv(capture) -> msg => match msg {
                    Ok(now) => Event::Capture(now),
                    Err(_) => Event::Stop,
                },
                recv(render) -> _ => Event::Render,
                recv(completion) -> msg => {
                    Event::Completion(msg.unwrap_or(Err(DetectionBackendError::Crashed)))
                }
                recv(stop) -> _ => Event::Stop,
            };

            match event {
                Event::Capture(now) => {
                    capture_ticks += 1;
                    self.scheduler.on_capture_tick(&*self.frames, now);
                    if self
                        .config
                        .max_capture_ticks
                        .is_some_and(|max| capture_ticks >= max)
                    {
                        let done = format!("Stopping after {capture_ticks} capture ticks");
                        self.scheduler.logger_mut().info(&done);
                        break;
                    }
                }
                Event::Render => {
                    render_ticks += 1;
                    self.renderer.render_tick(&*self.frames, &mut *self.surface);
                }
                Event::Completion(outcome) => {
                    self.scheduler.on_completion(outcome, Instant::now());
                }
                Event::Stop => {
                    self.scheduler.logger_mut().info("Stop requested");
                    break;
                }
            }
        }

        self.scheduler.logger().summary();

        SessionReport {
            capture_ticks,
            render_ticks,
            stats: self.scheduler.stats(),
            last_matches: self.scheduler.published().latest(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::infrastructure::stub_backend::StubBackend;
    use crate::pipeline::pipeline_logger::PipelineLogger;
    use crate::detection::domain::detection_backend::DetectionBackend;
    use crate::detection::infrastructure::worker_channel::{
        BackendFactory, WorkerChannel, WorkerOptions,
    };
    use crate::rendering::renderer::tests::RecordingSurface;
    use crate::shared::frame::Frame;
    use crate::shared::match_rect::MatchRect;
    use std::sync::Mutex;
    use std::time::Duration;

    struct StaticFrames;

    impl FrameProvider for StaticFrames {
        fn current_frame(&self) -> Frame {
            Frame::filled(64, 48, [90, 90, 90, 255], 0)
        }
    }

    fn fast_config(ticks: u64) -> SessionConfig {
        SessionConfig {
            capture_interval: Duration::from_millis(10),
            render_interval: Duration::from_millis(10),
            max_capture_ticks: Some(ticks),
            ..SessionConfig::default()
        }
    }

    fn session(backend: StubBackend, surface: RecordingSurface, config: SessionConfig) -> LiveSession {
        let factory: BackendFactory =
            Box::new(move || Ok(Box::new(backend) as Box<dyn DetectionBackend>));
        let worker = WorkerChannel::new(factory, WorkerOptions::default());
        LiveSession::new(
            Box::new(StaticFrames),
            DetectionScheduler::new(Box::new(worker)),
            Box::new(surface),
            config,
        )
    }

    #[test]
    fn test_detected_rect_reaches_surface() {
        let rect = MatchRect::new(10, 10, 20, 20);
        let surface = RecordingSurface::default();
        let mut live = session(
            StubBackend::new(MatchSet::new(vec![rect])),
            surface.clone(),
            fast_config(30),
        );
        let (_stop_tx, stop_rx) = crossbeam_channel::bounded(1);

        let report = live.run(&stop_rx);

        assert_eq!(report.capture_ticks, 30);
        assert!(report.stats.completed >= 1);
        assert_eq!(*report.last_matches, MatchSet::new(vec![rect]));
        assert!(surface.rects().contains(&rect));
    }

    #[test]
    fn test_slow_backend_never_stacks_requests() {
        let surface = RecordingSurface::default();
        let mut live = session(
            StubBackend::default().with_latency(Duration::from_secs(5)),
            surface.clone(),
            fast_config(10),
        );
        let (_stop_tx, stop_rx) = crossbeam_channel::bounded(1);

        let report = live.run(&stop_rx);

        assert_eq!(report.stats.submitted, 1);
        assert_eq!(report.stats.skipped_ticks, 9);
        assert!(report.last_matches.is_empty());
        assert!(report.render_ticks > 0);
    }

    #[test]
    fn test_timeout_with_slow_backend_keeps_one_request() {
        let surface = RecordingSurface::default();
        let config = SessionConfig {
            detection_timeout: Some(Duration::from_millis(25)),
            ..fast_config(20)
        };
        let mut live = session(
            StubBackend::default().with_latency(Duration::from_secs(5)),
            surface,
            config,
        );
        let (_stop_tx, stop_rx) = crossbeam_channel::bounded(1);

        let report = live.run(&stop_rx);

        assert_eq!(report.stats.timed_out, 1);
        assert_eq!(report.stats.submitted, 1);
        assert_eq!(report.stats.skipped_ticks, 19);
    }

    #[test]
    fn test_stop_signal_ends_session() {
        let surface = RecordingSurface::default();
        let mut live = session(StubBackend::default(), surface, SessionConfig::default());
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        stop_tx.send(()).unwrap();

        let report = live.run(&stop_rx);

        assert_eq!(report.capture_ticks, 0);
        assert_eq!(report.stats, SchedulerStats::default());
    }

    #[derive(Clone, Default)]
    struct MessageLog {
        messages: Arc<Mutex<Vec<String>>>,
    }

    impl PipelineLogger for MessageLog {
        fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
        fn metric(&mut self, _name: &str, _value: f64) {}
        fn info(&mut self, message: &str) {
            self.messages.lock().unwrap().push(message.to_string());
        }
    }

    #[test]
    fn test_session_reports_start_and_stop() {
        let log = MessageLog::default();
        let factory: BackendFactory =
            Box::new(|| Ok(Box::new(StubBackend::default()) as Box<dyn DetectionBackend>));
        let worker = WorkerChannel::new(factory, WorkerOptions::default());
        let scheduler = DetectionScheduler::new(Box::new(worker)).with_logger(Box::new(log.clone()));
        let mut live = LiveSession::new(
            Box::new(StaticFrames),
            scheduler,
            Box::new(RecordingSurface::default()),
            fast_config(3),
        );
        let (_stop_tx, stop_rx) = crossbeam_channel::bounded(1);

        live.run(&stop_rx);

        let messages = log.messages.lock().unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].starts_with("Session running"));
        assert_eq!(messages[1], "Stopping after 3 capture ticks");
    }
}
