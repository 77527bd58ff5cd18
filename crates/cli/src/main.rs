use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use facecam_core::capture::domain::capture_device::CaptureDevice;
use facecam_core::capture::frame_source::Camera;
use facecam_core::capture::infrastructure::image_file_device::ImageFileDevice;
use facecam_core::capture::infrastructure::synthetic_device::SyntheticDevice;
use facecam_core::detection::domain::detection_backend::DetectionBackend;
use facecam_core::detection::infrastructure::stub_backend::StubBackend;
use facecam_core::detection::infrastructure::subprocess_backend::SubprocessBackend;
use facecam_core::detection::infrastructure::worker_channel::{
    BackendFactory, WorkerChannel, WorkerOptions,
};
use facecam_core::pipeline::detection_scheduler::DetectionScheduler;
use facecam_core::pipeline::infrastructure::live_session::LiveSession;
use facecam_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use facecam_core::pipeline::session_config::SessionConfig;
use facecam_core::rendering::infrastructure::image_surface::ImageSurface;
use facecam_core::shared::constants::IMAGE_EXTENSIONS;

/// Live camera preview with face boxes from an out-of-line detector.
#[derive(Parser)]
#[command(name = "facecam")]
struct Cli {
    /// Capture device: "synthetic" or a path to a still image.
    #[arg(long, default_value = "synthetic")]
    device: String,

    /// Native width of the synthetic device.
    #[arg(long, default_value = "640")]
    width: u32,

    /// Native height of the synthetic device.
    #[arg(long, default_value = "480")]
    height: u32,

    /// Detector program speaking JSON lines on stdin/stdout.
    /// Without one, a stub that never finds anything is used.
    #[arg(long)]
    detector: Option<PathBuf>,

    /// Extra argument for the detector program (repeatable).
    #[arg(long = "detector-arg")]
    detector_args: Vec<String>,

    /// JSON file sent to the detector once before the first request.
    #[arg(long)]
    init_payload: Option<PathBuf>,

    /// Merge overlapping boxes into one.
    #[arg(long)]
    join_overlaps: bool,

    #[arg(long, default_value = "100")]
    capture_interval_ms: u64,

    #[arg(long, default_value = "100")]
    render_interval_ms: u64,

    /// Give up on a detection after this long (disabled when omitted).
    #[arg(long)]
    detection_timeout_ms: Option<u64>,

    /// How long to wait for the camera to report its size.
    #[arg(long, default_value = "10000")]
    ready_timeout_ms: u64,

    /// Stop after this many capture ticks (runs until Ctrl-C when omitted).
    #[arg(long)]
    ticks: Option<u64>,

    /// Write every rendered frame as PNG into this directory.
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let mut camera = Camera::new(build_device(&cli));
    let live = camera
        .start()?
        .wait_timeout(Duration::from_millis(cli.ready_timeout_ms))?;
    let dims = live.output_dimensions();
    log::info!(
        "Camera ready via {:?}, output {}x{}",
        live.ready_path(),
        dims.width,
        dims.height
    );

    let config = session_config(&cli);
    let options = WorkerOptions {
        init_payload: cli.init_payload.as_deref().map(std::fs::read).transpose()?,
        join_overlaps: config.join_overlaps,
    };
    let worker = WorkerChannel::new(build_backend_factory(&cli), options);
    let scheduler =
        DetectionScheduler::new(Box::new(worker)).with_logger(Box::new(StdoutPipelineLogger::new()));

    let mut surface = ImageSurface::new(dims.width, dims.height);
    if let Some(ref dir) = cli.snapshot_dir {
        surface = surface.with_snapshot_dir(dir);
    }

    let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })?;

    let mut session = LiveSession::new(Box::new(live), scheduler, Box::new(surface), config);
    let report = session.run(&stop_rx);

    log::info!(
        "Ran {} capture / {} render ticks: {} submitted, {} completed, {} failed, {} timed out, {} skipped",
        report.capture_ticks,
        report.render_ticks,
        report.stats.submitted,
        report.stats.completed,
        report.stats.failed,
        report.stats.timed_out,
        report.stats.skipped_ticks
    );
    if let Some(ref dir) = cli.snapshot_dir {
        log::info!("Snapshots written to {}", dir.display());
    }
    println!("{}", serde_json::to_string(&*report.last_matches)?);
    Ok(())
}

fn build_device(cli: &Cli) -> Arc<dyn CaptureDevice> {
    if cli.device == "synthetic" {
        Arc::new(SyntheticDevice::new(cli.width, cli.height))
    } else {
        Arc::new(ImageFileDevice::new(&cli.device))
    }
}

fn build_backend_factory(cli: &Cli) -> BackendFactory {
    match cli.detector.clone() {
        Some(program) => {
            let args = cli.detector_args.clone();
            Box::new(move || {
                SubprocessBackend::spawn(&program, &args)
                    .map(|backend| Box::new(backend) as Box<dyn DetectionBackend>)
            })
        }
        None => {
            log::warn!("No --detector given; using a stub that reports no faces");
            Box::new(|| Ok(Box::new(StubBackend::default()) as Box<dyn DetectionBackend>))
        }
    }
}

fn session_config(cli: &Cli) -> SessionConfig {
    SessionConfig {
        capture_interval: Duration::from_millis(cli.capture_interval_ms),
        render_interval: Duration::from_millis(cli.render_interval_ms),
        detection_timeout: cli.detection_timeout_ms.map(Duration::from_millis),
        join_overlaps: cli.join_overlaps,
        max_capture_ticks: cli.ticks,
    }
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if cli.device != "synthetic" {
        let path = Path::new(&cli.device);
        if !path.exists() {
            return Err(format!("Device image not found: {}", path.display()).into());
        }
        if !is_image(path) {
            return Err(format!(
                "Device must be 'synthetic' or an image ({}), got '{}'",
                IMAGE_EXTENSIONS.join(", "),
                cli.device
            )
            .into());
        }
    }
    if cli.width == 0 || cli.height == 0 {
        return Err(format!("Synthetic size must be non-zero, got {}x{}", cli.width, cli.height).into());
    }
    if cli.capture_interval_ms == 0 || cli.render_interval_ms == 0 {
        return Err("Tick intervals must be at least 1ms".into());
    }
    if let Some(ref payload) = cli.init_payload {
        if !payload.exists() {
            return Err(format!("Init payload not found: {}", payload.display()).into());
        }
    }
    if cli.ticks == Some(0) {
        return Err("--ticks must be at least 1".into());
    }
    Ok(())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
