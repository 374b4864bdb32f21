mod settings;

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use faceguide_core::capture::domain::frame_source::FrameSource;
use faceguide_core::capture::frame_pump::FramePump;
use faceguide_core::capture::frame_slot::FrameSlot;
use faceguide_core::capture::infrastructure::ffmpeg_frame_source::FfmpegFrameSource;
use faceguide_core::detection::domain::face_detector::{FaceDetector, PerformanceMode};
use faceguide_core::detection::infrastructure::execution_provider::accelerator_name;
use faceguide_core::detection::infrastructure::face_detector_adapter::FaceDetectorAdapter;
use faceguide_core::detection::infrastructure::model_resolver::ModelResolver;
use faceguide_core::detection::infrastructure::onnx_yolo_detector::OnnxYoloDetector;
use faceguide_core::guidance::domain::guidance_decision::GuidanceDecision;
use faceguide_core::guidance::infrastructure::channel_guidance_sink::guidance_channel;
use faceguide_core::pipeline::guidance_pipeline::{GuidancePipeline, PipelineConfig};
use faceguide_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use faceguide_core::shared::constants::{DEFAULT_IDLE_POLL_MS, YOLO_MODEL_NAME};

use settings::{Settings, SettingsOverrides};

/// How often the display loop wakes to check whether analysis has ended.
const DISPLAY_POLL: Duration = Duration::from_millis(100);

/// Live face centering guidance for a video file or capture device.
#[derive(Parser)]
#[command(name = "faceguide", version)]
struct Cli {
    /// Input video file or capture device (e.g. /dev/video0).
    input: PathBuf,

    /// Settings file (default: <config dir>/FaceGuide/settings.json).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Analysis frame width in pixels.
    #[arg(long)]
    width: Option<u32>,

    /// Analysis frame height in pixels.
    #[arg(long)]
    height: Option<u32>,

    /// Horizontal shift of the target center from the frame center.
    #[arg(long, allow_negative_numbers = true)]
    offset_x: Option<i32>,

    /// Vertical shift of the target center from the frame center.
    #[arg(long, allow_negative_numbers = true)]
    offset_y: Option<i32>,

    /// Fraction of each frame dimension accepted as centered (0.0-1.0, exclusive).
    #[arg(long)]
    tolerance: Option<f64>,

    /// Detector mode: fast or accurate.
    #[arg(long)]
    mode: Option<PerformanceMode>,

    /// Pace file input at its frame rate like a live camera (true/false).
    #[arg(long)]
    realtime: Option<bool>,

    /// ONNX face model to use instead of the downloaded default.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Write the resolved settings to the default settings file.
    #[arg(long)]
    save_settings: bool,
}

impl Cli {
    fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            target_width: self.width,
            target_height: self.height,
            offset_x: self.offset_x,
            offset_y: self.offset_y,
            tolerance: self.tolerance,
            mode: self.mode,
            realtime: self.realtime,
        }
    }
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

    let mut settings = Settings::load(cli.config.as_deref())?;
    settings.apply(&cli.overrides());
    let target = settings.center_target()?;

    if cli.save_settings {
        let path = Settings::default_path()?;
        settings.save_to(&path)?;
        log::info!("Settings saved to {}", path.display());
    }

    let detector = build_detector(cli.model.as_deref(), settings.performance_mode())?;

    let mut source = FfmpegFrameSource::new(&cli.input)
        .with_target_size(settings.target_width, settings.target_height);
    let metadata = source.open()?;
    let pace = if settings.realtime {
        metadata.frame_interval()
    } else {
        None
    };

    let slot = Arc::new(FrameSlot::new());
    let (sink, mut feed) = guidance_channel();
    let pipeline = GuidancePipeline::start(
        slot.clone(),
        FaceDetectorAdapter::spawn(detector)?,
        Box::new(sink),
        Box::new(StdoutPipelineLogger::new()),
        PipelineConfig {
            target,
            idle_poll: Duration::from_millis(DEFAULT_IDLE_POLL_MS),
        },
    )?;
    let pump = FramePump::start(Box::new(source), slot, pace)?;

    while pipeline.is_running() {
        if let Some(decision) = feed.next_timeout(DISPLAY_POLL) {
            render(&decision);
        }
    }

    let stats = pipeline.finish();
    let pump_stats = pump.join();
    while let Some(decision) = feed.next_timeout(Duration::ZERO) {
        render(&decision);
    }

    log::info!(
        "Analysed {} of {} frames ({} centered, {} directional, {} no face, {} skipped)",
        stats.cycles,
        pump_stats.produced,
        stats.centered,
        stats.directional,
        stats.no_face,
        stats.dropped_frames
    );
    if stats.detection_failures > 0 {
        log::warn!("{} frames failed detection", stats.detection_failures);
    }
    if pump_stats.released() != pump_stats.produced {
        log::warn!(
            "{} of {} frames were not released",
            pump_stats.produced - pump_stats.released(),
            pump_stats.produced
        );
    }

    Ok(())
}

fn render(decision: &GuidanceDecision) {
    let marker = if decision.is_centered() { "✓" } else { "→" };
    println!("{marker} {decision}");
}

fn build_detector(
    model: Option<&Path>,
    mode: PerformanceMode,
) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    let model_path = match model {
        Some(path) => path.to_path_buf(),
        None => {
            log::info!("Resolving model: {YOLO_MODEL_NAME}");
            let path = ModelResolver::new()?.resolve_face_model(Some(Box::new(download_progress)))?;
            eprintln!();
            path
        }
    };

    log::info!("Running {mode} detection on {}", accelerator_name());
    Ok(Box::new(OnnxYoloDetector::new(&model_path, mode)?))
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.input.exists() {
        return Err(format!("Input not found: {}", cli.input.display()).into());
    }
    if let Some(path) = &cli.config {
        if !path.exists() {
            return Err(format!("Settings file not found: {}", path.display()).into());
        }
    }
    if let Some(path) = &cli.model {
        if !path.exists() {
            return Err(format!("Model file not found: {}", path.display()).into());
        }
    }
    if let Some(t) = cli.tolerance {
        if !(t > 0.0 && t < 1.0) {
            return Err(format!("Tolerance must be between 0.0 and 1.0 (exclusive), got {t}").into());
        }
    }
    if cli.width == Some(0) || cli.height == Some(0) {
        return Err("Width and height must be positive".into());
    }
    Ok(())
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
}
