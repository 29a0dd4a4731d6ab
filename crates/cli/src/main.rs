use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::Parser;

use crowdcount_core::annotation::infrastructure::font_loader::load_font;
use crowdcount_core::annotation::infrastructure::imageproc_annotator::ImageprocAnnotator;
use crowdcount_core::detection::infrastructure::execution_provider::Device;
use crowdcount_core::detection::infrastructure::model_resolver::{self, ModelSource};
use crowdcount_core::detection::infrastructure::model_spec::{
    ModelSpec, DEFAULT_CONFIDENCE, DEFAULT_IOU_THRESHOLD,
};
use crowdcount_core::detection::infrastructure::onnx_yolo_detector::OnnxYoloDetector;
use crowdcount_core::pipeline::count_image_use_case::CountImageUseCase;
use crowdcount_core::pipeline::count_video_use_case::CountVideoUseCase;
use crowdcount_core::pipeline::counting_config::{parse_utc_offset, CountingConfig};
use crowdcount_core::pipeline::frame_processor::FrameProcessor;
use crowdcount_core::pipeline::pipeline_logger::{LogPipelineLogger, PipelineLogger};
use crowdcount_core::recording::domain::count_recorder::RecorderFactory;
use crowdcount_core::recording::infrastructure::sqlite_recorder::SqliteRecorderFactory;
use crowdcount_core::shared::constants::{
    DEFAULT_CROWD_THRESHOLD, DEFAULT_UTC_OFFSET, IMAGE_EXTENSIONS, MODEL_NAME,
};
use crowdcount_core::video::infrastructure::ffmpeg_reader::FfmpegReader;
use crowdcount_core::video::infrastructure::ffmpeg_writer::FfmpegWriter;
use crowdcount_core::video::infrastructure::image_crate_codec::ImageCrateCodec;

/// Person and head counting for local videos and images.
#[derive(Parser)]
#[command(name = "crowdcount")]
struct Cli {
    /// Input video or image file.
    input: PathBuf,

    /// Output file (default: final_<name> next to the input).
    output: Option<PathBuf>,

    /// Detection model (.onnx). Falls back to the user cache directory.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Download location used when the model is not cached.
    #[arg(long)]
    model_url: Option<String>,

    /// Inference device: cpu or auto.
    #[arg(long, default_value = "auto")]
    device: Device,

    /// Detection confidence threshold (0.0-1.0).
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE)]
    confidence: f32,

    /// IoU threshold for non-maximum suppression (0.0-1.0).
    #[arg(long, default_value_t = DEFAULT_IOU_THRESHOLD)]
    iou: f32,

    /// Class names in model index order (comma-separated).
    #[arg(long, value_delimiter = ',', default_value = "Head,Person")]
    class_names: Vec<String>,

    /// Model emits end-to-end `[x1, y1, x2, y2, score, class]` rows (YOLOv10).
    #[arg(long)]
    end_to_end: bool,

    /// More than this many people in a frame is reported as crowded.
    #[arg(long, default_value_t = DEFAULT_CROWD_THRESHOLD)]
    crowd_threshold: usize,

    /// Offset applied to the localized created_at column.
    #[arg(long, default_value = DEFAULT_UTC_OFFSET)]
    utc_offset: String,

    /// SQLite database the per-frame counts are appended to.
    #[arg(long, default_value = "detections.db")]
    database: PathBuf,

    /// TrueType font for overlay text. Defaults to a system font.
    #[arg(long)]
    font: Option<PathBuf>,
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

    let image = is_image(&cli.input);
    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output(&cli.input, image));
    let config = CountingConfig::new(cli.crowd_threshold, parse_utc_offset(&cli.utc_offset)?);
    let recorders = SqliteRecorderFactory::new(cli.database.clone(), config.utc_offset)?;
    let processor = build_processor(&cli, &config)?;

    if image {
        run_image(&cli.input, &output, processor, &recorders)
    } else {
        run_video(&cli.input, &output, processor, &recorders)
    }
}

fn run_image(
    input: &Path,
    output: &Path,
    processor: FrameProcessor,
    recorders: &dyn RecorderFactory,
) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = fs::read(input)?;
    let mut use_case = CountImageUseCase::new(
        Arc::new(ImageCrateCodec::default()),
        recorders.open()?,
        processor,
        Box::new(LogPipelineLogger::new(label(input), 1)),
    );
    let result = use_case.execute(&bytes)?;
    fs::write(output, &result.jpeg)?;
    log::info!("Output written to {}", output.display());
    eprintln!(
        "{} people, {} heads -> {}",
        result.counts.person,
        result.counts.head,
        output.display()
    );
    Ok(())
}

fn run_video(
    input: &Path,
    output: &Path,
    processor: FrameProcessor,
    recorders: &dyn RecorderFactory,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut use_case = CountVideoUseCase::new(
        Box::new(FfmpegReader::new()),
        Box::new(FfmpegWriter::new()),
        recorders.open()?,
        processor,
        Box::new(ConsoleLogger::new(label(input))),
    );
    let summary = use_case.execute(input, output)?;
    eprintln!();
    log::info!("Output written to {}", output.display());
    eprintln!(
        "{} frames at {:.1} fps, peak {} people / {} heads -> {}",
        summary.frames,
        summary.fps,
        summary.peak.person,
        summary.peak.head,
        output.display()
    );
    Ok(())
}

fn build_processor(
    cli: &Cli,
    config: &CountingConfig,
) -> Result<FrameProcessor, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {MODEL_NAME}");
    let cache_dir = match cli.model {
        Some(_) => PathBuf::new(),
        None => model_resolver::model_cache_dir()?,
    };
    let model_path = model_resolver::resolve(
        &ModelSource {
            explicit: cli.model.as_deref(),
            name: MODEL_NAME,
            url: cli.model_url.as_deref(),
            cache_dir: &cache_dir,
        },
        Some(Box::new(download_progress)),
    )?;

    let spec = ModelSpec {
        device: cli.device,
        confidence: cli.confidence,
        iou_threshold: cli.iou,
        class_names: cli
            .class_names
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        end_to_end: cli.end_to_end,
        ..ModelSpec::new(model_path)
    };
    spec.validate()?;

    let detector = OnnxYoloDetector::new(&spec)?;
    let annotator = ImageprocAnnotator::new(load_font(cli.font.as_deref())?);
    Ok(FrameProcessor::new(
        Box::new(detector),
        Arc::new(annotator),
        config.classifier(),
    ))
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.input.is_file() {
        return Err(format!("Input file not found: {}", cli.input.display()).into());
    }
    if let Some(output) = &cli.output {
        if output == &cli.input {
            return Err("Output must differ from the input file".into());
        }
    }
    Ok(())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// `final_<stem>.mp4` for videos, `final_<stem>.jpg` for images.
fn default_output(input: &Path, image: bool) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let extension = if image { "jpg" } else { "mp4" };
    input.with_file_name(format!("final_{stem}.{extension}"))
}

fn label(input: &Path) -> String {
    input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string())
}

/// Frame progress on stderr, stage timings through the log summary.
struct ConsoleLogger {
    inner: LogPipelineLogger,
}

impl ConsoleLogger {
    fn new(label: String) -> Self {
        Self {
            inner: LogPipelineLogger::new(label, usize::MAX),
        }
    }
}

impl PipelineLogger for ConsoleLogger {
    fn progress(&mut self, current: usize, total: usize) {
        if total > 0 {
            eprint!("\rProcessing frame {current}/{total}");
        } else {
            eprint!("\rProcessing frame {current}");
        }
        self.inner.progress(current, total);
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.inner.timing(stage, duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.inner.metric(name, value);
    }

    fn info(&mut self, message: &str) {
        self.inner.info(message);
    }

    fn summary(&self) {
        self.inner.summary();
    }
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading detection model... {pct}%");
    } else {
        eprint!("\rDownloading detection model... {downloaded} bytes");
    }
}
