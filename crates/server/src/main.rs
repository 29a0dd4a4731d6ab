use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use axum::Router;
use clap::Parser;

use crowdcount_core::annotation::infrastructure::font_loader::load_font;
use crowdcount_core::annotation::infrastructure::imageproc_annotator::ImageprocAnnotator;
use crowdcount_core::detection::domain::object_detector::ObjectDetector;
use crowdcount_core::detection::infrastructure::detector_pool::DetectorPool;
use crowdcount_core::detection::infrastructure::model_resolver::{self, ModelSource};
use crowdcount_core::detection::infrastructure::onnx_yolo_detector::OnnxYoloDetector;
use crowdcount_core::recording::infrastructure::sqlite_recorder::SqliteRecorderFactory;
use crowdcount_core::shared::constants::MODEL_NAME;
use crowdcount_core::video::infrastructure::image_crate_codec::ImageCrateCodec;

use crowdcount_server::config::ServerConfig;
use crowdcount_server::processor::CountingProcessor;
use crowdcount_server::routes::router;
use crowdcount_server::state::AppState;

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::parse();
    config.validate()?;

    let processor = build_processor(&config)?;
    fs::create_dir_all(&config.output_dir)?;
    fs::create_dir_all(config.staging_dir())?;

    let state = AppState::new(
        Arc::new(processor),
        config.output_dir.clone(),
        config.staging_dir(),
    )
    .with_request_timeout(config.request_timeout())
    .with_public_url(config.public_url.clone());
    let app = router(state, config.max_upload_bytes());

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve(app, config.bind))
}

/// Loads the model into `workers` detectors and opens the database, so
/// misconfiguration fails at startup rather than on the first request.
fn build_processor(config: &ServerConfig) -> Result<CountingProcessor, Box<dyn std::error::Error>> {
    let cache_dir = match config.model {
        Some(_) => PathBuf::new(),
        None => model_resolver::model_cache_dir()?,
    };
    let model_path = model_resolver::resolve(
        &ModelSource {
            explicit: config.model.as_deref(),
            name: MODEL_NAME,
            url: config.model_url.as_deref(),
            cache_dir: &cache_dir,
        },
        Some(Box::new(download_progress)),
    )?;

    let spec = config.model_spec(&model_path);
    spec.validate()?;
    log::info!(
        "Loading {} x{} on {} (classes: {})",
        spec.model_path.display(),
        config.workers,
        spec.device,
        spec.class_names.join(", ")
    );
    let detectors = DetectorPool::build(config.workers, || {
        Ok(Box::new(OnnxYoloDetector::new(&spec)?) as Box<dyn ObjectDetector>)
    })?;

    let annotator = ImageprocAnnotator::new(load_font(config.font.as_deref())?);
    let counting = config.counting_config()?;
    let recorders = SqliteRecorderFactory::new(config.database.clone(), counting.utc_offset)?;
    log::info!("Recording counts to {}", recorders.db_path().display());

    Ok(CountingProcessor::new(
        detectors,
        Arc::new(annotator),
        Box::new(recorders),
        Arc::new(ImageCrateCodec::default()),
        counting,
        config.request_timeout(),
    ))
}

async fn serve(app: Router, addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    log::info!("Shutting down");
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 && downloaded == total {
        log::info!("Model download complete ({total} bytes)");
    } else if total > 0 && downloaded % (16 * 1024 * 1024) < 1024 * 1024 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        log::info!("Downloading model... {pct}%");
    }
}
