use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;

use crowdcount_core::detection::infrastructure::execution_provider::Device;
use crowdcount_core::detection::infrastructure::model_spec::{
    ModelSpec, DEFAULT_CONFIDENCE, DEFAULT_IOU_THRESHOLD,
};
use crowdcount_core::pipeline::counting_config::{parse_utc_offset, ConfigError, CountingConfig};
use crowdcount_core::shared::constants::{DEFAULT_CROWD_THRESHOLD, DEFAULT_UTC_OFFSET};

const STAGING_DIR_NAME: &str = ".staging";

/// HTTP service counting people and heads in uploaded videos and images.
#[derive(Parser, Debug, Clone)]
#[command(name = "crowdcount-server")]
pub struct ServerConfig {
    /// Address to listen on.
    #[arg(long, env = "CROWDCOUNT_BIND", default_value = "0.0.0.0:8000")]
    pub bind: SocketAddr,

    /// Detection model (.onnx). Falls back to the user cache directory.
    #[arg(long, env = "CROWDCOUNT_MODEL")]
    pub model: Option<PathBuf>,

    /// Download location used when the model is not cached.
    #[arg(long, env = "CROWDCOUNT_MODEL_URL")]
    pub model_url: Option<String>,

    /// Inference device: cpu or auto.
    #[arg(long, env = "CROWDCOUNT_DEVICE", default_value = "auto")]
    pub device: Device,

    /// Minimum detection confidence (0.0-1.0).
    #[arg(long, env = "CROWDCOUNT_CONFIDENCE", default_value_t = DEFAULT_CONFIDENCE)]
    pub confidence: f32,

    /// IoU threshold for non-maximum suppression (0.0-1.0).
    #[arg(long, env = "CROWDCOUNT_IOU", default_value_t = DEFAULT_IOU_THRESHOLD)]
    pub iou: f32,

    /// Class names in model index order (comma-separated).
    #[arg(
        long,
        env = "CROWDCOUNT_CLASS_NAMES",
        value_delimiter = ',',
        default_value = "Head,Person"
    )]
    pub class_names: Vec<String>,

    /// Model emits end-to-end `[x1, y1, x2, y2, score, class]` rows (YOLOv10).
    #[arg(long, env = "CROWDCOUNT_END_TO_END")]
    pub end_to_end: bool,

    /// More than this many people in a frame is reported as crowded.
    #[arg(long, env = "CROWDCOUNT_CROWD_THRESHOLD", default_value_t = DEFAULT_CROWD_THRESHOLD)]
    pub crowd_threshold: usize,

    /// Offset applied to the localized created_at column.
    #[arg(long, env = "CROWDCOUNT_UTC_OFFSET", default_value = DEFAULT_UTC_OFFSET)]
    pub utc_offset: String,

    /// SQLite database file.
    #[arg(long, env = "CROWDCOUNT_DATABASE", default_value = "detections.db")]
    pub database: PathBuf,

    /// Directory holding processed videos.
    #[arg(long, env = "CROWDCOUNT_OUTPUT_DIR", default_value = "output_videos")]
    pub output_dir: PathBuf,

    /// Directory for in-progress uploads (default: <output-dir>/.staging).
    #[arg(long, env = "CROWDCOUNT_STAGING_DIR")]
    pub staging_dir: Option<PathBuf>,

    /// TrueType font for overlay text. Defaults to a system font.
    #[arg(long, env = "CROWDCOUNT_FONT")]
    pub font: Option<PathBuf>,

    /// Number of detector instances, i.e. concurrently processed uploads.
    #[arg(long, env = "CROWDCOUNT_WORKERS", default_value_t = 2)]
    pub workers: usize,

    /// Upper bound on processing time per request, in seconds.
    #[arg(long, env = "CROWDCOUNT_REQUEST_TIMEOUT", default_value_t = 600)]
    pub request_timeout_secs: u64,

    /// Largest accepted upload, in megabytes.
    #[arg(long, env = "CROWDCOUNT_MAX_UPLOAD_MB", default_value_t = 512)]
    pub max_upload_mb: usize,

    /// Base URL used in returned video links (default: from the Host header).
    #[arg(long, env = "CROWDCOUNT_PUBLIC_URL")]
    pub public_url: Option<String>,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.workers == 0 {
            return Err("Workers must be at least 1".into());
        }
        if self.request_timeout_secs == 0 {
            return Err("Request timeout must be at least 1 second".into());
        }
        if self.max_upload_mb == 0 {
            return Err("Max upload size must be at least 1 MB".into());
        }
        self.counting_config()?;
        Ok(())
    }

    pub fn counting_config(&self) -> Result<CountingConfig, ConfigError> {
        Ok(CountingConfig::new(
            self.crowd_threshold,
            parse_utc_offset(&self.utc_offset)?,
        ))
    }

    /// Detector settings for a resolved model file.
    pub fn model_spec(&self, model_path: &Path) -> ModelSpec {
        ModelSpec {
            model_path: model_path.to_path_buf(),
            device: self.device,
            confidence: self.confidence,
            iou_threshold: self.iou,
            class_names: self
                .class_names
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            end_to_end: self.end_to_end,
        }
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir
            .clone()
            .unwrap_or_else(|| self.output_dir.join(STAGING_DIR_NAME))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ServerConfig {
        let mut argv = vec!["crowdcount-server"];
        argv.extend_from_slice(args);
        ServerConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_match_service_layout() {
        let config = parse(&[]);
        assert_eq!(config.bind.port(), 8000);
        assert_eq!(config.database, PathBuf::from("detections.db"));
        assert_eq!(config.output_dir, PathBuf::from("output_videos"));
        assert_eq!(config.staging_dir(), PathBuf::from("output_videos/.staging"));
        assert_eq!(config.class_names, vec!["Head", "Person"]);
        assert_eq!(config.crowd_threshold, 15);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_class_names_split_and_trimmed() {
        let config = parse(&["--class-names", "person, head ,"]);
        let spec = config.model_spec(Path::new("m.onnx"));
        assert_eq!(spec.class_names, vec!["person", "head"]);
        assert_eq!(spec.device, Device::Auto);
        assert!(!spec.end_to_end);
    }

    #[test]
    fn test_end_to_end_flag_reaches_model_spec() {
        let config = parse(&["--end-to-end"]);
        assert!(config.model_spec(Path::new("m.onnx")).end_to_end);
    }

    #[test]
    fn test_explicit_staging_dir_wins() {
        let config = parse(&["--staging-dir", "/tmp/uploads"]);
        assert_eq!(config.staging_dir(), PathBuf::from("/tmp/uploads"));
    }

    #[test]
    fn test_invalid_offset_rejected() {
        let config = parse(&["--utc-offset", "Asia/Jakarta"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = parse(&["--workers", "0"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_device_rejected_at_parse() {
        assert!(ServerConfig::try_parse_from(["crowdcount-server", "--device", "tpu"]).is_err());
    }

    #[test]
    fn test_upload_limit_in_bytes() {
        let config = parse(&["--max-upload-mb", "2"]);
        assert_eq!(config.max_upload_bytes(), 2 * 1024 * 1024);
        assert_eq!(config.request_timeout(), Duration::from_secs(600));
    }
}
