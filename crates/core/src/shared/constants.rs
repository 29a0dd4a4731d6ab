/// Working resolution every frame is stretched to before detection.
pub const WORKING_WIDTH: u32 = 640;
pub const WORKING_HEIGHT: u32 = 480;

/// More than this many people in one frame counts as crowded.
pub const DEFAULT_CROWD_THRESHOLD: usize = 15;

pub const PERSON_LABEL: &str = "Person";
pub const HEAD_LABEL: &str = "Head";

/// Class names in model output order, used when none are configured.
pub const DEFAULT_CLASS_NAMES: &[&str] = &[HEAD_LABEL, PERSON_LABEL];

pub const MODEL_NAME: &str = "best.onnx";

/// Output frame rate when the source container does not report one.
pub const FALLBACK_FPS: f64 = 20.0;

/// Offset applied to `created_at` timestamps (Asia/Jakarta, no DST).
pub const DEFAULT_UTC_OFFSET: &str = "+07:00";

pub const VIDEO_CONTENT_TYPES: &[&str] = &["video/mp4", "video/avi", "video/mov"];
pub const IMAGE_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png"];

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp"];

pub const JPEG_QUALITY: u8 = 95;
