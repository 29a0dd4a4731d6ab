use std::path::PathBuf;

use crate::shared::constants::FALLBACK_FPS;

#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}

impl VideoMetadata {
    /// Metadata describing the annotated output: same timing as the source,
    /// but at the given frame size.
    pub fn with_frame_size(&self, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..self.clone()
        }
    }

    /// Frame rate for encoding, substituting the fallback when the source
    /// reported none.
    pub fn output_fps(&self) -> f64 {
        if self.fps.is_finite() && self.fps > 0.0 {
            self.fps
        } else {
            FALLBACK_FPS
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn meta(fps: f64) -> VideoMetadata {
        VideoMetadata {
            width: 1920,
            height: 1080,
            fps,
            total_frames: 900,
            codec: "h264".to_string(),
            source_path: Some(PathBuf::from("/tmp/test.mp4")),
        }
    }

    #[test]
    fn test_with_frame_size_keeps_timing() {
        let out = meta(25.0).with_frame_size(640, 480);
        assert_eq!(out.width, 640);
        assert_eq!(out.height, 480);
        assert_eq!(out.fps, 25.0);
        assert_eq!(out.total_frames, 900);
        assert_eq!(out.source_path, Some(PathBuf::from("/tmp/test.mp4")));
    }

    #[rstest]
    #[case::reported(29.97, 29.97)]
    #[case::zero(0.0, FALLBACK_FPS)]
    #[case::negative(-1.0, FALLBACK_FPS)]
    #[case::nan(f64::NAN, FALLBACK_FPS)]
    fn test_output_fps(#[case] fps: f64, #[case] expected: f64) {
        assert_eq!(meta(fps).output_fps(), expected);
    }
}
