use crate::detection::domain::detection::DetectionSet;
use crate::shared::frame::Frame;

/// Domain interface for object detection.
///
/// Inference sessions need exclusive access while running, hence `&mut self`.
pub trait ObjectDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<DetectionSet, Box<dyn std::error::Error>>;
}
