use std::path::PathBuf;

use thiserror::Error;

use super::execution_provider::Device;
use crate::shared::constants::DEFAULT_CLASS_NAMES;

/// Default minimum score for a detection to be kept.
pub const DEFAULT_CONFIDENCE: f32 = 0.25;

/// Default IoU above which same-class boxes are suppressed.
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;

#[derive(Error, Debug, PartialEq)]
pub enum ModelSpecError {
    #[error("model file not found: {0}")]
    MissingModel(PathBuf),
    #[error("confidence must be between 0.0 and 1.0, got {0}")]
    Confidence(f32),
    #[error("IoU threshold must be between 0.0 and 1.0, got {0}")]
    IouThreshold(f32),
    #[error("at least one class name is required")]
    NoClassNames,
}

/// Everything needed to build a detector, resolved once at startup and
/// shared read-only by every detector instance built from it.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelSpec {
    pub model_path: PathBuf,
    pub device: Device,
    pub confidence: f32,
    pub iou_threshold: f32,
    /// Label for each class index the model emits.
    pub class_names: Vec<String>,
    /// Model exports already-suppressed `[x1, y1, x2, y2, score, class]`
    /// rows (YOLOv10 style) instead of per-class scores.
    pub end_to_end: bool,
}

impl ModelSpec {
    pub fn new(model_path: PathBuf) -> Self {
        Self {
            model_path,
            device: Device::default(),
            confidence: DEFAULT_CONFIDENCE,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            class_names: DEFAULT_CLASS_NAMES.iter().map(|s| s.to_string()).collect(),
            end_to_end: false,
        }
    }

    pub fn validate(&self) -> Result<(), ModelSpecError> {
        if !self.model_path.is_file() {
            return Err(ModelSpecError::MissingModel(self.model_path.clone()));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(ModelSpecError::Confidence(self.confidence));
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(ModelSpecError::IouThreshold(self.iou_threshold));
        }
        if self.class_names.is_empty() {
            return Err(ModelSpecError::NoClassNames);
        }
        Ok(())
    }

    /// Label for a class index; indices past the configured names get a
    /// placeholder that never matches a counted class.
    pub fn label_for(&self, class_id: usize) -> String {
        self.class_names
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class_{class_id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn spec_with_file() -> (NamedTempFile, ModelSpec) {
        let file = NamedTempFile::new().unwrap();
        let spec = ModelSpec::new(file.path().to_path_buf());
        (file, spec)
    }

    #[test]
    fn test_defaults_are_valid() {
        let (_file, spec) = spec_with_file();
        assert_eq!(spec.validate(), Ok(()));
        assert_eq!(spec.class_names, vec!["Head", "Person"]);
        assert!(!spec.end_to_end);
    }

    #[test]
    fn test_missing_model_rejected() {
        let spec = ModelSpec::new(PathBuf::from("/nonexistent/best.onnx"));
        assert!(matches!(
            spec.validate(),
            Err(ModelSpecError::MissingModel(_))
        ));
    }

    #[test]
    fn test_confidence_out_of_range_rejected() {
        let (_file, mut spec) = spec_with_file();
        spec.confidence = 1.5;
        assert_eq!(spec.validate(), Err(ModelSpecError::Confidence(1.5)));
    }

    #[test]
    fn test_iou_out_of_range_rejected() {
        let (_file, mut spec) = spec_with_file();
        spec.iou_threshold = -0.1;
        assert_eq!(spec.validate(), Err(ModelSpecError::IouThreshold(-0.1)));
    }

    #[test]
    fn test_empty_class_names_rejected() {
        let (_file, mut spec) = spec_with_file();
        spec.class_names.clear();
        assert_eq!(spec.validate(), Err(ModelSpecError::NoClassNames));
    }

    #[test]
    fn test_label_for_unknown_index() {
        let (_file, spec) = spec_with_file();
        assert_eq!(spec.label_for(1), "Person");
        assert_eq!(spec.label_for(9), "class_9");
    }
}
