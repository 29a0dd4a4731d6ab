use crate::shared::bounding_box::BoundingBox;
use crate::shared::constants::{HEAD_LABEL, PERSON_LABEL};

/// The classes this system counts. Everything else the model reports is
/// carried as `Other` so it can still be drawn, but it is never counted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectClass {
    Person,
    Head,
    Other,
}

impl ObjectClass {
    /// Exact, case-sensitive mapping from a model label.
    pub fn from_label(label: &str) -> Self {
        match label {
            PERSON_LABEL => ObjectClass::Person,
            HEAD_LABEL => ObjectClass::Head,
            _ => ObjectClass::Other,
        }
    }
}

/// One object instance reported by the model for a single frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    class: ObjectClass,
    label: String,
    confidence: f32,
    bbox: BoundingBox,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        let label = label.into();
        Self {
            class: ObjectClass::from_label(&label),
            label,
            confidence,
            bbox,
        }
    }

    pub fn class(&self) -> ObjectClass {
        self.class
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }
}

/// All detections for one frame, in model output order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionSet {
    detections: Vec<Detection>,
}

impl DetectionSet {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.detections.iter()
    }

    pub fn count_of(&self, class: ObjectClass) -> usize {
        self.detections.iter().filter(|d| d.class == class).count()
    }
}

impl FromIterator<Detection> for DetectionSet {
    fn from_iter<I: IntoIterator<Item = Detection>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a DetectionSet {
    type Item = &'a Detection;
    type IntoIter = std::slice::Iter<'a, Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.detections.iter()
    }
}
