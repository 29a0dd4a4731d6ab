use crate::detection::domain::crowd_status::CrowdStatus;
use crate::detection::domain::detection::DetectionSet;
use crate::detection::domain::object_counts::ObjectCounts;
use crate::shared::frame::Frame;

/// Domain interface for drawing detections and count overlays onto a frame.
///
/// Takes the frame by value so implementations can draw into its buffer
/// without copying. A degenerate frame is rejected with an error.
pub trait FrameAnnotator: Send + Sync {
    fn annotate(
        &self,
        frame: Frame,
        detections: &DetectionSet,
        counts: ObjectCounts,
        status: CrowdStatus,
    ) -> Result<Frame, Box<dyn std::error::Error>>;
}
