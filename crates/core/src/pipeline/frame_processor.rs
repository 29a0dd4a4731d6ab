use std::sync::Arc;
use std::time::Instant;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::detection::domain::crowd_status::CrowdClassifier;
use crate::detection::domain::object_counts::ObjectCounts;
use crate::detection::domain::object_detector::ObjectDetector;
use crate::pipeline::error::PipelineError;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::recording::domain::count_recorder::CountRecorder;
use crate::shared::constants::{WORKING_HEIGHT, WORKING_WIDTH};
use crate::shared::frame::Frame;

/// The per-frame loop body shared by the video and image pipelines:
/// resize → detect → count → record → annotate.
pub struct FrameProcessor {
    detector: Box<dyn ObjectDetector>,
    annotator: Arc<dyn FrameAnnotator>,
    classifier: CrowdClassifier,
}

impl FrameProcessor {
    pub fn new(
        detector: Box<dyn ObjectDetector>,
        annotator: Arc<dyn FrameAnnotator>,
        classifier: CrowdClassifier,
    ) -> Self {
        Self {
            detector,
            annotator,
            classifier,
        }
    }

    /// Processes one frame and returns it annotated at working resolution.
    ///
    /// The counts row is written before annotation, so a frame whose
    /// annotation fails is still recorded.
    pub fn process(
        &mut self,
        frame: Frame,
        recorder: &mut dyn CountRecorder,
        logger: &mut dyn PipelineLogger,
    ) -> Result<(Frame, ObjectCounts), PipelineError> {
        if frame.is_degenerate() {
            return Err(PipelineError::InputValidation(format!(
                "Frame {} has no pixels ({}x{})",
                frame.index(),
                frame.width(),
                frame.height()
            )));
        }
        let frame = frame
            .resized(WORKING_WIDTH, WORKING_HEIGHT)
            .map_err(|e| PipelineError::InputValidation(format!("Invalid frame: {e}")))?;

        let t0 = Instant::now();
        let detections = self
            .detector
            .detect(&frame)
            .map_err(PipelineError::inference)?;
        logger.timing("detect", elapsed_ms(t0));
        logger.metric("detections", detections.len() as f64);

        let counts = ObjectCounts::count(&detections);
        let status = self.classifier.classify(counts.person);

        let t0 = Instant::now();
        recorder.record(counts).map_err(PipelineError::storage)?;
        logger.timing("record", elapsed_ms(t0));

        let t0 = Instant::now();
        let annotated = self
            .annotator
            .annotate(frame, &detections, counts, status)
            .map_err(|e| PipelineError::InputValidation(format!("Cannot annotate frame: {e}")))?;
        logger.timing("annotate", elapsed_ms(t0));

        Ok((annotated, counts))
    }
}

pub(crate) fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}
