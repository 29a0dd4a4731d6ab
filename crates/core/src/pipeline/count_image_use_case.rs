use std::sync::Arc;
use std::time::Instant;

use crate::detection::domain::object_counts::ObjectCounts;
use crate::recording::domain::count_recorder::CountRecorder;
use crate::video::domain::image_codec::ImageCodec;

use super::error::PipelineError;
use super::frame_processor::{elapsed_ms, FrameProcessor};
use super::pipeline_logger::PipelineLogger;
use super::pipeline_state::PipelineState;

pub const IMAGE_READ_ERROR: &str = "Error reading image file";

/// An annotated still image, JPEG-encoded at working resolution.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotatedImage {
    pub jpeg: Vec<u8>,
    pub counts: ObjectCounts,
}

/// Single-image pipeline: decode → process once → encode JPEG.
pub struct CountImageUseCase {
    codec: Arc<dyn ImageCodec>,
    recorder: Box<dyn CountRecorder>,
    processor: FrameProcessor,
    logger: Box<dyn PipelineLogger>,
    state: PipelineState,
}

impl CountImageUseCase {
    pub fn new(
        codec: Arc<dyn ImageCodec>,
        recorder: Box<dyn CountRecorder>,
        processor: FrameProcessor,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            codec,
            recorder,
            processor,
            logger,
            state: PipelineState::Opening,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn execute(&mut self, bytes: &[u8]) -> Result<AnnotatedImage, PipelineError> {
        if self.state != PipelineState::Opening {
            return Err(PipelineError::InputValidation(
                "Pipeline already executed".to_string(),
            ));
        }

        let result = self.run(bytes);
        if let Err(e) = &result {
            self.state.advance(PipelineState::Failed);
            self.logger.info(&format!("Failed: {e}"));
            if let Err(close_err) = self.recorder.close() {
                log::warn!("Failed to close recorder after error: {close_err}");
            }
        }
        self.logger.summary();
        result
    }

    fn run(&mut self, bytes: &[u8]) -> Result<AnnotatedImage, PipelineError> {
        if bytes.is_empty() {
            return Err(PipelineError::InputValidation(IMAGE_READ_ERROR.to_string()));
        }
        let frame = self.codec.decode(bytes).map_err(|e| {
            log::debug!("Image decode failed: {e}");
            PipelineError::InputValidation(IMAGE_READ_ERROR.to_string())
        })?;

        self.state.advance(PipelineState::Processing);
        let (annotated, counts) =
            self.processor
                .process(frame, self.recorder.as_mut(), self.logger.as_mut())?;
        self.logger.progress(1, 1);

        self.state.advance(PipelineState::Finalizing);
        let t0 = Instant::now();
        let jpeg = self
            .codec
            .encode_jpeg(&annotated)
            .map_err(PipelineError::encode)?;
        self.logger.timing("encode", elapsed_ms(t0));
        self.recorder.close().map_err(PipelineError::storage)?;
        self.state.advance(PipelineState::Done);

        Ok(AnnotatedImage { jpeg, counts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::crowd_status::CrowdClassifier;
    use crate::pipeline::frame_processor::test_stubs::*;
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::video::infrastructure::image_crate_codec::ImageCrateCodec;
    use std::collections::HashMap;
    use std::io::Cursor;

    fn encoded(w: u32, h: u32, format: image::ImageFormat) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(w, h, image::Rgb([90, 120, 200]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    fn use_case(detector: StubDetector, recorder: StubRecorder) -> CountImageUseCase {
        CountImageUseCase::new(
            Arc::new(ImageCrateCodec::default()),
            Box::new(recorder),
            FrameProcessor::new(
                Box::new(detector),
                Arc::new(StubAnnotator::new()),
                CrowdClassifier::default(),
            ),
            Box::new(NullPipelineLogger),
        )
    }

    #[test]
    fn test_jpeg_output_at_working_resolution() {
        let detector = StubDetector::new(HashMap::from([(0, detections(3, 2))]));
        let recorder = StubRecorder::new();
        let rows = recorder.rows.clone();
        let mut uc = use_case(detector, recorder);

        let out = uc
            .execute(&encoded(1024, 768, image::ImageFormat::Jpeg))
            .unwrap();

        let decoded = image::load_from_memory(&out.jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (640, 480));
        assert_eq!(out.counts, ObjectCounts::new(3, 2));
        assert_eq!(*rows.lock().unwrap(), vec![ObjectCounts::new(3, 2)]);
        assert_eq!(uc.state(), PipelineState::Done);
    }

    #[test]
    fn test_png_accepted() {
        let mut uc = use_case(StubDetector::new(HashMap::new()), StubRecorder::new());
        let out = uc.execute(&encoded(64, 64, image::ImageFormat::Png)).unwrap();
        assert_eq!(out.counts, ObjectCounts::default());
    }

    #[test]
    fn test_corrupt_image_is_input_validation() {
        let recorder = StubRecorder::new();
        let rows = recorder.rows.clone();
        let closed = recorder.closed.clone();
        let mut uc = use_case(StubDetector::new(HashMap::new()), recorder);

        let err = uc.execute(b"\xFF\xD8garbage").unwrap_err();

        assert_eq!(err, PipelineError::InputValidation(IMAGE_READ_ERROR.into()));
        assert!(rows.lock().unwrap().is_empty());
        assert_eq!(*closed.lock().unwrap(), 1);
        assert_eq!(uc.state(), PipelineState::Failed);
    }

    #[test]
    fn test_empty_upload_is_input_validation() {
        let mut uc = use_case(StubDetector::new(HashMap::new()), StubRecorder::new());
        let err = uc.execute(&[]).unwrap_err();
        assert_eq!(err.detail(), IMAGE_READ_ERROR);
    }

    #[test]
    fn test_inference_failure_is_server_error() {
        let mut detector = StubDetector::new(HashMap::new());
        detector.fail_at = Some(0);
        let mut uc = use_case(detector, StubRecorder::new());

        let err = uc
            .execute(&encoded(32, 32, image::ImageFormat::Png))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Inference(_)));
    }
}
