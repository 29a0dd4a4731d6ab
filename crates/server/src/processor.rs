use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crowdcount_core::annotation::domain::frame_annotator::FrameAnnotator;
use crowdcount_core::detection::infrastructure::detector_pool::{DetectorPool, PoolError};
use crowdcount_core::pipeline::count_image_use_case::{AnnotatedImage, CountImageUseCase};
use crowdcount_core::pipeline::count_video_use_case::{CountVideoUseCase, VideoCounts};
use crowdcount_core::pipeline::counting_config::CountingConfig;
use crowdcount_core::pipeline::error::PipelineError;
use crowdcount_core::pipeline::frame_processor::FrameProcessor;
use crowdcount_core::pipeline::pipeline_logger::LogPipelineLogger;
use crowdcount_core::recording::domain::count_recorder::{CountRecorder, RecorderFactory};
use crowdcount_core::video::domain::image_codec::ImageCodec;
use crowdcount_core::video::infrastructure::ffmpeg_reader::FfmpegReader;
use crowdcount_core::video::infrastructure::ffmpeg_writer::FfmpegWriter;

use crate::api_error::ApiError;

const PROGRESS_EVERY_FRAMES: usize = 100;

/// Runs one uploaded item through the counting pipeline.
///
/// Called from a blocking worker thread; implementations may block.
pub trait MediaProcessor: Send + Sync {
    /// Count `input` and write the annotated video to `output`.
    fn process_video(
        &self,
        input: &Path,
        output: &Path,
        label: &str,
    ) -> Result<VideoCounts, ApiError>;

    /// Count an encoded JPEG/PNG and return the annotated JPEG.
    fn process_image(&self, bytes: &[u8], label: &str) -> Result<AnnotatedImage, ApiError>;
}

/// Production processor: an exclusive pooled detector and a fresh
/// recorder per request, with shared read-only annotator and codec.
pub struct CountingProcessor {
    detectors: DetectorPool,
    annotator: Arc<dyn FrameAnnotator>,
    recorders: Box<dyn RecorderFactory>,
    codec: Arc<dyn ImageCodec>,
    config: CountingConfig,
    checkout_timeout: Duration,
}

impl CountingProcessor {
    pub fn new(
        detectors: DetectorPool,
        annotator: Arc<dyn FrameAnnotator>,
        recorders: Box<dyn RecorderFactory>,
        codec: Arc<dyn ImageCodec>,
        config: CountingConfig,
        checkout_timeout: Duration,
    ) -> Self {
        Self {
            detectors,
            annotator,
            recorders,
            codec,
            config,
            checkout_timeout,
        }
    }

    fn frame_processor(&self) -> Result<FrameProcessor, ApiError> {
        let detector = self
            .detectors
            .checkout(self.checkout_timeout)
            .map_err(|e| match e {
                PoolError::Exhausted(waited) => ApiError::Timeout(waited),
                PoolError::Empty => ApiError::Internal(e.to_string()),
            })?;
        Ok(FrameProcessor::new(
            Box::new(detector),
            self.annotator.clone(),
            self.config.classifier(),
        ))
    }

    fn recorder(&self) -> Result<Box<dyn CountRecorder>, ApiError> {
        self.recorders
            .open()
            .map_err(|e| PipelineError::StorageWrite(e.to_string()).into())
    }
}

impl MediaProcessor for CountingProcessor {
    fn process_video(
        &self,
        input: &Path,
        output: &Path,
        label: &str,
    ) -> Result<VideoCounts, ApiError> {
        let processor = self.frame_processor()?;
        let mut use_case = CountVideoUseCase::new(
            Box::new(FfmpegReader::new()),
            Box::new(FfmpegWriter::new()),
            self.recorder()?,
            processor,
            Box::new(LogPipelineLogger::new(label, PROGRESS_EVERY_FRAMES)),
        );
        Ok(use_case.execute(input, output)?)
    }

    fn process_image(&self, bytes: &[u8], label: &str) -> Result<AnnotatedImage, ApiError> {
        let processor = self.frame_processor()?;
        let mut use_case = CountImageUseCase::new(
            self.codec.clone(),
            self.recorder()?,
            processor,
            Box::new(LogPipelineLogger::new(label, PROGRESS_EVERY_FRAMES)),
        );
        Ok(use_case.execute(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crowdcount_core::detection::domain::crowd_status::CrowdStatus;
    use crowdcount_core::detection::domain::detection::{Detection, DetectionSet};
    use crowdcount_core::detection::domain::object_counts::ObjectCounts;
    use crowdcount_core::detection::domain::object_detector::ObjectDetector;
    use crowdcount_core::recording::infrastructure::sqlite_recorder::{
        SqliteRecorder, SqliteRecorderFactory,
    };
    use crowdcount_core::shared::bounding_box::BoundingBox;
    use crowdcount_core::shared::frame::Frame;
    use crowdcount_core::video::infrastructure::image_crate_codec::ImageCrateCodec;
    use std::io::Cursor;
    use tempfile::TempDir;

    struct FixedDetector {
        people: usize,
    }

    impl ObjectDetector for FixedDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<DetectionSet, Box<dyn std::error::Error>> {
            Ok((0..self.people)
                .map(|i| {
                    let x = i as f64 * 10.0;
                    Detection::new("Person", 0.9, BoundingBox::new(x, 0.0, x + 8.0, 20.0))
                })
                .collect())
        }
    }

    struct PassThroughAnnotator;

    impl FrameAnnotator for PassThroughAnnotator {
        fn annotate(
            &self,
            frame: Frame,
            _detections: &DetectionSet,
            _counts: ObjectCounts,
            _status: CrowdStatus,
        ) -> Result<Frame, Box<dyn std::error::Error>> {
            Ok(frame)
        }
    }

    struct BrokenRecorderFactory;

    impl RecorderFactory for BrokenRecorderFactory {
        fn open(&self) -> Result<Box<dyn CountRecorder>, Box<dyn std::error::Error>> {
            Err("database is locked".into())
        }
    }

    fn processor(
        pool_size: usize,
        recorders: Box<dyn RecorderFactory>,
        checkout_timeout: Duration,
    ) -> CountingProcessor {
        let detectors = DetectorPool::build(pool_size, || {
            Ok(Box::new(FixedDetector { people: 17 }) as Box<dyn ObjectDetector>)
        })
        .unwrap();
        CountingProcessor::new(
            detectors,
            Arc::new(PassThroughAnnotator),
            recorders,
            Arc::new(ImageCrateCodec::default()),
            CountingConfig::default(),
            checkout_timeout,
        )
    }

    fn png(w: u32, h: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(w, h, image::Rgb([10, 20, 30]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_image_counts_recorded_in_database() {
        let tmp = TempDir::new().unwrap();
        let db = tmp.path().join("detections.db");
        let config = CountingConfig::default();
        let factory = SqliteRecorderFactory::new(db.clone(), config.utc_offset).unwrap();
        let processor = processor(1, Box::new(factory), Duration::from_secs(1));

        let out = processor.process_image(&png(100, 80), "test").unwrap();

        assert_eq!(out.counts, ObjectCounts::new(17, 0));
        let records = SqliteRecorder::open(&db, config.utc_offset)
            .unwrap()
            .records()
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].person_count, 17);
        assert_eq!(records[0].head_count, 0);
    }

    #[test]
    fn test_detector_returned_after_request() {
        let tmp = TempDir::new().unwrap();
        let factory =
            SqliteRecorderFactory::new(tmp.path().join("d.db"), CountingConfig::default().utc_offset)
                .unwrap();
        let processor = processor(1, Box::new(factory), Duration::from_millis(50));

        processor.process_image(&png(16, 16), "first").unwrap();
        processor.process_image(&png(16, 16), "second").unwrap();
        assert_eq!(processor.detectors.available(), 1);
    }

    #[test]
    fn test_detector_returned_after_failure() {
        let tmp = TempDir::new().unwrap();
        let factory =
            SqliteRecorderFactory::new(tmp.path().join("d.db"), CountingConfig::default().utc_offset)
                .unwrap();
        let processor = processor(1, Box::new(factory), Duration::from_millis(50));

        let err = processor.process_image(b"not an image", "bad").unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(processor.detectors.available(), 1);
    }

    #[test]
    fn test_exhausted_pool_is_timeout() {
        let processor = processor(1, Box::new(BrokenRecorderFactory), Duration::from_millis(10));
        let _held = processor.detectors.checkout(Duration::from_millis(10)).unwrap();

        let err = processor.process_image(&png(16, 16), "waiting").unwrap_err();
        assert!(matches!(err, ApiError::Timeout(_)));
    }

    #[test]
    fn test_recorder_open_failure_is_storage_error() {
        let processor = processor(1, Box::new(BrokenRecorderFactory), Duration::from_millis(10));

        let err = processor.process_image(&png(16, 16), "locked").unwrap_err();
        assert!(matches!(
            err,
            ApiError::Pipeline(PipelineError::StorageWrite(_))
        ));
        assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }
}
