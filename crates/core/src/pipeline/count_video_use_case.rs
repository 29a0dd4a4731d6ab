use std::path::Path;
use std::time::Instant;

use crate::detection::domain::object_counts::ObjectCounts;
use crate::recording::domain::count_recorder::CountRecorder;
use crate::shared::constants::{WORKING_HEIGHT, WORKING_WIDTH};
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

use super::error::PipelineError;
use super::frame_processor::{elapsed_ms, FrameProcessor};
use super::pipeline_logger::PipelineLogger;
use super::pipeline_state::PipelineState;

/// Outcome of a successfully processed video.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VideoCounts {
    pub frames: usize,
    /// Counts of the frame with the most people.
    pub peak: ObjectCounts,
    pub fps: f64,
}

/// Counts, records and annotates every frame of one video.
///
/// Single-use: the components belong to one item and are closed when
/// `execute` returns, whatever the outcome.
pub struct CountVideoUseCase {
    reader: Box<dyn VideoReader>,
    writer: Box<dyn VideoWriter>,
    recorder: Box<dyn CountRecorder>,
    processor: FrameProcessor,
    logger: Box<dyn PipelineLogger>,
    state: PipelineState,
}

impl CountVideoUseCase {
    pub fn new(
        reader: Box<dyn VideoReader>,
        writer: Box<dyn VideoWriter>,
        recorder: Box<dyn CountRecorder>,
        processor: FrameProcessor,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            reader,
            writer,
            recorder,
            processor,
            logger,
            state: PipelineState::Opening,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Reads `input`, writes the annotated video to `output`.
    pub fn execute(&mut self, input: &Path, output: &Path) -> Result<VideoCounts, PipelineError> {
        if self.state != PipelineState::Opening {
            return Err(PipelineError::InputValidation(
                "Pipeline already executed".to_string(),
            ));
        }

        let result = self.run(input, output);
        if let Err(e) = &result {
            self.state.advance(PipelineState::Failed);
            self.logger.info(&format!("Failed: {e}"));
            self.release_after_failure();
        }
        self.logger.summary();
        result
    }

    fn run(&mut self, input: &Path, output: &Path) -> Result<VideoCounts, PipelineError> {
        let metadata = self.reader.open(input).map_err(PipelineError::media_open)?;
        let out_metadata = metadata.with_frame_size(WORKING_WIDTH, WORKING_HEIGHT);
        self.writer
            .open(output, &out_metadata)
            .map_err(PipelineError::encode)?;
        self.logger.info(&format!(
            "{}x{} {} at {:.2} fps, {} frames",
            metadata.width,
            metadata.height,
            metadata.codec,
            metadata.fps,
            metadata.total_frames
        ));

        self.state.advance(PipelineState::Processing);
        let total = metadata.total_frames;
        let mut frames = 0;
        let mut peak = ObjectCounts::default();

        for item in self.reader.frames() {
            let frame = item.map_err(PipelineError::media_open)?;
            let (annotated, counts) = self.processor.process(
                frame,
                self.recorder.as_mut(),
                self.logger.as_mut(),
            )?;

            let t0 = Instant::now();
            self.writer
                .write(&annotated)
                .map_err(PipelineError::encode)?;
            self.logger.timing("encode", elapsed_ms(t0));

            if frames == 0 || counts.person > peak.person {
                peak = counts;
            }
            frames += 1;
            self.logger.progress(frames, total);
        }

        if frames == 0 {
            return Err(PipelineError::InputValidation(
                "Video contains no decodable frames".to_string(),
            ));
        }

        self.state.advance(PipelineState::Finalizing);
        self.writer.close().map_err(PipelineError::encode)?;
        self.reader.close();
        self.recorder.close().map_err(PipelineError::storage)?;
        self.state.advance(PipelineState::Done);

        Ok(VideoCounts {
            frames,
            peak,
            fps: out_metadata.output_fps(),
        })
    }

    fn release_after_failure(&mut self) {
        self.reader.close();
        if let Err(e) = self.writer.close() {
            log::warn!("Failed to close writer after error: {e}");
        }
        if let Err(e) = self.recorder.close() {
            log::warn!("Failed to close recorder after error: {e}");
        }
    }
}
