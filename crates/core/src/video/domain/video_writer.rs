use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Abstracts video encoding so the pipeline can write output without
/// depending on a specific codec library.
pub trait VideoWriter: Send {
    /// Starts a new output at `path` sized and timed per `metadata`.
    fn open(
        &mut self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>>;

    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>>;

    /// Flushes buffered frames and finalizes the container. Safe to call
    /// repeatedly; only the first call after `open` does any work.
    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>>;
}
