use crate::shared::frame::Frame;

/// Converts between encoded still images and frames.
pub trait ImageCodec: Send + Sync {
    /// Decodes JPEG/PNG (or any supported format) bytes into an RGB frame.
    fn decode(&self, bytes: &[u8]) -> Result<Frame, Box<dyn std::error::Error>>;

    /// Encodes a frame as JPEG.
    fn encode_jpeg(&self, frame: &Frame) -> Result<Vec<u8>, Box<dyn std::error::Error>>;
}
