use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;

use crate::shared::constants::JPEG_QUALITY;
use crate::shared::frame::Frame;
use crate::video::domain::image_codec::ImageCodec;

/// Still-image codec backed by the `image` crate.
pub struct ImageCrateCodec {
    quality: u8,
}

impl ImageCrateCodec {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }
}

impl Default for ImageCrateCodec {
    fn default() -> Self {
        Self::new(JPEG_QUALITY)
    }
}

impl ImageCodec for ImageCrateCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Frame, Box<dyn std::error::Error>> {
        let img = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()?
            .decode()?;
        Ok(Frame::from_rgb_image(img.to_rgb8(), 0))
    }

    fn encode_jpeg(&self, frame: &Frame) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        let img = image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
            .ok_or("frame buffer does not match its dimensions")?;
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, self.quality).encode_image(&img)?;
        Ok(out)
    }
}
