use ndarray::ArrayView3;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum FrameError {
    #[error("frame {index} holds {actual} bytes, expected {expected} for its size")]
    BufferSize {
        index: usize,
        expected: usize,
        actual: usize,
    },
}

/// A single video/image frame: contiguous RGB bytes in row-major order.
///
/// Format conversion happens at I/O boundaries only; detection and
/// annotation work on this type.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    index: usize,
}

/// Bytes per pixel. Frames are always packed RGB24.
pub const CHANNELS: usize = 3;

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * CHANNELS,
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
            index,
        }
    }

    /// Wraps an `image` buffer without copying.
    pub fn from_rgb_image(img: image::RgbImage, index: usize) -> Self {
        let (width, height) = img.dimensions();
        Self::new(img.into_raw(), width, height, index)
    }

    /// Converts back into an `image` buffer without copying.
    pub fn into_rgb_image(self) -> Option<image::RgbImage> {
        image::RgbImage::from_raw(self.width, self.height, self.data)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// True when either dimension is zero; such frames cannot be annotated.
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Stretches the frame to exactly `width` x `height`.
    ///
    /// Aspect ratio is not preserved. Returns the frame unchanged when it
    /// already has the requested size. Fails when the pixel buffer does not
    /// match the frame's own dimensions.
    pub fn resized(self, width: u32, height: u32) -> Result<Frame, FrameError> {
        let expected = (self.width as usize) * (self.height as usize) * CHANNELS;
        if self.data.len() != expected {
            return Err(FrameError::BufferSize {
                index: self.index,
                expected,
                actual: self.data.len(),
            });
        }
        if self.width == width && self.height == height {
            return Ok(self);
        }
        let index = self.index;
        let actual = self.data.len();
        let img = self.into_rgb_image().ok_or(FrameError::BufferSize {
            index,
            expected,
            actual,
        })?;
        let out = image::imageops::resize(
            &img,
            width,
            height,
            image::imageops::FilterType::Triangle,
        );
        Ok(Frame::from_rgb_image(out, index))
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(
            (self.height as usize, self.width as usize, CHANNELS),
            &self.data,
        )
        .expect("Frame data length must match dimensions")
    }
}

#[cfg(test)]
impl Frame {
    /// Builds a frame whose buffer need not match its dimensions.
    pub(crate) fn with_raw_parts(data: Vec<u8>, width: u32, height: u32, index: usize) -> Self {
        Self {
            data,
            width,
            height,
            index,
        }
    }
}
