use std::path::Path;

use crate::shared::frame::{Frame, CHANNELS};
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

/// Decodes video frames via ffmpeg-next (libavformat + libavcodec).
///
/// Converts each decoded frame to RGB24 and wraps it in a [`Frame`].
pub struct FfmpegReader {
    state: Option<DecodeState>,
}

struct DecodeState {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
}

// Safety: FfmpegReader is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegReader {}

impl FfmpegReader {
    pub fn new() -> Self {
        Self { state: None }
    }
}

impl Default for FfmpegReader {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoReader for FfmpegReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        self.close();

        let ictx = ffmpeg_next::format::input(path)?;
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;

        let stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        let width = decoder.width();
        let height = decoder.height();
        if width == 0 || height == 0 {
            return Err(format!("video stream reports a {width}x{height} frame size").into());
        }

        let metadata = VideoMetadata {
            width,
            height,
            fps,
            total_frames: stream.frames().max(0) as usize,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source_path: Some(path.to_path_buf()),
        };

        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        self.state = Some(DecodeState {
            ictx,
            decoder,
            scaler,
            stream_index,
            width,
            height,
        });

        Ok(metadata)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        let Some(state) = self.state.as_mut() else {
            return Box::new(std::iter::once(Err("FfmpegReader: not opened".into())));
        };

        Box::new(FfmpegFrameIter {
            state,
            frame_index: 0,
            flushing: false,
            done: false,
        })
    }

    fn close(&mut self) {
        self.state = None;
    }
}

/// Lazy iterator that decodes one frame at a time.
struct FfmpegFrameIter<'a> {
    state: &'a mut DecodeState,
    frame_index: usize,
    flushing: bool,
    done: bool,
}

impl FfmpegFrameIter<'_> {
    fn try_receive(&mut self) -> Option<Result<Frame, Box<dyn std::error::Error>>> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        self.state.decoder.receive_frame(&mut decoded).ok()?;

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        if let Err(e) = self.state.scaler.run(&decoded, &mut rgb_frame) {
            return Some(Err(Box::new(e)));
        }

        let pixels = extract_rgb_pixels(&rgb_frame, self.state.width, self.state.height);
        let frame = Frame::new(pixels, self.state.width, self.state.height, self.frame_index);
        self.frame_index += 1;
        Some(Ok(frame))
    }
}

impl Iterator for FfmpegFrameIter<'_> {
    type Item = Result<Frame, Box<dyn std::error::Error>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if let Some(result) = self.try_receive() {
            return Some(result);
        }

        if self.flushing {
            self.done = true;
            return None;
        }

        loop {
            let Some((stream, packet)) = self.state.ictx.packets().next() else {
                let _ = self.state.decoder.send_eof();
                self.flushing = true;
                if let Some(result) = self.try_receive() {
                    return Some(result);
                }
                self.done = true;
                return None;
            };

            if stream.index() != self.state.stream_index {
                continue;
            }

            // Corrupt packets are skipped; the decoder resyncs on the next keyframe
            if let Err(e) = self.state.decoder.send_packet(&packet) {
                log::debug!("Skipping undecodable packet: {e}");
                continue;
            }

            if let Some(result) = self.try_receive() {
                return Some(result);
            }
        }
    }
}

/// Copies pixel data from an ffmpeg frame into a tightly packed RGB buffer,
/// dropping per-row stride padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_bytes = width as usize * CHANNELS;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + row_bytes]);
    }
    pixels
}
