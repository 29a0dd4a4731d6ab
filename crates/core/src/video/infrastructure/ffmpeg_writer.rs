use std::path::Path;

use crate::shared::frame::{Frame, CHANNELS};
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_writer::VideoWriter;

/// Encoder tried first: browsers play H.264 in MP4 natively.
const PREFERRED_ENCODER: &str = "libx264";

/// Encodes RGB frames to a video file via ffmpeg-next.
///
/// Prefers H.264 (`libx264`) and falls back to MPEG-4 Part 2 when that
/// encoder is missing or refuses to open.
pub struct FfmpegWriter {
    state: Option<EncodeState>,
}

struct EncodeState {
    octx: ffmpeg_next::format::context::Output,
    encoder: ffmpeg_next::codec::encoder::video::Encoder,
    scaler: ffmpeg_next::software::scaling::Context,
    encoder_time_base: ffmpeg_next::Rational,
    stream_time_base: ffmpeg_next::Rational,
    width: u32,
    height: u32,
    frame_count: usize,
}

// Safety: FfmpegWriter is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegWriter {}

impl FfmpegWriter {
    pub fn new() -> Self {
        Self { state: None }
    }

    /// Name of the encoder in use, if open.
    pub fn encoder_name(&self) -> Option<String> {
        self.state
            .as_ref()
            .and_then(|s| s.encoder.codec().map(|c| c.name().to_string()))
    }
}

impl Default for FfmpegWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoWriter for FfmpegWriter {
    fn open(
        &mut self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        if metadata.width == 0 || metadata.height == 0 {
            return Err(format!(
                "cannot encode {}x{} video",
                metadata.width, metadata.height
            )
            .into());
        }

        let mut octx = ffmpeg_next::format::output(path)?;
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let fps = (metadata.output_fps().round() as i32).max(1);
        let encoder_time_base = ffmpeg_next::Rational(1, fps);

        let (codec, encoder) = open_encoder(metadata, fps, global_header)?;
        log::debug!(
            "Encoding {} with {} at {fps} fps",
            path.display(),
            codec.name()
        );

        let mut ost = octx.add_stream(Some(codec))?;
        ost.set_parameters(&encoder);
        ost.set_time_base(encoder_time_base);

        let mut options = ffmpeg_next::Dictionary::new();
        options.set("movflags", "+faststart");
        octx.write_header_with(options)?;

        let stream_time_base = octx
            .stream(0)
            .ok_or("output stream missing after header")?
            .time_base();

        let scaler = ffmpeg_next::software::scaling::Context::get(
            ffmpeg_next::format::Pixel::RGB24,
            metadata.width,
            metadata.height,
            ffmpeg_next::format::Pixel::YUV420P,
            metadata.width,
            metadata.height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        self.state = Some(EncodeState {
            octx,
            encoder,
            scaler,
            encoder_time_base,
            stream_time_base,
            width: metadata.width,
            height: metadata.height,
            frame_count: 0,
        });
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let state = self.state.as_mut().ok_or("FfmpegWriter: not opened")?;
        if frame.width() != state.width || frame.height() != state.height {
            return Err(format!(
                "frame is {}x{}, writer expects {}x{}",
                frame.width(),
                frame.height(),
                state.width,
                state.height
            )
            .into());
        }

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::new(
            ffmpeg_next::format::Pixel::RGB24,
            state.width,
            state.height,
        );
        let stride = rgb_frame.stride(0);
        let row_bytes = state.width as usize * CHANNELS;
        let dst = rgb_frame.data_mut(0);
        for (row, src) in frame.data().chunks_exact(row_bytes).enumerate() {
            let start = row * stride;
            dst[start..start + row_bytes].copy_from_slice(src);
        }

        let mut yuv_frame = ffmpeg_next::util::frame::video::Video::empty();
        state.scaler.run(&rgb_frame, &mut yuv_frame)?;
        yuv_frame.set_pts(Some(state.frame_count as i64));

        state.encoder.send_frame(&yuv_frame)?;
        state.drain_packets()?;

        state.frame_count += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let Some(mut state) = self.state.take() else {
            return Ok(());
        };
        state.encoder.send_eof()?;
        state.drain_packets()?;
        state.octx.write_trailer()?;
        log::debug!("Finalized video with {} frames", state.frame_count);
        Ok(())
    }
}

impl EncodeState {
    fn drain_packets(&mut self) -> Result<(), ffmpeg_next::Error> {
        let mut encoded = ffmpeg_next::Packet::empty();
        while self.encoder.receive_packet(&mut encoded).is_ok() {
            encoded.set_stream(0);
            encoded.rescale_ts(self.encoder_time_base, self.stream_time_base);
            encoded.write_interleaved(&mut self.octx)?;
        }
        Ok(())
    }
}

/// Opens the preferred encoder, falling back to MPEG-4.
fn open_encoder(
    metadata: &VideoMetadata,
    fps: i32,
    global_header: bool,
) -> Result<
    (
        ffmpeg_next::Codec,
        ffmpeg_next::codec::encoder::video::Encoder,
    ),
    Box<dyn std::error::Error>,
> {
    if let Some(codec) = ffmpeg_next::encoder::find_by_name(PREFERRED_ENCODER) {
        let mut options = ffmpeg_next::Dictionary::new();
        options.set("preset", "veryfast");
        match configure(codec, metadata, fps, global_header)?.open_with(options) {
            Ok(encoder) => return Ok((codec, encoder)),
            Err(e) => log::warn!("{PREFERRED_ENCODER} unavailable ({e}), falling back to MPEG-4"),
        }
    }

    let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4)
        .ok_or("no H.264 or MPEG-4 encoder available")?;
    let encoder = configure(codec, metadata, fps, global_header)?
        .open_with(ffmpeg_next::Dictionary::new())?;
    Ok((codec, encoder))
}

fn configure(
    codec: ffmpeg_next::Codec,
    metadata: &VideoMetadata,
    fps: i32,
    global_header: bool,
) -> Result<ffmpeg_next::codec::encoder::video::Video, ffmpeg_next::Error> {
    let mut ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
        .encoder()
        .video()?;
    ctx.set_width(metadata.width);
    ctx.set_height(metadata.height);
    ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);
    ctx.set_time_base(ffmpeg_next::Rational(1, fps));
    ctx.set_frame_rate(Some(ffmpeg_next::Rational(fps, 1)));
    if global_header {
        ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
    }
    Ok(ctx)
}
