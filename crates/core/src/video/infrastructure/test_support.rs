use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_writer::VideoWriter;
use crate::video::infrastructure::ffmpeg_writer::FfmpegWriter;

pub fn metadata(w: u32, h: u32, fps: f64) -> VideoMetadata {
    VideoMetadata {
        width: w,
        height: h,
        fps,
        total_frames: 0,
        codec: String::new(),
        source_path: None,
    }
}

pub fn solid_frame(index: usize, w: u32, h: u32, value: u8) -> Frame {
    Frame::new(vec![value; (w * h * 3) as usize], w, h, index)
}

/// Writes `num_frames` gray frames of increasing brightness to `path`.
pub fn write_test_video(path: &Path, num_frames: usize, w: u32, h: u32, fps: f64) {
    let mut writer = FfmpegWriter::new();
    writer.open(path, &metadata(w, h, fps)).unwrap();
    for i in 0..num_frames {
        let value = ((i * 40) % 256) as u8;
        writer.write(&solid_frame(i, w, h, value)).unwrap();
    }
    writer.close().unwrap();
}
