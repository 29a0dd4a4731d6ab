pub mod ffmpeg_reader;
pub mod ffmpeg_writer;
pub mod image_crate_codec;

#[cfg(test)]
pub(crate) mod test_support;
