pub mod annotation;
pub mod detection;
pub mod pipeline;
pub mod recording;
pub mod shared;
pub mod video;
