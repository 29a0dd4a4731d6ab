pub mod count_image_use_case;
pub mod count_video_use_case;
pub mod counting_config;
pub mod error;
pub mod frame_processor;
pub mod pipeline_logger;
pub mod pipeline_state;
