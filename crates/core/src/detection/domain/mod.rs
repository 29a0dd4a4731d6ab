pub mod crowd_status;
pub mod detection;
pub mod object_counts;
pub mod object_detector;
