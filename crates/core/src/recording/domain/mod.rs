pub mod count_record;
pub mod count_recorder;
