pub mod sqlite_recorder;
