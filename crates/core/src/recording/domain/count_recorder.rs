use crate::detection::domain::object_counts::ObjectCounts;

/// Domain interface for persisting per-frame counts.
///
/// Each `record` call is durable on return. `close` releases the
/// underlying storage handle and must be safe to call more than once.
pub trait CountRecorder: Send {
    fn record(&mut self, counts: ObjectCounts) -> Result<(), Box<dyn std::error::Error>>;

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>>;
}

/// Opens a fresh recorder per processed item so concurrent requests never
/// share a storage handle.
pub trait RecorderFactory: Send + Sync {
    fn open(&self) -> Result<Box<dyn CountRecorder>, Box<dyn std::error::Error>>;
}
