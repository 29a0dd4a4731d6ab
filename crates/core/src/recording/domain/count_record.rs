/// One persisted per-frame measurement.
///
/// `timestamp` is UTC as stored by the database; `created_at` is local time
/// in the configured offset. Both are `YYYY-MM-DD HH:MM:SS` strings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CountRecord {
    pub id: i64,
    pub timestamp: String,
    pub person_count: usize,
    pub head_count: usize,
    pub created_at: String,
}
