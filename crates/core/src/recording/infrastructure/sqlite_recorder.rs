use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{FixedOffset, Utc};
use rusqlite::{params, Connection};

use crate::detection::domain::object_counts::ObjectCounts;
use crate::recording::domain::count_record::CountRecord;
use crate::recording::domain::count_recorder::{CountRecorder, RecorderFactory};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// How long a writer waits on a lock held by a concurrent request.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Appends count rows to the `person` table of a SQLite database.
pub struct SqliteRecorder {
    conn: Option<Connection>,
    offset: FixedOffset,
}

impl SqliteRecorder {
    pub fn open(db_path: &Path, offset: FixedOffset) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        ensure_schema(&conn)?;
        Ok(Self {
            conn: Some(conn),
            offset,
        })
    }

    /// All rows in insertion order.
    pub fn records(&self) -> Result<Vec<CountRecord>, Box<dyn std::error::Error>> {
        let conn = self.conn.as_ref().ok_or("recorder is closed")?;
        Ok(read_records(conn)?)
    }
}

impl CountRecorder for SqliteRecorder {
    fn record(&mut self, counts: ObjectCounts) -> Result<(), Box<dyn std::error::Error>> {
        let conn = self.conn.as_ref().ok_or("recorder is closed")?;
        let created_at = Utc::now()
            .with_timezone(&self.offset)
            .format(TIMESTAMP_FORMAT)
            .to_string();
        // Autocommit: each insert is its own transaction
        conn.execute(
            "INSERT INTO person (person_count, head_count, created_at) VALUES (?1, ?2, ?3)",
            params![counts.person as i64, counts.head as i64, created_at],
        )?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| e)?;
        }
        Ok(())
    }
}

impl Drop for SqliteRecorder {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Failed to close recorder database: {e}");
        }
    }
}

/// Opens one [`SqliteRecorder`] per processed item against a shared file.
pub struct SqliteRecorderFactory {
    db_path: PathBuf,
    offset: FixedOffset,
}

impl SqliteRecorderFactory {
    /// Creates the schema up front so configuration errors surface at startup.
    pub fn new(db_path: PathBuf, offset: FixedOffset) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(&db_path)?;
        ensure_schema(&conn)?;
        conn.close().map_err(|(_, e)| e)?;
        Ok(Self { db_path, offset })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

impl RecorderFactory for SqliteRecorderFactory {
    fn open(&self) -> Result<Box<dyn CountRecorder>, Box<dyn std::error::Error>> {
        Ok(Box::new(SqliteRecorder::open(&self.db_path, self.offset)?))
    }
}

fn ensure_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;

        CREATE TABLE IF NOT EXISTS person (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
          person_count INTEGER NOT NULL,
          head_count INTEGER NOT NULL,
          created_at DATETIME
        );
        "#,
    )
}

/// Reads every row of the `person` table ordered by id.
pub fn read_records(conn: &Connection) -> Result<Vec<CountRecord>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT id, timestamp, person_count, head_count, created_at FROM person ORDER BY id ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(CountRecord {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            person_count: row.get::<_, i64>(2)? as usize,
            head_count: row.get::<_, i64>(3)? as usize,
            created_at: row.get(4)?,
        })
    })?;
    let records = rows.collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use tempfile::TempDir;

    fn jakarta() -> FixedOffset {
        FixedOffset::east_opt(7 * 3600).unwrap()
    }

    fn recorder(tmp: &TempDir) -> SqliteRecorder {
        SqliteRecorder::open(&tmp.path().join("counts.db"), jakarta()).unwrap()
    }

    #[test]
    fn test_records_appended_in_order() {
        let tmp = TempDir::new().unwrap();
        let mut rec = recorder(&tmp);
        for (p, h) in [(1, 0), (5, 3), (0, 0)] {
            rec.record(ObjectCounts::new(p, h)).unwrap();
        }

        let rows = rec.records().unwrap();
        assert_eq!(
            rows.iter()
                .map(|r| (r.person_count, r.head_count))
                .collect::<Vec<_>>(),
            vec![(1, 0), (5, 3), (0, 0)]
        );
        assert!(rows.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn test_created_at_uses_configured_offset() {
        let tmp = TempDir::new().unwrap();
        let mut rec = recorder(&tmp);
        rec.record(ObjectCounts::new(2, 1)).unwrap();

        let row = &rec.records().unwrap()[0];
        let utc = NaiveDateTime::parse_from_str(&row.timestamp, TIMESTAMP_FORMAT).unwrap();
        let local = NaiveDateTime::parse_from_str(&row.created_at, TIMESTAMP_FORMAT).unwrap();
        let diff = (local - utc).num_seconds();
        assert!((7 * 3600 - 2..=7 * 3600 + 2).contains(&diff), "diff was {diff}s");
    }

    #[test]
    fn test_reopen_appends_without_touching_existing_rows() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("counts.db");
        {
            let mut rec = SqliteRecorder::open(&path, jakarta()).unwrap();
            rec.record(ObjectCounts::new(1, 1)).unwrap();
            rec.close().unwrap();
        }
        let mut rec = SqliteRecorder::open(&path, jakarta()).unwrap();
        rec.record(ObjectCounts::new(2, 2)).unwrap();

        let rows = rec.records().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!((rows[0].person_count, rows[1].person_count), (1, 2));
    }

    #[test]
    fn test_record_after_close_fails() {
        let tmp = TempDir::new().unwrap();
        let mut rec = recorder(&tmp);
        rec.close().unwrap();
        assert!(rec.record(ObjectCounts::new(1, 0)).is_err());
        // Closing twice is a no-op
        assert!(rec.close().is_ok());
    }

    #[test]
    fn test_open_on_directory_fails() {
        let tmp = TempDir::new().unwrap();
        assert!(SqliteRecorder::open(tmp.path(), jakarta()).is_err());
    }

    #[test]
    fn test_factory_opens_independent_recorders() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("counts.db");
        let factory = SqliteRecorderFactory::new(path.clone(), jakarta()).unwrap();

        let mut a = factory.open().unwrap();
        let mut b = factory.open().unwrap();
        a.record(ObjectCounts::new(1, 0)).unwrap();
        b.record(ObjectCounts::new(2, 0)).unwrap();
        a.close().unwrap();
        b.close().unwrap();

        let conn = Connection::open(&path).unwrap();
        assert_eq!(read_records(&conn).unwrap().len(), 2);
    }
}
