//! SQLite-backed feedback repository
//!
//! Reads the `predictions` table written by the scoring service. Rows enter
//! the training set once a reviewer sets `feedback_provided` and fills in
//! `actual_fraud`.

use rusqlite::{Connection, OpenFlags, Row};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::{class_counts, FeedbackSource};
use crate::error::{Result, RetrainError};
use crate::types::FeedbackRecord;

/// Fixed extraction query: labeled feedback only, newest first
pub const FEEDBACK_QUERY: &str = r#"
    SELECT amt, hour, month, dayofweek, day, category, actual_fraud
    FROM predictions
    WHERE feedback_provided = 1
      AND actual_fraud IS NOT NULL
    ORDER BY created_at DESC
"#;

/// Feedback repository over a SQLite database file
pub struct SqliteFeedbackRepository {
    path: PathBuf,
}

impl SqliteFeedbackRepository {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn open(&self) -> Result<Connection> {
        if !self.path.exists() {
            return Err(RetrainError::DataUnavailable(format!(
                "feedback store not found at {}",
                self.path.display()
            )));
        }

        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(conn)
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<Option<FeedbackRecord>> {
        let amount: f64 = row.get(0)?;
        // Calendar fields may be stored as INTEGER or REAL
        let hour: f64 = row.get(1)?;
        let month: f64 = row.get(2)?;
        let day_of_week: f64 = row.get(3)?;
        let day: f64 = row.get(4)?;
        let category: String = row.get(5)?;
        let label: f64 = row.get(6)?;

        let narrow = |v: f64| {
            (v.fract() == 0.0 && (0.0..=f64::from(u8::MAX)).contains(&v)).then(|| v as u8)
        };
        let (Some(hour), Some(month), Some(day_of_week), Some(day)) =
            (narrow(hour), narrow(month), narrow(day_of_week), narrow(day))
        else {
            return Ok(None);
        };

        let record = FeedbackRecord {
            amount,
            hour,
            month,
            day_of_week,
            day,
            category,
            label: label != 0.0,
        };

        Ok(record.is_valid().then_some(record))
    }
}

impl FeedbackSource for SqliteFeedbackRepository {
    fn fetch(&self) -> Result<Vec<FeedbackRecord>> {
        info!(store = %self.path.display(), "Loading feedback data");

        let conn = self.open()?;
        let mut stmt = conn.prepare(FEEDBACK_QUERY)?;
        let rows = stmt.query_map([], Self::row_to_record)?;

        let mut records = Vec::new();
        let mut skipped = 0usize;
        for row in rows {
            match row? {
                Some(record) => records.push(record),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            warn!(skipped, "Skipped feedback rows with out-of-range fields");
        }

        if records.is_empty() {
            return Err(RetrainError::DataUnavailable(
                "no labeled feedback rows in store".to_string(),
            ));
        }

        let (fraud, legitimate) = class_counts(&records);
        info!(total = records.len(), fraud, legitimate, "Loaded transactions with feedback");

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;

    fn create_store(path: &Path) -> Connection {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE predictions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                amt REAL NOT NULL,
                hour INTEGER NOT NULL,
                month INTEGER NOT NULL,
                dayofweek INTEGER NOT NULL,
                day INTEGER NOT NULL,
                category TEXT NOT NULL,
                fraud_probability REAL,
                feedback_provided INTEGER DEFAULT 0,
                actual_fraud INTEGER,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .unwrap();
        conn
    }

    fn insert(conn: &Connection, amt: f64, category: &str, feedback: i64, label: Option<i64>, created_at: &str) {
        conn.execute(
            "INSERT INTO predictions (amt, hour, month, dayofweek, day, category, feedback_provided, actual_fraud, created_at)
             VALUES (?1, 10, 3, 2, 15, ?2, ?3, ?4, ?5)",
            params![amt, category, feedback, label, created_at],
        )
        .unwrap();
    }

    #[test]
    fn test_fetch_filters_and_orders_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feedback.db");
        let conn = create_store(&path);

        insert(&conn, 10.0, "grocery_pos", 1, Some(0), "2026-01-01T00:00:00Z");
        insert(&conn, 20.0, "shopping_net", 1, Some(1), "2026-01-03T00:00:00Z");
        insert(&conn, 30.0, "gas_transport", 0, Some(1), "2026-01-04T00:00:00Z");
        insert(&conn, 40.0, "travel", 1, None, "2026-01-05T00:00:00Z");
        insert(&conn, 50.0, "misc_net", 1, Some(0), "2026-01-02T00:00:00Z");
        drop(conn);

        let repo = SqliteFeedbackRepository::new(&path);
        let records = repo.fetch().unwrap();

        let amounts: Vec<f64> = records.iter().map(|r| r.amount).collect();
        assert_eq!(amounts, vec![20.0, 50.0, 10.0]);
        assert!(records[0].label);
        assert!(!records[1].label);
        assert_eq!(records[0].category, "shopping_net");
        assert_eq!(records[0].day_of_week, 2);
    }

    #[test]
    fn test_empty_store_is_data_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feedback.db");
        let conn = create_store(&path);
        insert(&conn, 10.0, "grocery_pos", 0, Some(0), "2026-01-01T00:00:00Z");
        drop(conn);

        let err = SqliteFeedbackRepository::new(&path).fetch().unwrap_err();
        assert!(matches!(err, RetrainError::DataUnavailable(_)));
    }

    #[test]
    fn test_missing_store_is_data_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = SqliteFeedbackRepository::new(dir.path().join("nope.db"))
            .fetch()
            .unwrap_err();
        assert!(matches!(err, RetrainError::DataUnavailable(msg) if msg.contains("nope.db")));
    }

    #[test]
    fn test_out_of_range_rows_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feedback.db");
        let conn = create_store(&path);
        insert(&conn, 10.0, "grocery_pos", 1, Some(1), "2026-01-01T00:00:00Z");
        conn.execute(
            "INSERT INTO predictions (amt, hour, month, dayofweek, day, category, feedback_provided, actual_fraud, created_at)
             VALUES (5.0, 25, 3, 2, 15, 'travel', 1, 0, '2026-01-02T00:00:00Z')",
            [],
        )
        .unwrap();
        drop(conn);

        let records = SqliteFeedbackRepository::new(&path).fetch().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].category, "grocery_pos");
    }

    #[test]
    fn test_real_typed_calendar_columns_are_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feedback.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE predictions (
                amt REAL, hour REAL, month REAL, dayofweek REAL, day REAL,
                category TEXT, feedback_provided INTEGER, actual_fraud REAL, created_at TEXT
            );
            INSERT INTO predictions VALUES (12.5, 14.0, 6.0, 3.0, 21.0, 'travel', 1, 1.0, '2026-01-02T00:00:00Z');
            INSERT INTO predictions VALUES (30.0, 9.5, 6.0, 3.0, 21.0, 'travel', 1, 0.0, '2026-01-01T00:00:00Z');
            "#,
        )
        .unwrap();
        drop(conn);

        let records = SqliteFeedbackRepository::new(&path).fetch().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].hour, 14);
        assert_eq!(records[0].day, 21);
        assert!(records[0].label);
    }
}
