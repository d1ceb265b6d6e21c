use std::collections::BTreeMap;
use std::path::Path;

use rusqlite::{params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::database::schema::{self, RESET_SCHEMA};
use crate::{RecorderError, Result};

/// Metadata for one asset, as written to `game_content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub asset_name: String,
    pub asset_class: String,
    pub asset_class_path: String,
    /// Package name, e.g. `/Game/Props/SM_Chair`. Unique per table.
    pub ue_file_path: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub referencers: Vec<String>,
    #[serde(default)]
    pub tag_values: BTreeMap<String, String>,
    #[serde(default)]
    pub file_size_mb: f64,
    /// `YYYY-MM-DD HH:MM:SS`, empty when the file could not be found.
    #[serde(default)]
    pub last_mod_time: String,
    #[serde(default)]
    pub disk_file_path: String,
    #[serde(default)]
    pub is_asset_loaded: bool,
    #[serde(default)]
    pub is_redirector: bool,
    #[serde(default)]
    pub is_u_asset: bool,
    #[serde(default)]
    pub is_valid: bool,
}

impl AssetRecord {
    /// Column values in `schema::ASSET_FIELDS` order.
    pub fn values(&self) -> Result<[String; 14]> {
        Ok([
            self.asset_name.clone(),
            self.asset_class.clone(),
            self.ue_file_path.clone(),
            serde_json::to_string(&self.dependencies)?,
            serde_json::to_string(&self.referencers)?,
            serde_json::to_string(&self.tag_values)?,
            format!("{:?}", round_mb(self.file_size_mb)),
            self.last_mod_time.clone(),
            self.disk_file_path.clone(),
            bool_text(self.is_asset_loaded).to_string(),
            bool_text(self.is_redirector).to_string(),
            bool_text(self.is_u_asset).to_string(),
            bool_text(self.is_valid).to_string(),
            self.asset_class_path.clone(),
        ])
    }
}

/// Rounds a megabyte figure to three fractional digits.
pub fn round_mb(mb: f64) -> f64 {
    (mb * 1000.0).round() / 1000.0
}

pub fn bytes_to_mb(bytes: u64) -> f64 {
    round_mb(bytes as f64 / (1024.0 * 1024.0))
}

// Capitalized so rows match what the editor-side scripts wrote.
fn bool_text(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

/// Result of flushing one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// The transaction committed. `inserted` excludes ignored duplicates.
    Committed { records: usize, inserted: usize },
    /// The transaction failed and the batch was discarded.
    Dropped { records: usize },
}

pub struct TransactionManager {
    conn: Connection,
    buffer: Vec<AssetRecord>,
    buffer_limit: usize,
}

impl TransactionManager {
    /// Opens the database and recreates the asset table empty.
    pub fn open(path: &Path, buffer_limit: usize) -> Result<Self> {
        let init = |path: &Path| -> rusqlite::Result<Connection> {
            let conn = Connection::open(path)?;
            conn.execute_batch(RESET_SCHEMA)?;
            Ok(conn)
        };
        let conn = init(path).map_err(|source| RecorderError::StorageInit {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            conn,
            buffer: Vec::with_capacity(buffer_limit.max(1)),
            buffer_limit: buffer_limit.max(1),
        })
    }

    pub fn buffer_limit(&self) -> usize {
        self.buffer_limit
    }

    /// Buffers a record, flushing when the buffer reaches its limit.
    pub fn add(&mut self, record: AssetRecord) -> Option<BatchOutcome> {
        self.buffer.push(record);
        if self.buffer.len() >= self.buffer_limit {
            return self.flush();
        }
        None
    }

    /// Writes the buffer in one transaction. The buffer is cleared whether or
    /// not the write succeeds. Returns `None` when there was nothing to write.
    pub fn flush(&mut self) -> Option<BatchOutcome> {
        if self.buffer.is_empty() {
            return None;
        }

        let records = self.buffer.len();
        let outcome = match self.insert_buffer() {
            Ok(inserted) => {
                debug!("Committed batch of {} ({} new rows)", records, inserted);
                BatchOutcome::Committed { records, inserted }
            }
            Err(e) => {
                error!("Batch insert failed, dropping {} records: {}", records, e);
                BatchOutcome::Dropped { records }
            }
        };
        self.buffer.clear();
        Some(outcome)
    }

    fn insert_buffer(&mut self) -> Result<usize> {
        // Rolled back on drop if anything below fails.
        let tx = self.conn.transaction()?;
        let mut inserted = 0;

        {
            let mut stmt = tx.prepare(&schema::insert_statement())?;
            for record in &self.buffer {
                let values = record.values()?;
                inserted += stmt.execute(params_from_iter(values.iter()))?;
            }
        }

        tx.commit()?;
        Ok(inserted)
    }

    /// Closes the connection. Buffered records must be flushed first.
    pub fn close(self) -> Result<()> {
        if !self.buffer.is_empty() {
            error!("Closing with {} unflushed records", self.buffer.len());
        }
        self.conn.close().map_err(|(_, e)| RecorderError::Storage(e))
    }
}

#[cfg(test)]
pub(crate) fn sample_record(path: &str) -> AssetRecord {
    let name = path.rsplit('/').next().unwrap_or(path).to_string();
    AssetRecord {
        asset_name: name,
        asset_class: "StaticMesh".to_string(),
        asset_class_path: "/Script/Engine".to_string(),
        ue_file_path: path.to_string(),
        dependencies: vec!["/Game/Materials/M_Base".to_string()],
        referencers: Vec::new(),
        tag_values: BTreeMap::from([("Triangles".to_string(), "128".to_string())]),
        file_size_mb: 0.25,
        last_mod_time: "2024-01-01 12:00:00".to_string(),
        disk_file_path: format!("C:/Project/Content{}.uasset", path.trim_start_matches("/Game")),
        is_asset_loaded: false,
        is_redirector: false,
        is_u_asset: true,
        is_valid: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    fn count_rows(path: &Path) -> Result<i64> {
        let conn = Connection::open(path)?;
        Ok(conn.query_row("SELECT COUNT(*) FROM game_content", [], |row| row.get(0))?)
    }

    #[test]
    fn test_values_encode_json_and_bool_text() -> Result<()> {
        let record = sample_record("/Game/Props/SM_Chair");
        let values = record.values()?;
        assert_eq!(values[2], "/Game/Props/SM_Chair");
        assert_eq!(values[3], r#"["/Game/Materials/M_Base"]"#);
        assert_eq!(values[4], "[]");
        assert_eq!(values[5], r#"{"Triangles":"128"}"#);
        assert_eq!(values[6], "0.25");
        assert_eq!(values[9], "False");
        assert_eq!(values[11], "True");
        Ok(())
    }

    #[test]
    fn test_size_rounding() {
        assert_eq!(bytes_to_mb(0), 0.0);
        assert_eq!(bytes_to_mb(1024 * 1024), 1.0);
        assert_eq!(bytes_to_mb(1_500_000), 1.431);
        assert_eq!(format!("{:?}", bytes_to_mb(0)), "0.0");
    }

    #[test]
    fn test_flush_at_limit_and_ignore_duplicates() -> Result<()> {
        let dir = tempdir()?;
        let db = dir.path().join("assets.db");
        let mut tm = TransactionManager::open(&db, 3)?;

        assert_eq!(tm.add(sample_record("/Game/A")), None);
        assert_eq!(tm.add(sample_record("/Game/A")), None);
        assert_eq!(
            tm.add(sample_record("/Game/B")),
            Some(BatchOutcome::Committed { records: 3, inserted: 2 })
        );
        assert_eq!(tm.flush(), None);
        tm.close()?;

        assert_eq!(count_rows(&db)?, 2);
        Ok(())
    }

    #[test]
    fn test_malformed_record_drops_whole_batch() -> Result<()> {
        let dir = tempdir()?;
        let db = dir.path().join("assets.db");
        let mut tm = TransactionManager::open(&db, 10)?;

        tm.add(sample_record("/Game/Good"));
        tm.add(sample_record(""));
        assert_eq!(tm.flush(), Some(BatchOutcome::Dropped { records: 2 }));

        tm.add(sample_record("/Game/Later"));
        assert_eq!(
            tm.flush(),
            Some(BatchOutcome::Committed { records: 1, inserted: 1 })
        );
        tm.close()?;

        let conn = Connection::open(&db)?;
        let path: String =
            conn.query_row("SELECT ue_file_path FROM game_content", [], |row| row.get(0))?;
        assert_eq!(path, "/Game/Later");
        Ok(())
    }

    #[test]
    fn test_empty_path_at_batch_limit_rolls_back_valid_rows() -> Result<()> {
        let dir = tempdir()?;
        let db = dir.path().join("assets.db");
        let mut tm = TransactionManager::open(&db, 10)?;

        let mut outcome = None;
        for i in 0..9 {
            outcome = tm.add(sample_record(&format!("/Game/Batch/{}", i)));
        }
        assert_eq!(outcome, None);
        assert_eq!(
            tm.add(sample_record("")),
            Some(BatchOutcome::Dropped { records: 10 })
        );
        tm.close()?;

        assert_eq!(count_rows(&db)?, 0);
        Ok(())
    }

    #[test]
    fn test_bad_boolean_text_rejected_by_schema() -> Result<()> {
        let dir = tempdir()?;
        let db = dir.path().join("assets.db");
        TransactionManager::open(&db, 10)?.close()?;

        let conn = Connection::open(&db)?;
        let mut values = sample_record("/Game/Raw").values()?;
        values[12] = "yes".to_string();
        let inserted = conn.execute(&schema::insert_statement(), params_from_iter(values.iter()));
        assert!(inserted.is_err());
        assert_eq!(count_rows(&db)?, 0);
        Ok(())
    }

    #[test]
    fn test_open_recreates_table() -> Result<()> {
        let dir = tempdir()?;
        let db = dir.path().join("assets.db");

        let mut tm = TransactionManager::open(&db, 10)?;
        tm.add(sample_record("/Game/A"));
        tm.flush();
        tm.close()?;
        assert_eq!(count_rows(&db)?, 1);

        TransactionManager::open(&db, 10)?.close()?;
        assert_eq!(count_rows(&db)?, 0);
        Ok(())
    }

    #[test]
    fn test_open_fails_for_unusable_location() -> Result<()> {
        let dir = tempdir()?;
        let missing = dir.path().join("no_such_dir").join("assets.db");
        let err = TransactionManager::open(&missing, 10).err();
        assert!(matches!(err, Some(RecorderError::StorageInit { .. })));
        Ok(())
    }
}
