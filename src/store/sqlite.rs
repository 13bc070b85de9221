//! SQLite-backed match store
//!
//! Records are keyed by their upstream id. Team data is kept as a JSON
//! column; the date partition (`YYYYMMDD`) has its own B-tree index for the
//! per-day lookups the aggregation jobs perform.

use crate::store::error::{StoreError, StoreResult};
use crate::store::types::{quick_date, MatchRecord, TeamRecord};
use crate::store::MatchSource;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use std::path::{Path, PathBuf};

/// Match store on top of a single SQLite database file
pub struct SqliteMatchStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteMatchStore {
    /// Open or create a store at `path`
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| StoreError::Open {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        Self::init_schema(&conn)?;
        Ok(Self {
            conn,
            path: Some(path),
        })
    }

    /// Open an existing store without creating anything
    pub fn open_existing(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| StoreError::Open {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            conn,
            path: Some(path),
        })
    }

    /// Scratch store, used by tests
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self { conn, path: None })
    }

    fn init_schema(conn: &Connection) -> StoreResult<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS matches (
                record_id INTEGER PRIMARY KEY,
                timestamp INTEGER NOT NULL,
                quick_date INTEGER NOT NULL,
                teams TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_matches_quick_date ON matches(quick_date)",
            [],
        )?;

        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Insert or replace a record
    pub fn insert(&mut self, record: &MatchRecord) -> StoreResult<()> {
        self.insert_batch(std::slice::from_ref(record))
    }

    /// Insert or replace many records in one transaction
    pub fn insert_batch(&mut self, records: &[MatchRecord]) -> StoreResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO matches (record_id, timestamp, quick_date, teams)
                 VALUES (?, ?, ?, ?)",
            )?;

            for record in records {
                let teams = serde_json::to_string(&record.teams)
                    .map_err(|e| StoreError::malformed(format!("record {}", record.record_id), e))?;
                stmt.execute(params![
                    record.record_id as i64,
                    record.timestamp,
                    record.quick_date().unwrap_or_default(),
                    teams
                ])?;
            }
        }
        tx.commit()?;

        Ok(())
    }

    /// Look up one record by upstream id
    pub fn get(&self, record_id: u64) -> StoreResult<Option<MatchRecord>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT record_id, timestamp, teams FROM matches WHERE record_id = ?",
        )?;

        let raw = stmt
            .query_row(params![record_id as i64], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, String>(2)?))
            })
            .optional()?;

        raw.map(|(id, ts, teams)| decode(id, ts, &teams)).transpose()
    }

    /// All records played on a given UTC day.
    ///
    /// Malformed rows are logged and skipped.
    pub fn matches_on(&self, date: NaiveDate) -> StoreResult<Vec<MatchRecord>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT record_id, timestamp, teams FROM matches
             WHERE quick_date = ?
             ORDER BY record_id",
        )?;

        let mut rows = stmt.query(params![quick_date(date)])?;
        let mut out = Vec::new();

        while let Some(row) = rows.next()? {
            match decode_row(row) {
                Ok(record) => out.push(record),
                Err(e) => tracing::warn!(%date, "Skipping record: {}", e),
            }
        }

        Ok(out)
    }

    pub fn count(&self) -> StoreResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM matches", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Raw access for tooling that needs to write unusual rows
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl MatchSource for SqliteMatchStore {
    fn len_hint(&self) -> Option<u64> {
        self.count().ok()
    }

    fn for_each_record(
        &mut self,
        visit: &mut dyn FnMut(StoreResult<MatchRecord>),
    ) -> StoreResult<()> {
        let mut stmt = self
            .conn
            .prepare("SELECT record_id, timestamp, teams FROM matches ORDER BY record_id")?;
        let mut rows = stmt.query([])?;

        while let Some(row) = rows.next()? {
            visit(decode_row(row));
        }

        Ok(())
    }
}

fn decode_row(row: &Row<'_>) -> StoreResult<MatchRecord> {
    let id: i64 = row
        .get(0)
        .map_err(|e| StoreError::malformed("row", e))?;
    let location = format!("record {}", id as u64);

    let timestamp: i64 = row
        .get(1)
        .map_err(|e| StoreError::malformed(location.clone(), e))?;
    let teams: String = row
        .get(2)
        .map_err(|e| StoreError::malformed(location, e))?;

    decode(id, timestamp, &teams)
}

fn decode(id: i64, timestamp: i64, teams: &str) -> StoreResult<MatchRecord> {
    let record_id = id as u64;
    let teams: Vec<TeamRecord> = serde_json::from_str(teams)
        .map_err(|e| StoreError::malformed(format!("record {}", record_id), e))?;

    Ok(MatchRecord {
        record_id,
        timestamp,
        teams,
    })
}
