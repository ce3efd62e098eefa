//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the PageStore trait.

use crate::state::UrlStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{PageStore, StoreError, StoreResult};
use crate::storage::{LinkRecord, NewUrlRecord, PageResult, RunRecord, RunStatus, UrlRecord};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;

const RECORD_COLUMNS: &str = "url, domain, depth, status, title, description, topic, confidence,
     discovered_from, discovered_run, discovered_at, updated_at, error_message";

const RUN_COLUMNS: &str = "id, seed_url, started_at, finished_at, config_hash, status, outcome";

/// SQLite storage backend
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens or creates the database at `path`
    ///
    /// The parent directory is created if missing. The connection runs in
    /// WAL mode with `synchronous = FULL`, so a committed write survives a
    /// crash or power loss.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn query_records(&self, sql: &str, args: impl rusqlite::Params) -> StoreResult<Vec<UrlRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let records = stmt
            .query_map(args, record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

fn corrupt(column: &'static str, value: String, idx: usize) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        Box::new(StoreError::CorruptValue { column, value }),
    )
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<UrlRecord> {
    let status: String = row.get(3)?;
    let status = UrlStatus::from_db_string(&status).ok_or_else(|| corrupt("status", status, 3))?;

    Ok(UrlRecord {
        url: row.get(0)?,
        domain: row.get(1)?,
        depth: row.get(2)?,
        status,
        title: row.get(4)?,
        description: row.get(5)?,
        topic: row.get(6)?,
        confidence: row.get(7)?,
        discovered_from: row.get(8)?,
        discovered_run: row.get(9)?,
        discovered_at: row.get(10)?,
        updated_at: row.get(11)?,
        error_message: row.get(12)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    let status: String = row.get(5)?;
    let status = RunStatus::from_db_string(&status).ok_or_else(|| corrupt("status", status, 5))?;

    Ok(RunRecord {
        id: row.get(0)?,
        seed_url: row.get(1)?,
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        config_hash: row.get(4)?,
        status,
        outcome: row.get(6)?,
    })
}

/// Checks that `url` may move to `next` and writes the new status
fn transition(conn: &Connection, url: &str, next: UrlStatus, now: &str) -> StoreResult<()> {
    let current: Option<String> = conn
        .query_row(
            "SELECT status FROM pages WHERE url = ?1",
            params![url],
            |row| row.get(0),
        )
        .optional()?;

    let current = current.ok_or_else(|| StoreError::RecordNotFound(url.to_string()))?;
    let current = UrlStatus::from_db_string(&current).ok_or(StoreError::CorruptValue {
        column: "status",
        value: current.clone(),
    })?;

    if !current.can_transition_to(next) {
        return Err(StoreError::InvalidTransition {
            url: url.to_string(),
            from: current,
            to: next,
        });
    }

    conn.execute(
        "UPDATE pages SET status = ?1, updated_at = ?2 WHERE url = ?3",
        params![next.to_db_string(), now, url],
    )?;
    Ok(())
}

impl PageStore for SqliteStore {
    // ===== Run Management =====

    fn create_run(&mut self, seed_url: &str, config_hash: &str) -> StoreResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (seed_url, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![seed_url, now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StoreResult<RunRecord> {
        let sql = format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, params![run_id], run_from_row)
            .optional()?
            .ok_or(StoreError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StoreResult<Option<RunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS);
        let run = self.conn.query_row(&sql, [], run_from_row).optional()?;
        Ok(run)
    }

    fn latest_resumable_run(&self, seed_url: &str) -> StoreResult<Option<RunRecord>> {
        Ok(self
            .resumable_runs()?
            .into_iter()
            .find(|run| run.seed_url == seed_url))
    }

    fn resumable_runs(&self) -> StoreResult<Vec<RunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC", RUN_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let runs = stmt
            .query_map([], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs.into_iter().filter(|run| run.status.is_resumable()).collect())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        outcome: Option<&str>,
    ) -> StoreResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, outcome = ?3 WHERE id = ?4",
            params![status.to_db_string(), now, outcome, run_id],
        )?;
        if updated == 0 {
            return Err(StoreError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== URL Records =====

    fn exists(&self, url: &str) -> StoreResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row("SELECT id FROM pages WHERE url = ?1", params![url], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }

    fn insert_if_absent(&mut self, record: &NewUrlRecord) -> StoreResult<bool> {
        let domain = ::url::Url::parse(&record.url)
            .ok()
            .as_ref()
            .and_then(crate::url::extract_domain)
            .unwrap_or_default();
        let now = Utc::now().to_rfc3339();

        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO pages (url, domain, depth, status, discovered_from, discovered_run, discovered_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.url,
                domain,
                record.depth,
                UrlStatus::Pending.to_db_string(),
                record.discovered_from,
                record.run_id,
                now
            ],
        )?;

        Ok(inserted == 1)
    }

    fn update_status(
        &mut self,
        url: &str,
        status: UrlStatus,
        result: Option<&PageResult>,
    ) -> StoreResult<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;

        transition(&tx, url, status, &now)?;

        if let Some(result) = result {
            let topic = result.classification.as_ref().map(|c| c.label.as_str());
            let confidence = result.classification.as_ref().and_then(|c| c.confidence);

            // A topic, once attached, is never replaced.
            tx.execute(
                "UPDATE pages SET
                    title = COALESCE(?1, title),
                    description = COALESCE(?2, description),
                    confidence = CASE WHEN topic IS NULL THEN ?4 ELSE confidence END,
                    topic = COALESCE(topic, ?3),
                    error_message = ?5
                 WHERE url = ?6",
                params![
                    result.title,
                    result.description,
                    topic,
                    confidence,
                    result.error_message,
                    url
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn update_statuses(&mut self, urls: &[String], status: UrlStatus) -> StoreResult<()> {
        if urls.is_empty() {
            return Ok(());
        }

        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        for url in urls {
            transition(&tx, url, status, &now)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get_record(&self, url: &str) -> StoreResult<Option<UrlRecord>> {
        let sql = format!("SELECT {} FROM pages WHERE url = ?1", RECORD_COLUMNS);
        let record = self
            .conn
            .query_row(&sql, params![url], record_from_row)
            .optional()?;
        Ok(record)
    }

    fn records_at_depth(
        &self,
        run_id: i64,
        depth: u32,
        statuses: &[UrlStatus],
    ) -> StoreResult<Vec<UrlRecord>> {
        let sql = format!(
            "SELECT {} FROM pages WHERE discovered_run = ?1 AND depth = ?2 ORDER BY id",
            RECORD_COLUMNS
        );
        let records = self
            .query_records(&sql, params![run_id, depth])?
            .into_iter()
            .filter(|r| statuses.contains(&r.status))
            .collect();
        Ok(records)
    }

    fn all_records(&self) -> StoreResult<Vec<UrlRecord>> {
        let sql = format!("SELECT {} FROM pages ORDER BY id", RECORD_COLUMNS);
        self.query_records(&sql, params![])
    }

    fn clear_records(&mut self) -> StoreResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM links", [])?;
        tx.execute("DELETE FROM pages", [])?;
        tx.commit()?;
        Ok(())
    }

    // ===== Link Management =====

    fn insert_links(
        &mut self,
        from_url: &str,
        to_urls: &[String],
        run_id: i64,
    ) -> StoreResult<()> {
        if to_urls.is_empty() {
            return Ok(());
        }

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO links (from_url, to_url, discovered_run) VALUES (?1, ?2, ?3)",
            )?;
            for to_url in to_urls {
                stmt.execute(params![from_url, to_url, run_id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get_outgoing_links(&self, from_url: &str) -> StoreResult<Vec<LinkRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT from_url, to_url, discovered_run FROM links WHERE from_url = ?1 ORDER BY id",
        )?;

        let links = stmt
            .query_map(params![from_url], |row| {
                Ok(LinkRecord {
                    from_url: row.get(0)?,
                    to_url: row.get(1)?,
                    discovered_run: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(links)
    }

    fn count_links(&self) -> StoreResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM links", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Statistics =====

    fn count_by_status(&self, status: UrlStatus) -> StoreResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE status = ?1",
            params![status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_total(&self) -> StoreResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_unique_domains(&self) -> StoreResult<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(DISTINCT domain) FROM pages", [], |row| {
                    row.get(0)
                })?;
        Ok(count as u64)
    }

    fn depth_breakdown(&self) -> StoreResult<BTreeMap<u32, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT depth, COUNT(*) FROM pages GROUP BY depth ORDER BY depth")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, u32>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut breakdown = BTreeMap::new();
        for row in rows {
            let (depth, count) = row?;
            breakdown.insert(depth, count as u64);
        }

        Ok(breakdown)
    }

    fn topic_breakdown(&self) -> StoreResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT topic, COUNT(*) AS count FROM pages WHERE topic IS NOT NULL
             GROUP BY topic ORDER BY count DESC, topic ASC",
        )?;

        let topics = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(topics)
    }
}
