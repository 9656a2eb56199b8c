#![allow(dead_code)]
use std::collections::VecDeque;

use anyhow::Result;
use async_trait::async_trait;
use libsql::params;

use crate::codec;
use crate::models::{Event, SiteCheck};
use crate::pool::{LibsqlManager, LibsqlPool};

/// Write seam the transfer pipeline persists batches through.
///
/// One call is one storage transaction: either every event in the
/// batch is inserted and committed, or none are.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn insert_batch(&self, events: &[Event]) -> Result<()>;
}

/// Registry of configured site checks.
pub struct SiteRepository {
    pool: LibsqlPool,
    chunk_size: usize,
}

impl SiteRepository {
    pub fn new(pool: LibsqlPool, chunk_size: usize) -> Self {
        Self { pool, chunk_size }
    }

    async fn get_conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>> {
        Ok(self.pool.get().await?)
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        let conn = self.get_conn().await?;
        // One row per URL: uniqueness doubles as duplicate-check
        // prevention, so a URL carries a single pattern.
        conn.execute(
            "CREATE TABLE IF NOT EXISTS sites (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL UNIQUE,
                regexp TEXT
            )",
            (),
        )
        .await?;
        Ok(())
    }

    pub async fn create(&self, url: &str, regexp: Option<&str>) -> Result<SiteCheck> {
        let conn = self.get_conn().await?;
        conn.execute(
            "INSERT INTO sites (url, regexp) VALUES (?, ?)",
            params![url, regexp],
        )
        .await?;

        Ok(SiteCheck {
            id: Some(conn.last_insert_rowid()),
            url: url.to_string(),
            regexp: regexp.map(str::to_string),
        })
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<SiteCheck>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query("SELECT id, url, regexp FROM sites WHERE id = ?", params![id])
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(SiteCheck {
                id: Some(row.get(0)?),
                url: row.get(1)?,
                regexp: row.get(2)?,
            }))
        } else {
            Ok(None)
        }
    }

    /// Forward-only streaming enumeration in id order. Rows are fetched
    /// in chunks to bound memory; restart only by calling again.
    pub fn get_all(&self) -> SiteCursor<'_> {
        SiteCursor { repo: self, last_id: 0, buffer: VecDeque::new(), exhausted: false }
    }

    pub async fn delete_all(&self) -> Result<()> {
        let conn = self.get_conn().await?;
        conn.execute("DELETE FROM sites", ()).await?;
        Ok(())
    }
}

/// Chunked keyset cursor over the site registry.
pub struct SiteCursor<'a> {
    repo: &'a SiteRepository,
    last_id: i64,
    buffer: VecDeque<SiteCheck>,
    exhausted: bool,
}

impl SiteCursor<'_> {
    pub async fn next(&mut self) -> Result<Option<SiteCheck>> {
        if self.buffer.is_empty() && !self.exhausted {
            self.fill().await?;
        }
        Ok(self.buffer.pop_front())
    }

    async fn fill(&mut self) -> Result<()> {
        let conn = self.repo.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT id, url, regexp FROM sites WHERE id > ? ORDER BY id LIMIT ?",
                params![self.last_id, self.repo.chunk_size as i64],
            )
            .await?;

        while let Some(row) = rows.next().await? {
            let id: i64 = row.get(0)?;
            self.last_id = id;
            self.buffer.push_back(SiteCheck {
                id: Some(id),
                url: row.get(1)?,
                regexp: row.get(2)?,
            });
        }

        if self.buffer.len() < self.repo.chunk_size {
            self.exhausted = true;
        }
        Ok(())
    }
}

/// Store of persisted availability events.
pub struct EventRepository {
    pool: LibsqlPool,
    chunk_size: usize,
}

impl EventRepository {
    pub fn new(pool: LibsqlPool, chunk_size: usize) -> Self {
        Self { pool, chunk_size }
    }

    async fn get_conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>> {
        Ok(self.pool.get().await?)
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        let conn = self.get_conn().await?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                url TEXT NOT NULL,
                duration REAL NOT NULL,
                status_code INTEGER,
                regexp_found INTEGER
            )",
            (),
        )
        .await?;
        Ok(())
    }

    pub async fn create(&self, event: &Event) -> Result<Event> {
        let conn = self.get_conn().await?;
        conn.execute(
            "INSERT INTO events (created_at, url, duration, status_code, regexp_found)
             VALUES (?, ?, ?, ?, ?)",
            params![
                codec::format_timestamp(&event.created_at),
                event.url.clone(),
                event.duration,
                event.status_code.map(i64::from),
                event.regexp_found.map(i64::from),
            ],
        )
        .await?;

        Ok(Event { id: Some(conn.last_insert_rowid()), ..event.clone() })
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Event>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT id, created_at, url, duration, status_code, regexp_found
                 FROM events WHERE id = ?",
                params![id],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(event_from_row(&row)?))
        } else {
            Ok(None)
        }
    }

    /// Forward-only streaming enumeration in id order, chunked like the
    /// site cursor.
    pub fn get_all(&self) -> EventCursor<'_> {
        EventCursor { repo: self, last_id: 0, buffer: VecDeque::new(), exhausted: false }
    }

    pub async fn delete_all(&self) -> Result<()> {
        let conn = self.get_conn().await?;
        conn.execute("DELETE FROM events", ()).await?;
        Ok(())
    }
}

#[async_trait]
impl EventSink for EventRepository {
    async fn insert_batch(&self, events: &[Event]) -> Result<()> {
        let conn = self.get_conn().await?;
        let tx = conn.transaction().await?;
        for event in events {
            // Insert-only on purpose: redelivery after a crash may
            // produce duplicate rows, which beats losing events.
            tx.execute(
                "INSERT INTO events (created_at, url, duration, status_code, regexp_found)
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    codec::format_timestamp(&event.created_at),
                    event.url.clone(),
                    event.duration,
                    event.status_code.map(i64::from),
                    event.regexp_found.map(i64::from),
                ],
            )
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

/// Chunked keyset cursor over persisted events.
pub struct EventCursor<'a> {
    repo: &'a EventRepository,
    last_id: i64,
    buffer: VecDeque<Event>,
    exhausted: bool,
}

impl EventCursor<'_> {
    pub async fn next(&mut self) -> Result<Option<Event>> {
        if self.buffer.is_empty() && !self.exhausted {
            self.fill().await?;
        }
        Ok(self.buffer.pop_front())
    }

    async fn fill(&mut self) -> Result<()> {
        let conn = self.repo.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT id, created_at, url, duration, status_code, regexp_found
                 FROM events WHERE id > ? ORDER BY id LIMIT ?",
                params![self.last_id, self.repo.chunk_size as i64],
            )
            .await?;

        while let Some(row) = rows.next().await? {
            let event = event_from_row(&row)?;
            if let Some(id) = event.id {
                self.last_id = id;
            }
            self.buffer.push_back(event);
        }

        if self.buffer.len() < self.repo.chunk_size {
            self.exhausted = true;
        }
        Ok(())
    }
}

fn event_from_row(row: &libsql::Row) -> Result<Event> {
    let created_at: String = row.get(1)?;
    Ok(Event {
        id: Some(row.get(0)?),
        created_at: codec::parse_timestamp(&created_at)?,
        url: row.get(2)?,
        duration: row.get(3)?,
        status_code: row.get::<Option<i64>>(4)?.map(|v| v as u16),
        regexp_found: row.get::<Option<i64>>(5)?.map(|v| v != 0),
    })
}
