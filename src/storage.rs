use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx::{sqlite::SqliteConnection, Connection, Row};

use crate::error::Error;
use crate::models::Record;

/// Persistence target for decoded records.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn insert(&self, record: Record) -> Result<(), Error>;
}

/// Writes each record as a JSON document into the SQLite `messages` table.
///
/// No connection outlives a call: every insert connects, writes, and closes.
pub struct SqliteSink {
    database_url: String,
}

impl SqliteSink {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }

    async fn connect(&self) -> Result<SqliteConnection, Error> {
        SqliteConnection::connect(&self.database_url)
            .await
            .map_err(Error::StoreUnavailable)
    }

    /// Every persisted document, oldest first.
    pub async fn documents(&self) -> Result<Vec<serde_json::Value>, Error> {
        let mut conn = self.connect().await?;

        let rows = sqlx::query("SELECT document FROM messages ORDER BY id")
            .fetch_all(&mut conn)
            .await;
        let _ = conn.close().await;

        rows.map_err(Error::PersistFailure)?
            .into_iter()
            .map(|row| {
                let text: String = row.get("document");
                serde_json::from_str(&text)
                    .map_err(|e| Error::PersistFailure(sqlx::Error::Decode(Box::new(e))))
            })
            .collect()
    }
}

#[async_trait]
impl Sink for SqliteSink {
    async fn insert(&self, record: Record) -> Result<(), Error> {
        let document = serde_json::to_string(&record)
            .map_err(|e| Error::PersistFailure(sqlx::Error::Encode(Box::new(e))))?;

        let mut conn = self.connect().await?;

        let result = sqlx::query("INSERT INTO messages (document, date) VALUES (?, ?)")
            .bind(&document)
            .bind(record.date())
            .execute(&mut conn)
            .await;

        if let Err(e) = conn.close().await {
            tracing::warn!("Failed to close store connection: {}", e);
        }

        result.map(|_| ()).map_err(Error::PersistFailure)
    }
}

/// Keeps records in process memory.
#[derive(Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<Record>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Record> {
        self.records.lock().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn insert(&self, record: Record) -> Result<(), Error> {
        if let Ok(mut guard) = self.records.lock() {
            guard.push(record);
        }
        Ok(())
    }
}
