use crate::error::StoreError;
use crate::models::MessageRecord;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Created,
    AlreadyExists,
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        Self::connect(database_url, true).await
    }

    /// Opens a database that must already exist, overriding any `mode=rwc` in the url.
    pub async fn open_existing(database_url: &str) -> Result<Self> {
        Self::connect(database_url, false).await
    }

    async fn connect(database_url: &str, create: bool) -> Result<Self> {
        use sqlx::sqlite::SqliteConnectOptions;
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(create);

        // A single connection serializes every mutation.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        let schema = include_str!("../schema.sql");
        sqlx::query(schema).execute(&self.pool).await?;
        Ok(())
    }

    /// Inserts a record unless one with the same `message_id` is already stored.
    /// The existing row is never touched.
    pub async fn insert(&self, record: &MessageRecord) -> Result<InsertOutcome> {
        let result = sqlx::query(
            "INSERT INTO messages (message_id, thread_id, subject, sender, recipient, snippet, received_at, is_read)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.message_id)
        .bind(&record.thread_id)
        .bind(&record.subject)
        .bind(&record.sender)
        .bind(&record.recipient)
        .bind(&record.snippet)
        .bind(record.received_at.map(|ts| ts.timestamp_millis()))
        .bind(record.is_read)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Created),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Ok(InsertOutcome::AlreadyExists)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list_all(&self) -> Result<Vec<MessageRecord>> {
        let rows = sqlx::query(
            "SELECT message_id, thread_id, subject, sender, recipient, snippet, received_at, is_read
             FROM messages",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(record_from_row).collect())
    }

    pub async fn get(&self, message_id: &str) -> Result<Option<MessageRecord>> {
        let row = sqlx::query(
            "SELECT message_id, thread_id, subject, sender, recipient, snippet, received_at, is_read
             FROM messages
             WHERE message_id = ?",
        )
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(record_from_row))
    }

    /// Newest record whose sender or subject contains `term`.
    pub async fn find_latest(&self, term: &str) -> Result<Option<MessageRecord>> {
        let pattern = format!("%{}%", term);
        let row = sqlx::query(
            "SELECT message_id, thread_id, subject, sender, recipient, snippet, received_at, is_read
             FROM messages
             WHERE sender LIKE ? OR subject LIKE ?
             ORDER BY received_at DESC
             LIMIT 1",
        )
        .bind(&pattern)
        .bind(&pattern)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(record_from_row))
    }

    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get(0))
    }

    pub async fn update_is_read(&self, message_id: &str, is_read: bool) -> Result<()> {
        let result = sqlx::query("UPDATE messages SET is_read = ? WHERE message_id = ?")
            .bind(is_read)
            .bind(message_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(message_id.to_string()));
        }
        Ok(())
    }
}

fn record_from_row(row: &SqliteRow) -> MessageRecord {
    let received_at: Option<i64> = row.get(6);
    MessageRecord {
        message_id: row.get(0),
        thread_id: row.get(1),
        subject: row.get(2),
        sender: row.get(3),
        recipient: row.get(4),
        snippet: row.get(5),
        received_at: received_at.and_then(DateTime::<Utc>::from_timestamp_millis),
        is_read: row.get(7),
    }
}
