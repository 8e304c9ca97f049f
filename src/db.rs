use crate::dates;
use crate::error::{Error, Result};
use crate::models::{EmailRecord, RawEmail};
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqliteRow};
use sqlx::{Executor, Row, Sqlite};
use std::path::Path;
use tracing::{debug, info};

const UPSERT_EMAIL: &str =
    "INSERT INTO emails (message_id, thread_id, from_address, subject, received_at, labels, body)
     VALUES (?, ?, ?, ?, ?, ?, ?)
     ON CONFLICT(message_id) DO UPDATE SET labels = excluded.labels
     RETURNING received_at";

const SELECT_EMAILS: &str =
    "SELECT message_id, thread_id, from_address, subject, received_at, labels, body FROM emails";

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        Self::connect(options).await
    }

    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        Self::connect(options).await
    }

    async fn connect(options: SqliteConnectOptions) -> Result<Self> {
        let pool = SqlitePool::connect_with(options).await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    pub async fn run_migrations(&self) -> Result<()> {
        let schema = include_str!("../schema.sql");
        sqlx::query(schema).execute(&self.pool).await?;
        Ok(())
    }

    /// Insert a message, or refresh only its labels if it is already stored.
    ///
    /// Content and timestamp are first-write-wins; labels are last-write-wins.
    /// Returns the stored `received_at`.
    pub async fn upsert_email(&self, email: &RawEmail) -> Result<i64> {
        upsert(&self.pool, email).await
    }

    /// Upsert a batch inside one transaction. Returns the number of rows
    /// written.
    pub async fn upsert_emails(&self, emails: &[RawEmail]) -> Result<usize> {
        if emails.is_empty() {
            info!("No emails to save");
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        for email in emails {
            upsert(&mut *tx, email).await?;
        }
        tx.commit().await?;

        info!(count = emails.len(), "Saved emails (new or updated)");
        Ok(emails.len())
    }

    /// Every stored message, in insertion order.
    pub async fn get_all_emails(&self) -> Result<Vec<EmailRecord>> {
        let rows = sqlx::query(&format!("{SELECT_EMAILS} ORDER BY rowid"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(record_from_row).collect()
    }

    pub async fn get_email(&self, message_id: &str) -> Result<Option<EmailRecord>> {
        let row = sqlx::query(&format!("{SELECT_EMAILS} WHERE message_id = ?"))
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    /// Overwrite the stored labels after a remote mutation succeeded.
    pub async fn set_labels(&self, message_id: &str, labels: &[String]) -> Result<()> {
        sqlx::query("UPDATE emails SET labels = ? WHERE message_id = ?")
            .bind(encode_labels(labels))
            .bind(message_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn count_emails(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) FROM emails")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get(0))
    }
}

async fn upsert<'e, E>(executor: E, email: &RawEmail) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let received_at = dates::parse_received(&email.date_received, Utc::now());

    let row = sqlx::query(UPSERT_EMAIL)
        .bind(&email.message_id)
        .bind(&email.thread_id)
        .bind(&email.from)
        .bind(&email.subject)
        .bind(received_at)
        .bind(encode_labels(&email.labels))
        .bind(&email.message)
        .fetch_one(executor)
        .await?;

    debug!(message_id = %email.message_id, "Saved/updated email");
    Ok(row.get(0))
}

fn encode_labels(labels: &[String]) -> String {
    // Serializing a string slice cannot fail.
    serde_json::to_string(labels).unwrap_or_else(|_| "[]".to_string())
}

fn record_from_row(row: &SqliteRow) -> Result<EmailRecord> {
    let message_id: String = row.get(0);
    let labels_json: String = row.get(5);
    let labels = serde_json::from_str(&labels_json).map_err(|source| Error::Labels {
        message_id: message_id.clone(),
        source,
    })?;

    Ok(EmailRecord {
        message_id,
        thread_id: row.get(1),
        from_address: row.get(2),
        subject: row.get(3),
        received_at: row.get(4),
        labels,
        body: row.get(6),
    })
}
