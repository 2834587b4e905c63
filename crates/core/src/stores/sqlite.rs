use crate::traits::RecordStore;
use crate::{DocumentRecord, Sentence, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS documents (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        num_pages INTEGER NOT NULL CHECK (num_pages >= 0),
        size INTEGER NOT NULL CHECK (size >= 0),
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sentences (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        text TEXT NOT NULL,
        document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE
    )
    "#,
    "CREATE INDEX IF NOT EXISTS sentences_document_id ON sentences(document_id)",
];

pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if missing) the database at `url`, e.g.
    /// `sqlite://lexicon.db` or `sqlite::memory:`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // An in-memory database lives exactly as long as its one connection.
        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

fn timestamp_to_utc(millis: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| StoreError::BackendResponse {
        backend: "sqlite".to_string(),
        details: format!("created_at {millis} is out of range"),
    })
}

fn column_out_of_range(column: &str, value: i64) -> StoreError {
    StoreError::BackendResponse {
        backend: "sqlite".to_string(),
        details: format!("{column} {value} is out of range"),
    }
}

fn record_from_row(row: &SqliteRow) -> Result<DocumentRecord, StoreError> {
    let num_pages: i64 = row.try_get("num_pages")?;
    let size: i64 = row.try_get("size")?;
    Ok(DocumentRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        num_pages: u32::try_from(num_pages)
            .map_err(|_| column_out_of_range("num_pages", num_pages))?,
        size: u64::try_from(size).map_err(|_| column_out_of_range("size", size))?,
        created_at: timestamp_to_utc(row.try_get("created_at")?)?,
    })
}

fn sentence_from_row(row: &SqliteRow) -> Result<Sentence, StoreError> {
    Ok(Sentence {
        id: row.try_get("id")?,
        text: row.try_get("text")?,
        document_id: row.try_get("document_id")?,
    })
}

fn is_constraint_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(database_error) => matches!(
            database_error.kind(),
            sqlx::error::ErrorKind::UniqueViolation | sqlx::error::ErrorKind::ForeignKeyViolation
        ),
        _ => false,
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn create_record(
        &self,
        name: &str,
        num_pages: u32,
        size: u64,
    ) -> Result<DocumentRecord, StoreError> {
        let created_at = Utc::now();
        let size_column = i64::try_from(size)
            .map_err(|_| StoreError::Request(format!("size {size} does not fit the schema")))?;

        let result = sqlx::query(
            "INSERT INTO documents (name, num_pages, size, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(name)
        .bind(i64::from(num_pages))
        .bind(size_column)
        .bind(created_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            if is_constraint_violation(&error) {
                StoreError::Conflict(format!("record named {name} already exists"))
            } else {
                StoreError::Database(error)
            }
        })?;

        self.get_record(result.last_insert_rowid()).await
    }

    async fn get_record(&self, id: i64) -> Result<DocumentRecord, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, num_pages, size, created_at FROM documents WHERE id = ? LIMIT 1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => record_from_row(&row),
            None => Err(StoreError::NotFound(format!("record {id}"))),
        }
    }

    async fn list_records(&self) -> Result<Vec<DocumentRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, name, num_pages, size, created_at FROM documents ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn delete_record(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("record {id}")));
        }
        Ok(())
    }

    async fn create_sentence(&self, text: &str, record_id: i64) -> Result<Sentence, StoreError> {
        let result = sqlx::query("INSERT INTO sentences (text, document_id) VALUES (?, ?)")
            .bind(text)
            .bind(record_id)
            .execute(&self.pool)
            .await
            .map_err(|error| {
                if is_constraint_violation(&error) {
                    StoreError::Conflict(format!(
                        "sentence references unknown record {record_id}"
                    ))
                } else {
                    StoreError::Database(error)
                }
            })?;

        Ok(Sentence {
            id: result.last_insert_rowid(),
            text: text.to_string(),
            document_id: record_id,
        })
    }

    async fn list_sentences(&self) -> Result<Vec<Sentence>, StoreError> {
        let rows = sqlx::query("SELECT id, text, document_id FROM sentences ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(sentence_from_row).collect()
    }

    async fn list_record_sentences(&self, record_id: i64) -> Result<Vec<Sentence>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, text, document_id FROM sentences WHERE document_id = ? ORDER BY id",
        )
        .bind(record_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(sentence_from_row).collect()
    }
}
