//! SQLite metadata store: logical files and their ordered chunk records.

use crate::common::VaultError;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;

/// A user-visible file reconstructed from ordered chunks.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FileMetadata {
    pub id: i64,
    pub name: String,
    pub size: i64,
    pub hash: String,
    pub created_at: String,
}

/// One remote blob belonging to a file, ordered by `part_num` (1-based).
#[derive(Debug, Clone, FromRow)]
pub struct ChunkMetadata {
    pub id: i64,
    pub file_id: i64,
    pub message_id: String,
    pub part_num: i64,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    size INTEGER NOT NULL,
    hash TEXT NOT NULL DEFAULT '',
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);
CREATE TABLE IF NOT EXISTS chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    message_id TEXT NOT NULL,
    part_num INTEGER NOT NULL,
    UNIQUE(file_id, part_num)
);
";

/// Durable mapping from logical files to their chunk records.
///
/// Cheap to clone; the underlying pool is safe for concurrent use across
/// all pipeline operations.
#[derive(Clone)]
pub struct MetaStore {
    pool: SqlitePool,
}

impl MetaStore {
    /// Open (or create) the database file and apply the schema.
    pub async fn open(path: &str) -> Result<Self, VaultError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(VaultError::Store)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Self::init(pool).await
    }

    /// In-memory database for tests. Single connection so the database
    /// lives as long as the pool.
    pub async fn open_in_memory() -> Result<Self, VaultError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(VaultError::Store)?
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::init(pool).await
    }

    async fn init(pool: SqlitePool) -> Result<Self, VaultError> {
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    /// Persist a file and its full chunk set as one transaction.
    ///
    /// `remote_ids` are in upload order; parts are numbered 1..=n. A file
    /// is never visible with a partial chunk set.
    pub async fn create_file_with_chunks(
        &self,
        name: &str,
        size: i64,
        hash: &str,
        remote_ids: &[String],
    ) -> Result<i64, VaultError> {
        let mut tx = self.pool.begin().await?;

        let file_id: i64 =
            sqlx::query_scalar("INSERT INTO files (name, size, hash) VALUES (?, ?, ?) RETURNING id")
                .bind(name)
                .bind(size)
                .bind(hash)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| match &e {
                    sqlx::Error::Database(db) if db.is_unique_violation() => {
                        VaultError::Conflict(format!("file name '{}' already exists", name))
                    }
                    _ => VaultError::Store(e),
                })?;

        for (idx, remote_id) in remote_ids.iter().enumerate() {
            sqlx::query("INSERT INTO chunks (file_id, message_id, part_num) VALUES (?, ?, ?)")
                .bind(file_id)
                .bind(remote_id)
                .bind(idx as i64 + 1)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(file_id)
    }

    pub async fn get_file(&self, id: i64) -> Result<Option<FileMetadata>, VaultError> {
        let file = sqlx::query_as::<_, FileMetadata>(
            "SELECT id, name, size, hash, created_at FROM files WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(file)
    }

    /// All files, most recent first.
    pub async fn list_files(&self) -> Result<Vec<FileMetadata>, VaultError> {
        let files = sqlx::query_as::<_, FileMetadata>(
            "SELECT id, name, size, hash, created_at FROM files ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(files)
    }

    /// Chunk records for a file in reconstruction order.
    pub async fn list_chunks(&self, file_id: i64) -> Result<Vec<ChunkMetadata>, VaultError> {
        let chunks = sqlx::query_as::<_, ChunkMetadata>(
            "SELECT id, file_id, message_id, part_num FROM chunks \
             WHERE file_id = ? ORDER BY part_num ASC",
        )
        .bind(file_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(chunks)
    }

    /// Delete a file row; chunk records cascade. Returns false when no
    /// row matched.
    pub async fn delete_file(&self, id: i64) -> Result<bool, VaultError> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
