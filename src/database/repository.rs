/*!
 * Repository layer for checkpoint records.
 *
 * This module provides a high-level API over the `checkpoints` table,
 * abstracting away the SQL details and providing type-safe access.
 */

use anyhow::{Context, Result};
use log::debug;
use rusqlite::{params, OptionalExtension};

use super::connection::DatabaseConnection;
use super::models::CheckpointRecord;

/// Repository for checkpoint records
#[derive(Clone)]
pub struct Repository {
    /// Database connection
    db: DatabaseConnection,
}

impl Repository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let db = DatabaseConnection::new_in_memory()?;
        Ok(Self::new(db))
    }

    /// Load a checkpoint by id
    pub async fn get_checkpoint(&self, id: &str) -> Result<Option<CheckpointRecord>> {
        let id = id.to_string();

        let payload: Option<String> = self
            .db
            .execute_async(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT payload FROM checkpoints WHERE id = ?1",
                        params![id],
                        |row| row.get(0),
                    )
                    .optional()?)
            })
            .await?;

        payload
            .map(|json| serde_json::from_str(&json).context("Corrupt checkpoint payload"))
            .transpose()
    }

    /// Insert or replace a checkpoint
    pub async fn put_checkpoint(&self, record: &CheckpointRecord) -> Result<()> {
        let payload = serde_json::to_string(record).context("Failed to serialize checkpoint")?;
        let record = record.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT OR REPLACE INTO checkpoints (
                        id, version, source_name, book_hash, profile_hash,
                        completed_documents, total_documents, payload, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                    "#,
                    params![
                        record.id,
                        record.version,
                        record.source_name,
                        record.book_hash,
                        record.profile_hash,
                        record.completed_count() as i64,
                        record.total_count() as i64,
                        payload,
                        record.updated_at,
                    ],
                )?;
                debug!(
                    "Saved checkpoint {} ({}/{})",
                    record.id,
                    record.completed_count(),
                    record.total_count()
                );
                Ok(())
            })
            .await
    }

    /// Delete a checkpoint, returning whether a row was removed
    pub async fn delete_checkpoint(&self, id: &str) -> Result<bool> {
        let id = id.to_string();

        self.db
            .execute_async(move |conn| {
                let removed = conn.execute("DELETE FROM checkpoints WHERE id = ?1", params![id])?;
                Ok(removed > 0)
            })
            .await
    }
}
