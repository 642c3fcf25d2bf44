/*!
 * Checkpoint store.
 *
 * Durable get / put / delete of checkpoint records keyed by task fingerprint,
 * plus the helpers that turn a loaded record into resume state.
 */

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};

use crate::database::{CheckpointRecord, Repository, CHECKPOINT_VERSION};
use crate::identity::TaskIdentity;

/// Persistence of checkpoint records
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the record stored under `id`
    async fn get(&self, id: &str) -> Result<Option<CheckpointRecord>>;

    /// Insert or replace a record
    async fn put(&self, record: &CheckpointRecord) -> Result<()>;

    /// Remove the record stored under `id`, returning whether one existed
    async fn delete(&self, id: &str) -> Result<bool>;
}

#[async_trait]
impl CheckpointStore for Repository {
    async fn get(&self, id: &str) -> Result<Option<CheckpointRecord>> {
        self.get_checkpoint(id).await
    }

    async fn put(&self, record: &CheckpointRecord) -> Result<()> {
        self.put_checkpoint(record).await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        self.delete_checkpoint(id).await
    }
}

/// Build the record to persist for the current state of a run
pub fn build_record(
    identity: &TaskIdentity,
    document_order: &[String],
    translated: BTreeMap<String, String>,
    last_error: &str,
) -> CheckpointRecord {
    CheckpointRecord {
        id: identity.checkpoint_id.clone(),
        version: CHECKPOINT_VERSION,
        source_name: identity.source_name.clone(),
        source_size: identity.source_size,
        book_hash: identity.book_hash.clone(),
        profile_hash: identity.profile_hash.clone(),
        target_language: identity.target_language.clone(),
        model: identity.model.clone(),
        prompt_template: identity.prompt_template.clone(),
        document_order: document_order.to_vec(),
        translated_documents: translated,
        last_error: last_error.to_string(),
        updated_at: chrono::Utc::now().to_rfc3339(),
    }
}

/// Completed documents of `record` that still belong to the task
///
/// Keys that are not current document ids are dropped.
pub fn sanitize(record: Option<&CheckpointRecord>, document_ids: &[String]) -> BTreeMap<String, String> {
    let Some(record) = record else {
        return BTreeMap::new();
    };

    let allowed: HashSet<&str> = document_ids.iter().map(String::as_str).collect();
    record.translated_documents.iter()
        .filter(|(id, _)| allowed.contains(id.as_str()))
        .map(|(id, content)| (id.clone(), content.clone()))
        .collect()
}

/// One-line human summary of a checkpoint
pub fn summary(record: Option<&CheckpointRecord>) -> String {
    match record {
        Some(record) => {
            let mut line = format!(
                "checkpoint found: {}/{} completed, updated at {}",
                record.completed_count(),
                record.total_count(),
                record.updated_at
            );
            if !record.last_error.is_empty() {
                line.push_str(&format!(" (last error: {})", record.last_error));
            }
            line
        }
        None => "no checkpoint found".to_string(),
    }
}
