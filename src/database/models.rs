/*!
 * Persisted checkpoint record.
 */

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current checkpoint format version
pub const CHECKPOINT_VERSION: u32 = 1;

/// Resume state of one translation task, keyed by its fingerprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointRecord {
    /// Task fingerprint
    pub id: String,
    /// Record format version
    pub version: u32,
    /// Display name of the source
    pub source_name: String,
    /// Source size in bytes
    pub source_size: u64,
    /// Hex digest of the source bytes
    pub book_hash: String,
    /// Hex digest of language, model and prompt
    pub profile_hash: String,
    /// Target language as configured
    pub target_language: String,
    /// Model identifier of the primary provider
    pub model: String,
    /// System prompt template before rendering
    pub prompt_template: String,
    /// Every document id of the task, in source order
    #[serde(default)]
    pub document_order: Vec<String>,
    /// Translated content of completed documents
    #[serde(default)]
    pub translated_documents: BTreeMap<String, String>,
    /// Last recorded failure, empty when none
    #[serde(default)]
    pub last_error: String,
    /// RFC 3339 timestamp of the last save
    pub updated_at: String,
}

impl CheckpointRecord {
    /// Number of completed documents
    pub fn completed_count(&self) -> usize {
        self.translated_documents.len()
    }

    /// Number of documents in the task
    pub fn total_count(&self) -> usize {
        self.document_order.len()
    }
}
