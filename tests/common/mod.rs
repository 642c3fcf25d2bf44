/*!
 * Common test utilities for the chapterwise test suite
 */

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

use chapterwise::app_config::{Config, TranslationProvider};
use chapterwise::checkpoint::CheckpointStore;
use chapterwise::database::{CheckpointRecord, Repository};
use chapterwise::documents::{join_paragraphs, split_paragraphs, DocumentSource, SourceSignature};
use chapterwise::identity::IdentityResolver;
use chapterwise::translation::{BatchLimits, BatchScheduler, DocumentOrchestrator, RetryPolicy, TranslationTask};
use std::time::Duration;

/// In-memory document source, one paragraph per blank-line separated block
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    documents: Vec<(String, String)>,
    unreadable: HashSet<String>,
}

impl MemorySource {
    pub fn new(name: &str, documents: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            documents: documents.iter().map(|(id, c)| (id.to_string(), c.to_string())).collect(),
            unreadable: HashSet::new(),
        }
    }

    /// Make `load` fail for one document
    pub fn with_unreadable(mut self, document_id: &str) -> Self {
        self.unreadable.insert(document_id.to_string());
        self
    }
}

impl DocumentSource for MemorySource {
    fn source_name(&self) -> &str {
        &self.name
    }

    fn source_signature(&self) -> SourceSignature {
        SourceSignature {
            name: self.name.clone(),
            size: self.documents.iter().map(|(_, c)| c.len() as u64).sum(),
            modified_ms: None,
        }
    }

    fn source_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        for (id, content) in &self.documents {
            bytes.extend_from_slice(id.as_bytes());
            bytes.push(0);
            bytes.extend_from_slice(content.as_bytes());
        }
        Ok(bytes)
    }

    fn document_ids(&self) -> Vec<String> {
        self.documents.iter().map(|(id, _)| id.clone()).collect()
    }

    fn load(&self, document_id: &str) -> Result<String> {
        if self.unreadable.contains(document_id) {
            return Err(anyhow!("simulated read failure for {}", document_id));
        }
        self.documents.iter()
            .find(|(id, _)| id == document_id)
            .map(|(_, c)| c.clone())
            .ok_or_else(|| anyhow!("Unknown document: {}", document_id))
    }

    fn extract_fragments(&self, content: &str) -> Vec<String> {
        split_paragraphs(content)
    }

    fn reinsert_fragments(&self, content: &str, translated: &[String]) -> String {
        join_paragraphs(content, translated)
    }
}

/// Store wrapper that counts writes and can be told to fail
pub struct FlakyStore {
    inner: Repository,
    fail_get: bool,
    fail_put: bool,
    puts: AtomicUsize,
    saved: Mutex<Vec<CheckpointRecord>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: Repository::new_in_memory().expect("in-memory database"),
            fail_get: false,
            fail_put: false,
            puts: AtomicUsize::new(0),
            saved: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_get(mut self) -> Self {
        self.fail_get = true;
        self
    }

    pub fn failing_put(mut self) -> Self {
        self.fail_put = true;
        self
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Every record passed to `put`, in call order
    pub fn saved(&self) -> Vec<CheckpointRecord> {
        self.saved.lock().clone()
    }
}

#[async_trait]
impl CheckpointStore for FlakyStore {
    async fn get(&self, id: &str) -> Result<Option<CheckpointRecord>> {
        if self.fail_get {
            return Err(anyhow!("simulated read failure"));
        }
        self.inner.get_checkpoint(id).await
    }

    async fn put(&self, record: &CheckpointRecord) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.saved.lock().push(record.clone());
        if self.fail_put {
            return Err(anyhow!("simulated disk full"));
        }
        self.inner.put_checkpoint(record).await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        self.inner.delete_checkpoint(id).await
    }
}

/// Config with a key for the primary provider and fast retries
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.target_language = "French".to_string();
    config.translation.provider = TranslationProvider::OpenAI;
    config.translation.provider_config_mut(TranslationProvider::OpenAI).api_key = "test-key".to_string();
    config.retry.attempts_per_provider = 2;
    config.retry.backoff_base_ms = 1;
    config.retry.backoff_max_ms = 5;
    config
}

/// Retry policy that never waits long
pub fn fast_retry(attempts: u32) -> RetryPolicy {
    RetryPolicy {
        attempts_per_provider: attempts,
        backoff_base: Duration::from_millis(1),
        backoff_max: Duration::from_millis(4),
    }
}

pub fn scheduler(max_items: usize, concurrency: usize, attempts: u32) -> BatchScheduler {
    BatchScheduler::new(BatchLimits { max_items, max_chars: 10_000 }, concurrency, fast_retry(attempts))
}

pub fn orchestrator(
    document_concurrency: usize,
    batch_concurrency: usize,
    store: Arc<dyn CheckpointStore>,
) -> DocumentOrchestrator {
    DocumentOrchestrator::new(scheduler(2, batch_concurrency, 2), document_concurrency, store)
}

/// Task for `source` with French as target and a fixed prompt
pub async fn task_for(source: &dyn DocumentSource) -> TranslationTask {
    task_with_model(source, "mock-model").await
}

pub async fn task_with_model(source: &dyn DocumentSource, model: &str) -> TranslationTask {
    let identity = IdentityResolver::new()
        .resolve(source, "French", model, "Translate into {targetLanguage}.")
        .await
        .expect("identity");
    TranslationTask {
        identity,
        system_prompt: "Translate into French.".to_string(),
        target_label: "French".to_string(),
        document_ids: source.document_ids(),
    }
}

pub fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&file_path, content)?;
    Ok(file_path)
}
