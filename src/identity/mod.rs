/*!
 * Task identity resolution.
 *
 * A task is identified by the bytes of its source and by the settings that
 * change the translation (target language, model, prompt template). Two runs
 * with the same identity share a checkpoint.
 */

use log::debug;
use sha2::{Digest, Sha256};

use crate::documents::DocumentSource;
use crate::errors::TranslationError;

pub mod cache;

pub use cache::SourceHashCache;

/// Prefix of every checkpoint id, bumped when the format changes
pub const CHECKPOINT_PREFIX: &str = "chapterwise:v1:";

/// Resolved identity of a translation task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskIdentity {
    /// `<prefix><book hash>:<profile hash>`
    pub checkpoint_id: String,
    /// Hex digest of the source bytes
    pub book_hash: String,
    /// Hex digest of language, model and prompt template
    pub profile_hash: String,
    /// Display name of the source
    pub source_name: String,
    /// Source size in bytes
    pub source_size: u64,
    /// Target language as configured, trimmed
    pub target_language: String,
    /// Model of the primary provider
    pub model: String,
    /// Prompt template before rendering
    pub prompt_template: String,
}

/// Lowercase hex SHA-256 of `bytes`
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Digest of the settings that influence the translation
pub fn profile_hash(target_language: &str, model: &str, prompt_template: &str) -> String {
    sha256_hex(format!("{}\n{}\n{}", target_language, model, prompt_template).as_bytes())
}

/// Checkpoint id for a source digest and profile digest
pub fn checkpoint_id(book_hash: &str, profile_hash: &str) -> String {
    format!("{}{}:{}", CHECKPOINT_PREFIX, book_hash, profile_hash)
}

/// Resolves task identities, caching source digests
#[derive(Debug, Clone, Default)]
pub struct IdentityResolver {
    cache: SourceHashCache,
}

impl IdentityResolver {
    /// Create a resolver with an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Source digest cache
    pub fn cache(&self) -> &SourceHashCache {
        &self.cache
    }

    /// Compute the identity of translating `source` with the given settings
    pub async fn resolve(
        &self,
        source: &dyn DocumentSource,
        target_language: &str,
        model: &str,
        prompt_template: &str,
    ) -> Result<TaskIdentity, TranslationError> {
        let target_language = target_language.trim();
        if target_language.is_empty() {
            return Err(TranslationError::Configuration("task identity needs a target language".to_string()));
        }
        if prompt_template.trim().is_empty() {
            return Err(TranslationError::Configuration("task identity needs a prompt template".to_string()));
        }

        let signature = source.source_signature();
        let book_hash = match self.cache.get(&signature) {
            Some(digest) => digest,
            None => {
                let bytes = source.source_bytes()
                    .map_err(|e| TranslationError::Document(format!("Failed to read source: {:#}", e)))?;
                let digest = tokio::task::spawn_blocking(move || sha256_hex(&bytes))
                    .await
                    .map_err(|e| TranslationError::Document(format!("Source hashing task failed: {}", e)))?;
                self.cache.store(signature.clone(), &digest);
                digest
            }
        };

        let profile_hash = profile_hash(target_language, model, prompt_template);
        let checkpoint_id = checkpoint_id(&book_hash, &profile_hash);
        debug!("Resolved task identity {} for {}", checkpoint_id, signature.name);

        Ok(TaskIdentity {
            checkpoint_id,
            book_hash,
            profile_hash,
            source_name: signature.name,
            source_size: signature.size,
            target_language: target_language.to_string(),
            model: model.to_string(),
            prompt_template: prompt_template.to_string(),
        })
    }
}
