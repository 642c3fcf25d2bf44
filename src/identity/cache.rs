/*!
 * Source hash caching.
 *
 * Hashing a whole source is the slowest part of resolving a task identity.
 * This cache remembers the digest per source signature so repeated
 * resolutions of an unchanged source skip the rehash.
 */

use std::collections::HashMap;
use std::sync::Arc;
use parking_lot::RwLock;
use log::debug;

use crate::documents::SourceSignature;

/// Cache of source digests keyed by signature
#[derive(Debug, Clone, Default)]
pub struct SourceHashCache {
    /// Internal cache storage
    cache: Arc<RwLock<HashMap<SourceSignature, String>>>,

    /// Cache hit counter
    hits: Arc<RwLock<usize>>,

    /// Cache miss counter
    misses: Arc<RwLock<usize>>,
}

impl SourceHashCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a digest from the cache
    pub fn get(&self, signature: &SourceSignature) -> Option<String> {
        let cache = self.cache.read();

        match cache.get(signature) {
            Some(digest) => {
                *self.hits.write() += 1;
                debug!("Source hash cache hit for {} ({} bytes)", signature.name, signature.size);
                Some(digest.clone())
            }
            None => {
                *self.misses.write() += 1;
                debug!("Source hash cache miss for {} ({} bytes)", signature.name, signature.size);
                None
            }
        }
    }

    /// Store a digest in the cache
    pub fn store(&self, signature: SourceSignature, digest: &str) {
        self.cache.write().insert(signature, digest.to_string());
    }

    /// Get cache statistics as (hits, misses, hit rate)
    pub fn stats(&self) -> (usize, usize, f64) {
        let hits = *self.hits.read();
        let misses = *self.misses.read();
        let total = hits + misses;

        let hit_rate = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };

        (hits, misses, hit_rate)
    }

    /// Number of cached digests
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
