/*!
 * Batch building.
 *
 * Packs an ordered list of texts into consecutive batches bounded by an
 * item count and a total character count. Order is never changed and a
 * single oversized text always gets a batch of its own.
 */

use std::ops::Range;

use crate::app_config::BatchingConfig;

/// Upper bounds for a single batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    /// Maximum number of texts per batch
    pub max_items: usize,
    /// Maximum total characters per batch
    pub max_chars: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_items: 40,
            max_chars: 8000,
        }
    }
}

impl From<&BatchingConfig> for BatchLimits {
    fn from(config: &BatchingConfig) -> Self {
        Self {
            max_items: config.max_items,
            max_chars: config.max_chars,
        }
    }
}

/// Length of a text as counted against `max_chars`
///
/// Unicode scalar values, so CJK text is not penalised for its UTF-8 width.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Compute batch boundaries as index ranges into `items`
///
/// Walks the items once. The current batch is closed before adding an item
/// when it is non-empty and either already holds `max_items` texts or the
/// item would push it past `max_chars`.
pub fn batch_ranges<S: AsRef<str>>(items: &[S], limits: BatchLimits) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut start = 0;
    let mut chars = 0;

    for (index, item) in items.iter().enumerate() {
        let len = char_len(item.as_ref());
        let count = index - start;
        if count > 0 && (count >= limits.max_items || chars + len > limits.max_chars) {
            ranges.push(start..index);
            start = index;
            chars = 0;
        }
        chars += len;
    }

    if start < items.len() {
        ranges.push(start..items.len());
    }
    ranges
}

/// Partition `items` into owned batches
pub fn build_batches<S: AsRef<str>>(items: &[S], limits: BatchLimits) -> Vec<Vec<String>> {
    batch_ranges(items, limits)
        .into_iter()
        .map(|range| items[range].iter().map(|s| s.as_ref().to_string()).collect())
        .collect()
}
