/*!
 * Batch scheduling for one document.
 *
 * This module splits a document's texts into batches, translates them with
 * bounded concurrency, retries each batch with backoff and walks the
 * provider fallback chain before giving up.
 */

use futures::future::try_join_all;
use log::{info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::app_config::{Config, RetryConfig};
use crate::errors::{ProviderError, TranslationError};
use crate::providers::{BatchRequest, BatchTranslator};

use super::batch::{BatchLimits, build_batches};

/// Retry and backoff settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts against each provider
    pub attempts_per_provider: u32,
    /// First backoff, doubled on each retry
    pub backoff_base: Duration,
    /// Upper bound for a single backoff
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            attempts_per_provider: config.attempts_per_provider.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            backoff_max: Duration::from_millis(config.backoff_max_ms),
        }
    }
}

impl RetryPolicy {
    /// Sleep before the attempt following retry number `retry` (zero based)
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.backoff_base.saturating_mul(factor).min(self.backoff_max)
    }
}

/// What to translate and how to label it in logs
#[derive(Debug, Clone, Copy)]
pub struct DocumentJob<'a> {
    /// Rendered system prompt
    pub system_prompt: &'a str,
    /// Target language label
    pub target_language: &'a str,
    /// Texts to translate, in document order
    pub texts: &'a [String],
    /// Prefix for every log line, e.g. `[chapter1.xhtml] `
    pub log_prefix: &'a str,
}

/// Shared state of one document's batch run
struct BatchRun {
    /// Batches in document order
    batches: Vec<Vec<String>>,
    /// Next unclaimed batch index
    cursor: AtomicUsize,
    /// Number of finished batches
    completed: AtomicUsize,
    /// Translated batches, placed by index
    results: Mutex<Vec<Option<Vec<String>>>>,
}

/// Scheduler that drives the batches of one document
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    /// Batch size limits
    limits: BatchLimits,
    /// Maximum batches in flight
    concurrency: usize,
    /// Retry settings
    retry: RetryPolicy,
}

impl BatchScheduler {
    /// Create a new scheduler
    pub fn new(limits: BatchLimits, concurrency: usize, retry: RetryPolicy) -> Self {
        Self {
            limits,
            concurrency: concurrency.max(1),
            retry,
        }
    }

    /// Create a scheduler from the application config
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            BatchLimits::from(&config.batching),
            config.batching.batch_concurrency,
            RetryPolicy::from(&config.retry),
        )
    }

    /// Translate all texts of a document
    ///
    /// Returns one output per input, in input order. The first batch that
    /// exhausts every provider fails the whole call and stops scheduling
    /// new batches. `on_progress` receives the completed fraction after
    /// every successful batch.
    pub async fn translate_texts(
        &self,
        providers: &[Arc<dyn BatchTranslator>],
        job: &DocumentJob<'_>,
        on_progress: &(dyn Fn(f32) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, TranslationError> {
        if providers.is_empty() {
            return Err(TranslationError::Configuration("no translation provider configured".to_string()));
        }

        let batches = build_batches(job.texts, self.limits);
        let total = batches.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        let width = self.concurrency.min(total);
        info!("{}{} texts in {} batches, concurrency {}", job.log_prefix, job.texts.len(), total, width);

        let run = BatchRun {
            batches,
            cursor: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            results: Mutex::new(vec![None; total]),
        };

        try_join_all((0..width).map(|_| self.run_worker(&run, providers, job, on_progress, cancel))).await?;

        let mut output = Vec::with_capacity(job.texts.len());
        for (index, part) in run.results.into_inner().into_iter().enumerate() {
            let part = part.ok_or_else(|| TranslationError::BatchFailed {
                batch: index + 1,
                source: ProviderError::EmptyResponse("batch produced no result".to_string()),
            })?;
            output.extend(part);
        }
        Ok(output)
    }

    /// One worker: claim the next batch index until none are left
    async fn run_worker(
        &self,
        run: &BatchRun,
        providers: &[Arc<dyn BatchTranslator>],
        job: &DocumentJob<'_>,
        on_progress: &(dyn Fn(f32) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<(), TranslationError> {
        let total = run.batches.len();
        loop {
            if cancel.is_cancelled() {
                return Err(TranslationError::Cancelled);
            }

            let index = run.cursor.fetch_add(1, Ordering::SeqCst);
            let Some(batch) = run.batches.get(index) else {
                return Ok(());
            };

            let translated = self.translate_batch(providers, job, batch, index, total, cancel).await?;
            run.results.lock()[index] = Some(translated);

            let done = run.completed.fetch_add(1, Ordering::SeqCst) + 1;
            on_progress(done as f32 / total as f32);
        }
    }

    /// Translate one batch, walking retries and the fallback chain
    async fn translate_batch(
        &self,
        providers: &[Arc<dyn BatchTranslator>],
        job: &DocumentJob<'_>,
        batch: &[String],
        index: usize,
        total: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, TranslationError> {
        let request = BatchRequest {
            system_prompt: job.system_prompt,
            target_language: job.target_language,
            texts: batch,
        };
        let attempts = self.retry.attempts_per_provider.max(1);
        let mut last_error = None;

        for (position, provider) in providers.iter().enumerate() {
            if position > 0 {
                warn!("{}batch {}/{} switching to fallback provider {}", job.log_prefix, index + 1, total, provider.name());
            }

            for attempt in 0..attempts {
                if cancel.is_cancelled() {
                    return Err(TranslationError::Cancelled);
                }

                info!(
                    "{}batch {}/{} items={} provider={} model={} retry={}",
                    job.log_prefix, index + 1, total, batch.len(), provider.name(), provider.model(), attempt
                );
                let started = Instant::now();

                match provider.translate_batch(&request, cancel).await {
                    Ok(translated) => {
                        info!("{}batch {}/{} done in {:?}", job.log_prefix, index + 1, total, started.elapsed());
                        return Ok(translated);
                    }
                    Err(e) if !e.is_retryable() => {
                        return Err(if e.is_cancelled() { TranslationError::Cancelled } else { e.into() });
                    }
                    Err(e) => {
                        warn!(
                            "{}batch {}/{} failed with {} (attempt {}/{}): {}",
                            job.log_prefix, index + 1, total, provider.name(), attempt + 1, attempts, e
                        );
                        last_error = Some(e);
                        if attempt + 1 < attempts {
                            self.backoff(attempt, cancel).await?;
                        }
                    }
                }
            }
        }

        Err(TranslationError::BatchFailed {
            batch: index + 1,
            source: last_error.unwrap_or_else(|| ProviderError::Request("no provider attempted".to_string())),
        })
    }

    /// Sleep before the next retry, waking early on cancellation
    async fn backoff(&self, retry: u32, cancel: &CancellationToken) -> Result<(), TranslationError> {
        let delay = self.retry.backoff_for(retry);
        tokio::select! {
            _ = cancel.cancelled() => Err(TranslationError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}
