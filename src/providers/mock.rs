/*!
 * Mock batch translators for testing.
 *
 * This module provides mock translators that simulate different behaviors:
 * - `MockTranslator::working()` - Always succeeds, one output per input
 * - `MockTranslator::intermittent(n)` - Fails every Nth call
 * - `MockTranslator::failing()` - Always fails with an HTTP error
 * - `MockTranslator::poisoned(marker)` - Fails any batch containing `marker`
 *
 * Every mock records the batches it saw and the highest number of calls it
 * had in flight at once.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::errors::ProviderError;
use crate::providers::{BatchRequest, BatchTranslator};

/// Behavior mode for the mock translator
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with a proper translation
    Working,
    /// Fails intermittently (every Nth call)
    Intermittent { fail_every: usize },
    /// Always fails with an error
    Failing,
    /// Fails whenever a text of the batch contains the marker
    Poisoned { marker: String },
    /// Returns one item too few
    WrongLength,
    /// Returns no text at all
    Empty,
}

#[derive(Debug, Default)]
struct MockStats {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    batches: Mutex<Vec<Vec<String>>>,
}

/// Mock translator for testing scheduling behavior
#[derive(Debug, Clone)]
pub struct MockTranslator {
    /// Name reported in logs
    name: String,
    /// Behavior mode
    behavior: MockBehavior,
    /// Simulated latency per call
    delay: Option<Duration>,
    /// Shared counters, clones see the same stats
    stats: Arc<MockStats>,
}

/// Decrements the in-flight gauge when a call ends, even on cancellation
struct InFlight<'a>(&'a MockStats);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockTranslator {
    /// Create a new mock translator with the specified behavior
    pub fn new(name: impl Into<String>, behavior: MockBehavior) -> Self {
        Self {
            name: name.into(),
            behavior,
            delay: None,
            stats: Arc::new(MockStats::default()),
        }
    }

    /// Create a working mock translator that always succeeds
    pub fn working() -> Self {
        Self::new("mock", MockBehavior::Working)
    }

    /// Create an intermittently failing mock translator
    pub fn intermittent(fail_every: usize) -> Self {
        Self::new("mock", MockBehavior::Intermittent { fail_every })
    }

    /// Create a failing mock translator that always errors
    pub fn failing() -> Self {
        Self::new("mock", MockBehavior::Failing)
    }

    /// Create a mock that fails every batch containing `marker`
    pub fn poisoned(marker: impl Into<String>) -> Self {
        Self::new("mock", MockBehavior::Poisoned { marker: marker.into() })
    }

    /// Rename the mock
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add simulated latency to every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of calls received so far
    pub fn call_count(&self) -> usize {
        self.stats.calls.load(Ordering::SeqCst)
    }

    /// Highest number of concurrent calls observed
    pub fn max_in_flight(&self) -> usize {
        self.stats.max_in_flight.load(Ordering::SeqCst)
    }

    /// Every batch received, in arrival order
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.stats.batches.lock().clone()
    }

    /// Deterministic translation used by the working modes
    pub fn translate_text(target_language: &str, text: &str) -> String {
        format!("[{}] {}", target_language, text)
    }

    fn reply(&self, count: usize, request: &BatchRequest<'_>) -> Result<Vec<String>, ProviderError> {
        let translated = || {
            request.texts.iter()
                .map(|t| Self::translate_text(request.target_language, t))
                .collect::<Vec<_>>()
        };

        match &self.behavior {
            MockBehavior::Working => Ok(translated()),

            MockBehavior::Intermittent { fail_every } => {
                if *fail_every > 0 && count % fail_every == fail_every - 1 {
                    Err(ProviderError::Http {
                        status_code: 503,
                        message: format!("Simulated intermittent failure (call #{})", count + 1),
                    })
                } else {
                    Ok(translated())
                }
            }

            MockBehavior::Failing => Err(ProviderError::Http {
                status_code: 500,
                message: "Simulated provider failure".to_string(),
            }),

            MockBehavior::Poisoned { marker } => {
                if request.texts.iter().any(|t| t.contains(marker.as_str())) {
                    Err(ProviderError::Http {
                        status_code: 500,
                        message: format!("Simulated failure on {}", marker),
                    })
                } else {
                    Ok(translated())
                }
            }

            MockBehavior::WrongLength => {
                let mut out = translated();
                out.pop();
                Err(ProviderError::LengthMismatch {
                    expected: request.texts.len(),
                    actual: out.len(),
                })
            }

            MockBehavior::Empty => Err(ProviderError::EmptyResponse("mock returned nothing".to_string())),
        }
    }
}

#[async_trait]
impl BatchTranslator for MockTranslator {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn translate_batch(
        &self,
        request: &BatchRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ProviderError> {
        let count = self.stats.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.stats);

        self.stats.batches.lock().push(request.texts.to_vec());

        if let Some(delay) = self.delay {
            tokio::select! {
                _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.reply(count, request)
    }
}
