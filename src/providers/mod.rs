/*!
 * Provider implementations for different translation services.
 *
 * This module contains client implementations for the two wire shapes the
 * pipeline speaks:
 * - Gemini: first-party generative API (`generateContent`)
 * - OpenAI: any chat-completion compatible endpoint (Zhipu, MiniMax, Kimi, OpenAI)
 *
 * It also defines `BatchTranslator`, the seam the batch scheduler drives.
 */

use async_trait::async_trait;
use std::fmt::Debug;
use tokio_util::sync::CancellationToken;

use crate::errors::ProviderError;

/// Common trait for the raw HTTP clients
///
/// This trait defines the interface that all provider clients follow,
/// allowing the caller to treat them uniformly.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// The request type for this provider
    type Request: Send + Sync;

    /// The response type for this provider
    type Response: Send + Sync;

    /// Complete a request using this provider
    ///
    /// # Arguments
    /// * `request` - The request to complete
    ///
    /// # Returns
    /// * `Result<Self::Response, ProviderError>` - The response from the provider or an error
    async fn complete(&self, request: Self::Request) -> Result<Self::Response, ProviderError>;

    /// Extract the reply text from the provider response
    ///
    /// Returns `None` when the response carries no text at all.
    fn extract_text(response: &Self::Response) -> Option<String>;
}

/// One batch of texts to translate
#[derive(Debug, Clone, Copy)]
pub struct BatchRequest<'a> {
    /// Rendered system prompt
    pub system_prompt: &'a str,
    /// Target language label as shown to the model
    pub target_language: &'a str,
    /// Source texts, in order
    pub texts: &'a [String],
}

/// Something that can translate a whole batch in one call
///
/// Implementations must return exactly one output per input text, in order,
/// and must return `ProviderError::Cancelled` promptly once `cancel` fires.
#[async_trait]
pub trait BatchTranslator: Send + Sync {
    /// Provider name used in log lines
    fn name(&self) -> &str;

    /// Model name used in log lines
    fn model(&self) -> &str;

    /// Translate one batch
    async fn translate_batch(
        &self,
        request: &BatchRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ProviderError>;
}

pub mod gemini;
pub mod mock;
pub mod openai;
