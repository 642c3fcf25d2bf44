/*!
 * Single provider call for one batch.
 *
 * `ProviderClient` wraps one configured provider, builds the instruction
 * turn, applies the wall-clock budget and the run's cancellation token,
 * and turns the reply into exactly one string per submitted text.
 */

use async_trait::async_trait;
use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use crate::app_config::{ProviderSettings, WireShape};
use crate::errors::ProviderError;
use crate::providers::gemini::{Gemini, GeminiRequest};
use crate::providers::openai::{OpenAI, OpenAIRequest};
use crate::providers::{BatchRequest, BatchTranslator, Provider};

use super::response::parse_json_array;

/// Build the instruction turn for a batch
///
/// The texts are embedded as a JSON array so that quoting and line breaks
/// survive the round trip.
pub fn build_user_prompt(target_language: &str, texts: &[String]) -> Result<String, ProviderError> {
    let payload = serde_json::to_string(texts)
        .map_err(|e| ProviderError::Parse(format!("Failed to encode batch: {}", e)))?;

    Ok([
        format!("Translate each item of the following JSON array into {}.", target_language),
        "Requirements:".to_string(),
        "1) The output must be a JSON array of strings.".to_string(),
        "2) The output array must have exactly the same length and order as the input.".to_string(),
        "3) Output only the JSON array, without explanations or code fences.".to_string(),
        "4) Keep punctuation, numbers and line-break structure.".to_string(),
        "Input:".to_string(),
        payload,
    ]
    .join("\n"))
}

/// Parse a reply and check it has one item per submitted text
pub fn decode_reply(reply: &str, expected: usize) -> Result<Vec<String>, ProviderError> {
    let items = parse_json_array(reply)?;
    if items.len() != expected {
        return Err(ProviderError::LengthMismatch {
            expected,
            actual: items.len(),
        });
    }
    Ok(items)
}

/// A configured provider ready to translate batches
#[derive(Debug, Clone)]
pub enum ProviderClient {
    /// First-party generative API
    Generative {
        client: Gemini,
        settings: ProviderSettings,
    },
    /// Chat-completion compatible API
    ChatCompletion {
        client: OpenAI,
        settings: ProviderSettings,
    },
}

impl ProviderClient {
    /// Create the client matching the provider's wire shape
    pub fn new(settings: ProviderSettings) -> Self {
        match settings.provider.shape() {
            WireShape::Generative => Self::Generative {
                client: Gemini::new(settings.api_key.clone(), settings.endpoint.clone()),
                settings,
            },
            WireShape::ChatCompletion => Self::ChatCompletion {
                client: OpenAI::new(settings.api_key.clone(), settings.endpoint.clone()),
                settings,
            },
        }
    }

    /// Settings this client was built from
    pub fn settings(&self) -> &ProviderSettings {
        match self {
            Self::Generative { settings, .. } | Self::ChatCompletion { settings, .. } => settings,
        }
    }

    /// Send one request and return the raw reply text
    async fn request_text(&self, system_prompt: &str, user_prompt: &str) -> Result<String, ProviderError> {
        match self {
            Self::Generative { client, settings } => {
                let request = GeminiRequest::new(&settings.model, system_prompt, user_prompt, settings.temperature)
                    .with_json_output();
                let response = match client.complete(request.clone()).await {
                    Err(e) if Gemini::rejects_json_output(&e) => {
                        warn!("{} rejected the JSON output hint, retrying without it", settings.name());
                        client.complete(request.without_json_output()).await?
                    }
                    other => other?,
                };

                Gemini::extract_text(&response).ok_or_else(|| {
                    let reason = response.block_reason().unwrap_or("no candidates");
                    ProviderError::EmptyResponse(format!("{} returned no text ({})", settings.name(), reason))
                })
            }
            Self::ChatCompletion { client, settings } => {
                let request = OpenAIRequest::new(&settings.model)
                    .add_message("system", system_prompt)
                    .add_message("user", user_prompt)
                    .temperature(settings.temperature);
                let response = client.complete(request).await?;

                OpenAI::extract_text(&response).ok_or_else(|| {
                    ProviderError::EmptyResponse(format!("{} returned no text", settings.name()))
                })
            }
        }
    }
}

#[async_trait]
impl BatchTranslator for ProviderClient {
    fn name(&self) -> &str {
        self.settings().name()
    }

    fn model(&self) -> &str {
        &self.settings().model
    }

    async fn translate_batch(
        &self,
        request: &BatchRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ProviderError> {
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        let user_prompt = build_user_prompt(request.target_language, request.texts)?;
        let budget = self.settings().timeout;

        let reply = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            result = tokio::time::timeout(budget, self.request_text(request.system_prompt, &user_prompt)) => {
                match result {
                    Ok(reply) => reply?,
                    Err(_) => return Err(ProviderError::Timeout(budget.as_secs())),
                }
            }
        };

        debug!("{} replied with {} chars", self.name(), reply.len());
        decode_reply(&reply, request.texts.len())
    }
}
