use async_trait::async_trait;
use log::error;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use super::Provider;
use crate::errors::ProviderError;

/// Client for the first-party generative API
#[derive(Debug, Clone)]
pub struct Gemini {
    /// HTTP client for API requests
    client: Client,
    /// API key, passed as the `key` query parameter
    api_key: String,
    /// Base URL, e.g. `https://generativelanguage.googleapis.com/v1beta`
    endpoint: String,
}

/// A text part of a content block
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GeminiPart {
    /// Text of the part
    #[serde(default)]
    pub text: String,
}

/// A content block (system instruction or conversation turn)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GeminiContent {
    /// Role of the turn, omitted for the system instruction
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub role: Option<String>,
    /// Parts of the content
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

/// Generation settings
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Sampling temperature
    pub temperature: f32,
    /// Structured-output hint, some deployments reject it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
}

/// `generateContent` request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    /// Model name, part of the URL rather than the body
    #[serde(skip)]
    pub model: String,
    /// System instruction
    pub system_instruction: GeminiContent,
    /// Conversation turns
    pub contents: Vec<GeminiContent>,
    /// Generation settings
    pub generation_config: GenerationConfig,
}

/// One response candidate
#[derive(Debug, Clone, Deserialize)]
pub struct GeminiCandidate {
    /// Generated content
    #[serde(default)]
    pub content: Option<GeminiContent>,
}

/// Safety feedback about the prompt
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    /// Reason the prompt was blocked, if any
    #[serde(default)]
    pub block_reason: Option<String>,
}

/// `generateContent` response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse {
    /// Response candidates
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
    /// Prompt feedback
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

impl GeminiRequest {
    /// Create a request with one user turn
    pub fn new(model: impl Into<String>, system_prompt: &str, user_prompt: &str, temperature: f32) -> Self {
        Self {
            model: model.into(),
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart { text: system_prompt.to_string() }],
            },
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart { text: user_prompt.to_string() }],
            }],
            generation_config: GenerationConfig {
                temperature,
                response_mime_type: None,
            },
        }
    }

    /// Ask for a JSON reply
    pub fn with_json_output(mut self) -> Self {
        self.generation_config.response_mime_type = Some("application/json".to_string());
        self
    }

    /// Drop the structured-output hint
    pub fn without_json_output(mut self) -> Self {
        self.generation_config.response_mime_type = None;
        self
    }
}

impl GeminiResponse {
    /// Block reason reported by the API, if any
    pub fn block_reason(&self) -> Option<&str> {
        self.prompt_feedback.as_ref().and_then(|f| f.block_reason.as_deref())
    }
}

impl Gemini {
    /// Create a new client
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::builder().build().unwrap_or_default(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
        }
    }

    /// Build `{endpoint}/models/{model}:generateContent?key={api_key}`
    pub fn generate_url(&self, model: &str) -> Result<Url, ProviderError> {
        let mut url = Url::parse(self.endpoint.trim_end_matches('/'))
            .map_err(|e| ProviderError::Request(format!("Invalid endpoint {}: {}", self.endpoint, e)))?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::Request(format!("Endpoint cannot be a base URL: {}", self.endpoint)))?
            .pop_if_empty()
            .push("models")
            .push(&format!("{}:generateContent", model));
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }

    /// Whether an error body complains about the structured-output hint
    pub fn rejects_json_output(error: &ProviderError) -> bool {
        match error {
            ProviderError::Http { message, .. } => {
                message.contains("responseMimeType") || message.contains("response_mime_type")
            }
            _ => false,
        }
    }
}

#[async_trait]
impl Provider for Gemini {
    type Request = GeminiRequest;
    type Response = GeminiResponse;

    async fn complete(&self, request: GeminiRequest) -> Result<GeminiResponse, ProviderError> {
        let url = self.generate_url(&request.model)?;

        let response = self.client.post(url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Request(format!("Failed to send request to {}: {}", self.endpoint, e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("Generative API error ({}): {}", status, error_text);
            return Err(ProviderError::Http {
                status_code: status.as_u16(),
                message: error_text,
            });
        }

        response.json::<GeminiResponse>().await
            .map_err(|e| ProviderError::Parse(format!("Failed to parse generative response: {}", e)))
    }

    fn extract_text(response: &GeminiResponse) -> Option<String> {
        let text: String = response.candidates.first()
            .and_then(|c| c.content.as_ref())
            .map(|content| content.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default();

        if text.trim().is_empty() { None } else { Some(text) }
    }
}
