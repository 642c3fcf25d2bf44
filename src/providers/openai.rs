use async_trait::async_trait;
use log::error;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::Provider;
use crate::errors::ProviderError;

/// Client for chat-completion compatible APIs (OpenAI, Zhipu, MiniMax, Kimi)
#[derive(Debug, Clone)]
pub struct OpenAI {
    /// HTTP client for API requests
    client: Client,
    /// API key sent as a bearer token
    api_key: String,
    /// Base URL, `/chat/completions` is appended
    endpoint: String,
}

/// Chat completion request
#[derive(Debug, Serialize, Default)]
pub struct OpenAIRequest {
    /// The model to use
    model: String,

    /// The messages for the conversation
    messages: Vec<OpenAIMessage>,

    /// Temperature for generation
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Chat message format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIMessage {
    /// Role of the message sender (system, user, assistant)
    pub role: String,

    /// Content of the message
    pub content: String,
}

/// Message as returned by the API, content may be null
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIReplyMessage {
    /// Role of the message sender
    #[serde(default)]
    pub role: Option<String>,

    /// Content of the message
    #[serde(default)]
    pub content: Option<String>,
}

/// One completion choice
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIChoice {
    /// The generated message
    pub message: OpenAIReplyMessage,
}

/// Token usage information
#[derive(Debug, Clone, Deserialize)]
pub struct TokenUsage {
    /// Number of prompt tokens
    pub prompt_tokens: u32,
    /// Number of completion tokens
    pub completion_tokens: u32,
    /// Total number of tokens
    pub total_tokens: u32,
}

/// Chat completion response
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIResponse {
    /// Completion choices
    #[serde(default)]
    pub choices: Vec<OpenAIChoice>,
    /// Token usage information
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

impl OpenAIRequest {
    /// Create a new chat completion request
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Add a message to the request
    pub fn add_message(mut self, role: impl Into<String>, content: impl Into<String>) -> Self {
        self.messages.push(OpenAIMessage {
            role: role.into(),
            content: content.into(),
        });
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

impl OpenAI {
    /// Create a new client for the given base endpoint
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::builder().build().unwrap_or_default(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
        }
    }

    /// Full URL of the chat completion route
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl Provider for OpenAI {
    type Request = OpenAIRequest;
    type Response = OpenAIResponse;

    async fn complete(&self, request: OpenAIRequest) -> Result<OpenAIResponse, ProviderError> {
        let response = self.client.post(self.completions_url())
            .header("Content-Type", "application/json")
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Request(format!("Failed to send request to {}: {}", self.endpoint, e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("Chat completion API error ({}): {}", status, error_text);
            return Err(ProviderError::Http {
                status_code: status.as_u16(),
                message: error_text,
            });
        }

        response.json::<OpenAIResponse>().await
            .map_err(|e| ProviderError::Parse(format!("Failed to parse chat completion response: {}", e)))
    }

    fn extract_text(response: &OpenAIResponse) -> Option<String> {
        response.choices.first()
            .and_then(|c| c.message.content.clone())
            .filter(|text| !text.trim().is_empty())
    }
}
