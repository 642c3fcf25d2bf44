use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::TranslationError;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and resolving provider settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Target language label or ISO code
    pub target_language: String,

    /// System prompt template, `{targetLanguage}` is substituted at run time
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Translation config
    pub translation: TranslationConfig,

    /// Batch sizing and pool widths
    #[serde(default)]
    pub batching: BatchingConfig,

    /// Retry and backoff policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Checkpoint persistence
    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    // @provider: Google Gemini (first-party generative API)
    #[default]
    Gemini,
    // @provider: Zhipu GLM (chat-completion compatible)
    Zhipu,
    // @provider: MiniMax (chat-completion compatible)
    Minimax,
    // @provider: Moonshot Kimi (chat-completion compatible)
    Kimi,
    // @provider: OpenAI or any other chat-completion compatible server
    OpenAI,
}

/// Wire protocol family a provider speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireShape {
    /// Single system instruction plus one user turn, structured-output hint
    Generative,
    /// `/chat/completions` with a system/user message pair
    ChatCompletion,
}

impl TranslationProvider {
    // @returns: Human readable provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Gemini => "Google Gemini",
            Self::Zhipu => "Zhipu GLM",
            Self::Minimax => "MiniMax",
            Self::Kimi => "Moonshot Kimi",
            Self::OpenAI => "OpenAI",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Gemini => "gemini".to_string(),
            Self::Zhipu => "zhipu".to_string(),
            Self::Minimax => "minimax".to_string(),
            Self::Kimi => "kimi".to_string(),
            Self::OpenAI => "openai".to_string(),
        }
    }

    /// Wire shape used to talk to this provider
    pub fn shape(&self) -> WireShape {
        match self {
            Self::Gemini => WireShape::Generative,
            _ => WireShape::ChatCompletion,
        }
    }

    /// Default model name for this provider
    pub fn default_model(&self) -> String {
        match self {
            Self::Gemini => default_gemini_model(),
            Self::Zhipu => "glm-4-flash".to_string(),
            Self::Minimax => "MiniMax-Text-01".to_string(),
            Self::Kimi => "moonshot-v1-8k".to_string(),
            Self::OpenAI => "gpt-4o-mini".to_string(),
        }
    }

    /// Default base endpoint for this provider
    pub fn default_endpoint(&self) -> String {
        match self {
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta".to_string(),
            Self::Zhipu => "https://open.bigmodel.cn/api/paas/v4".to_string(),
            Self::Minimax => "https://api.minimaxi.com/v1".to_string(),
            Self::Kimi => "https://api.moonshot.cn/v1".to_string(),
            Self::OpenAI => "https://api.openai.com/v1".to_string(),
        }
    }
}

// Implement Display trait for TranslationProvider
impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

// Implement FromStr trait for TranslationProvider
impl std::str::FromStr for TranslationProvider {
    type Err = TranslationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "zhipu" => Ok(Self::Zhipu),
            "minimax" => Ok(Self::Minimax),
            "kimi" => Ok(Self::Kimi),
            "openai" => Ok(Self::OpenAI),
            _ => Err(TranslationError::Configuration(format!("Invalid provider type: {}", s))),
        }
    }
}

/// Provider configuration entry as stored in the config file
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    // @field: Model name
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL, empty means the provider default
    #[serde(default = "String::new")]
    pub endpoint: String,
}

impl ProviderConfig {
    // @param provider_type: Provider enum
    // @returns: Provider config with defaults and no credential
    pub fn new(provider_type: TranslationProvider) -> Self {
        Self {
            provider_type: provider_type.to_lowercase_string(),
            model: provider_type.default_model(),
            api_key: String::new(),
            endpoint: provider_type.default_endpoint(),
        }
    }
}

/// Fully resolved settings for one provider, ready to build a client from
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    /// Which provider this is
    pub provider: TranslationProvider,
    /// Base endpoint without trailing slash
    pub endpoint: String,
    /// Credential
    pub api_key: String,
    /// Normalized model name
    pub model: String,
    /// Wall-clock budget for one request
    pub timeout: Duration,
    /// Sampling temperature
    pub temperature: f32,
}

impl ProviderSettings {
    /// Name used in log lines
    pub fn name(&self) -> &str {
        self.provider.display_name()
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Primary translation provider
    #[serde(default)]
    pub provider: TranslationProvider,

    /// Known provider entries (credentials, models, endpoints)
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,

    /// Whether fallback providers are attempted after the primary
    #[serde(default = "default_true")]
    pub enable_fallback: bool,

    /// Priority order of fallback providers
    #[serde(default = "default_fallback_order")]
    pub fallback_order: Vec<TranslationProvider>,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Temperature parameter for text generation
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

/// Batch sizing and concurrency widths
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BatchingConfig {
    /// Maximum fragments per batch
    #[serde(default = "default_batch_max_items")]
    pub max_items: usize,

    /// Maximum characters per batch
    #[serde(default = "default_batch_max_chars")]
    pub max_chars: usize,

    /// Concurrent batches per document
    #[serde(default = "default_concurrency")]
    pub batch_concurrency: usize,

    /// Concurrent documents per run
    #[serde(default = "default_concurrency")]
    pub document_concurrency: usize,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            max_items: default_batch_max_items(),
            max_chars: default_batch_max_chars(),
            batch_concurrency: default_concurrency(),
            document_concurrency: default_concurrency(),
        }
    }
}

/// Retry policy applied per provider
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RetryConfig {
    /// Attempts against one provider before moving to the next
    #[serde(default = "default_attempts_per_provider")]
    pub attempts_per_provider: u32,

    /// Base backoff in milliseconds, doubled on each retry
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound for a single backoff sleep
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts_per_provider: default_attempts_per_provider(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

/// Checkpoint persistence settings
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct CheckpointConfig {
    /// SQLite file, defaults to the user data directory
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Matching filter for the `log` facade
    pub fn as_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_concurrency() -> usize {
    3
}

fn default_batch_max_items() -> usize {
    40
}

fn default_batch_max_chars() -> usize {
    8000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_attempts_per_provider() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000 // 1 second base backoff time, doubled on each retry
}

fn default_backoff_max_ms() -> u64 {
    8000
}

fn default_temperature() -> f32 {
    0.1
}

fn default_true() -> bool {
    true
}

fn default_fallback_order() -> Vec<TranslationProvider> {
    vec![
        TranslationProvider::Zhipu,
        TranslationProvider::Minimax,
        TranslationProvider::Kimi,
    ]
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash-lite".to_string()
}

pub fn default_system_prompt() -> String {
    [
        "You are a professional e-book translation assistant.",
        "Task: translate the input text accurately into {targetLanguage}.",
        "Requirements:",
        "1) Keep paragraph and line-break structure; add no explanations.",
        "2) Keep proper nouns consistent; transliterate when necessary.",
        "3) Do not alter HTML/XHTML tag structure; translate text content only.",
        "4) Leave code, formulas, links and table-of-contents numbering unchanged.",
    ]
    .join("\n")
}

static PROMPT_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*targetLanguage\s*\}\}|\{targetLanguage\}").expect("valid placeholder pattern")
});

/// Substitute the target language into a system prompt template
pub fn render_system_prompt(template: &str, target_language: &str) -> String {
    PROMPT_PLACEHOLDER
        .replace_all(template, regex::NoExpand(target_language))
        .into_owned()
}

/// Trim a model name, drop a `models/` prefix, and fall back to `default` when empty
pub fn normalize_model_name(model: &str, default: &str) -> String {
    let trimmed = model.trim();
    let stripped = trimmed.strip_prefix("models/").unwrap_or(trimmed).trim();
    if stripped.is_empty() {
        default.to_string()
    } else {
        stripped.to_string()
    }
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<(), TranslationError> {
        if self.target_language.trim().is_empty() {
            return Err(TranslationError::Configuration("Target language is required".to_string()));
        }

        if self.system_prompt.trim().is_empty() {
            return Err(TranslationError::Configuration("System prompt template is required".to_string()));
        }

        if self.translation.get_api_key().is_empty() {
            return Err(TranslationError::Configuration(format!(
                "API key is required for {} provider",
                self.translation.provider.display_name()
            )));
        }

        let batching = &self.batching;
        if batching.max_items == 0
            || batching.max_chars == 0
            || batching.batch_concurrency == 0
            || batching.document_concurrency == 0
        {
            return Err(TranslationError::Configuration(
                "Batch limits and concurrency widths must be greater than zero".to_string(),
            ));
        }

        if self.translation.request_timeout_secs == 0 {
            return Err(TranslationError::Configuration(
                "Request timeout must be at least one second".to_string(),
            ));
        }

        if self.retry.attempts_per_provider == 0 {
            return Err(TranslationError::Configuration(
                "At least one attempt per provider is required".to_string(),
            ));
        }

        Ok(())
    }

    /// The model name that takes part in the task identity
    pub fn identity_model(&self) -> String {
        self.translation.get_model()
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            target_language: "English".to_string(),
            system_prompt: default_system_prompt(),
            translation: TranslationConfig::default(),
            batching: BatchingConfig::default(),
            retry: RetryConfig::default(),
            checkpoint: CheckpointConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl TranslationConfig {
    /// Get the active provider configuration from the available_providers array
    pub fn get_active_provider_config(&self) -> Option<&ProviderConfig> {
        self.get_provider_config(&self.provider)
    }

    /// Get a specific provider configuration by type
    pub fn get_provider_config(&self, provider_type: &TranslationProvider) -> Option<&ProviderConfig> {
        let provider_str = provider_type.to_lowercase_string();
        self.available_providers.iter()
            .find(|p| p.provider_type == provider_str)
    }

    /// Mutable access to a provider entry, inserting a default one when missing
    pub fn provider_config_mut(&mut self, provider_type: TranslationProvider) -> &mut ProviderConfig {
        let provider_str = provider_type.to_lowercase_string();
        let position = self.available_providers.iter()
            .position(|p| p.provider_type == provider_str);

        match position {
            Some(index) => &mut self.available_providers[index],
            None => {
                self.available_providers.push(ProviderConfig::new(provider_type));
                let last = self.available_providers.len() - 1;
                &mut self.available_providers[last]
            }
        }
    }

    /// Get the normalized model for the active provider
    pub fn get_model(&self) -> String {
        self.model_for(&self.provider)
    }

    /// Get the API key for the active provider
    pub fn get_api_key(&self) -> String {
        self.get_active_provider_config()
            .map(|p| p.api_key.trim().to_string())
            .unwrap_or_default()
    }

    fn model_for(&self, provider: &TranslationProvider) -> String {
        let configured = self.get_provider_config(provider)
            .map(|p| p.model.as_str())
            .unwrap_or_default();
        normalize_model_name(configured, &provider.default_model())
    }

    fn endpoint_for(&self, provider: &TranslationProvider) -> String {
        self.get_provider_config(provider)
            .map(|p| p.endpoint.trim())
            .filter(|e| !e.is_empty())
            .map(|e| e.trim_end_matches('/').to_string())
            .unwrap_or_else(|| provider.default_endpoint())
    }

    fn settings_for(&self, provider: TranslationProvider) -> Option<ProviderSettings> {
        let api_key = self.get_provider_config(&provider)
            .map(|p| p.api_key.trim().to_string())
            .filter(|k| !k.is_empty())?;

        Some(ProviderSettings {
            provider,
            endpoint: self.endpoint_for(&provider),
            api_key,
            model: self.model_for(&provider),
            timeout: Duration::from_secs(self.request_timeout_secs),
            temperature: self.temperature,
        })
    }

    /// Resolved settings for the primary provider
    pub fn primary_settings(&self) -> Result<ProviderSettings, TranslationError> {
        self.settings_for(self.provider).ok_or_else(|| {
            TranslationError::Configuration(format!(
                "API key is required for {} provider",
                self.provider.display_name()
            ))
        })
    }

    /// Resolved fallback providers in priority order
    ///
    /// Only providers carrying a credential are returned, and the primary
    /// provider is never repeated as its own fallback.
    pub fn fallback_settings(&self) -> Vec<ProviderSettings> {
        if !self.enable_fallback {
            return Vec::new();
        }

        let mut seen = Vec::new();
        self.fallback_order
            .iter()
            .filter(|p| **p != self.provider)
            .filter(|p| {
                if seen.contains(*p) {
                    false
                } else {
                    seen.push(**p);
                    true
                }
            })
            .filter_map(|p| self.settings_for(*p))
            .collect()
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            available_providers: vec![
                ProviderConfig::new(TranslationProvider::Gemini),
                ProviderConfig::new(TranslationProvider::Zhipu),
                ProviderConfig::new(TranslationProvider::Minimax),
                ProviderConfig::new(TranslationProvider::Kimi),
                ProviderConfig::new(TranslationProvider::OpenAI),
            ],
            enable_fallback: true,
            fallback_order: default_fallback_order(),
            request_timeout_secs: default_request_timeout_secs(),
            temperature: default_temperature(),
        }
    }
}
