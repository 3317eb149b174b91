use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::app_config::ProviderConfig;
use crate::errors::ProviderError;
use crate::language_utils::get_language_name;

use super::{MtProvider, MtRequest, MtResponse};

/// Ollama client used as a machine translation provider
#[derive(Debug, Clone)]
pub struct Ollama {
    /// Base URL of the Ollama API
    base_url: String,
    /// Model used for generation
    model: String,
    /// HTTP client for making requests
    client: Client,
    /// Generation temperature
    temperature: f32,
    /// Confidence reported for successful generations
    default_confidence: f64,
    /// Per-request timeout in seconds
    timeout_secs: u64,
    /// Maximum number of retry attempts
    max_retries: u32,
    /// Base backoff time in milliseconds for exponential backoff
    backoff_base_ms: u64,
}

/// Generate request for the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model name to use for generation
    model: String,
    /// Prompt to generate from
    prompt: String,
    /// System message to guide the model
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    /// Additional model parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerationOptions>,
    /// Whether to stream the response
    stream: bool,
}

/// Generation options for the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Generation response from the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub model: String,
    /// Generated text
    pub response: String,
    pub done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eval_count: Option<u64>,
}

impl Ollama {
    /// Create a client from the provider configuration
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs.max(1)))
                .pool_idle_timeout(Duration::from_secs(90))
                .build()
                .unwrap_or_default(),
            temperature: config.temperature,
            default_confidence: config.default_confidence,
            timeout_secs: config.timeout_secs.max(1),
            max_retries: 2,
            backoff_base_ms: 500,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// System message describing the task
    fn system_prompt(request: &MtRequest) -> String {
        let source = get_language_name(&request.source_language).unwrap_or_else(|_| request.source_language.clone());
        let target = get_language_name(&request.target_language).unwrap_or_else(|_| request.target_language.clone());

        let mut system = format!(
            "You are a professional translator for educational content. Translate from {} to {}. \
             Answer with the translation only, without quotes or explanations.",
            source, target
        );
        if let Some(domain) = &request.domain {
            system.push_str(&format!(" The subject domain is {}.", domain));
        }
        system
    }

    /// User prompt: prior translations first, then the text
    fn user_prompt(request: &MtRequest) -> String {
        let mut prompt = String::new();
        if !request.context.is_empty() {
            prompt.push_str("Similar sentences were translated before:\n");
            for hint in &request.context {
                prompt.push_str(&format!("- {} => {}\n", hint.source_text, hint.target_text));
            }
            prompt.push('\n');
        }
        prompt.push_str("Text:\n");
        prompt.push_str(&request.source_text);
        prompt
    }

    fn build_request(&self, request: &MtRequest) -> GenerationRequest {
        GenerationRequest {
            model: self.model.clone(),
            prompt: Self::user_prompt(request),
            system: Some(Self::system_prompt(request)),
            options: Some(GenerationOptions {
                temperature: Some(self.temperature),
            }),
            stream: false,
        }
    }

    /// Generate text from the Ollama API with retry logic
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);

        let mut attempt = 0;
        let mut last_error = None;

        while attempt <= self.max_retries {
            match self.client.post(&url).json(request).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let text = response
                            .text()
                            .await
                            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
                        return serde_json::from_str::<GenerationResponse>(&text).map_err(|e| {
                            error!("Failed to parse Ollama API response: {}", e);
                            ProviderError::ParseError(e.to_string())
                        });
                    }

                    let message = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Failed to get error response text".to_string());
                    let api_error = ProviderError::ApiError {
                        status_code: status.as_u16(),
                        message,
                    };
                    if !status.is_server_error() {
                        // Client error - don't retry
                        error!("Ollama API error: {}", api_error);
                        return Err(api_error);
                    }
                    error!(
                        "Ollama API error: {} - attempt {}/{}",
                        api_error,
                        attempt + 1,
                        self.max_retries + 1
                    );
                    last_error = Some(api_error);
                }
                Err(e) if e.is_timeout() => {
                    return Err(ProviderError::Timeout(self.timeout_secs));
                }
                Err(e) => {
                    error!(
                        "Ollama API network error: {} - attempt {}/{}",
                        e,
                        attempt + 1,
                        self.max_retries + 1
                    );
                    last_error = Some(ProviderError::ConnectionError(e.to_string()));
                }
            }

            attempt += 1;

            if attempt <= self.max_retries {
                let backoff_ms = self.backoff_base_ms * (1u64 << (attempt - 1));
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ProviderError::RequestFailed(format!(
                "Ollama API request failed after {} attempts",
                self.max_retries + 1
            ))
        }))
    }
}

#[async_trait]
impl MtProvider for Ollama {
    async fn translate(&self, request: MtRequest) -> Result<MtResponse, ProviderError> {
        let generation = self.build_request(&request);
        let response = self.generate(&generation).await?;

        let text = clean_output(&response.response);
        if text.is_empty() {
            return Err(ProviderError::ParseError("Ollama returned an empty translation".to_string()));
        }

        let mut issues = Vec::new();
        if text.eq_ignore_ascii_case(request.source_text.trim()) {
            issues.push("output is identical to the source text".to_string());
        }
        if !response.done {
            issues.push("generation did not finish".to_string());
        }

        debug!("Ollama translated {} chars with {}", request.source_text.len(), response.model);

        Ok(MtResponse {
            text,
            confidence: self.default_confidence,
            alternatives: Vec::new(),
            issues,
        })
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Strip wrapping quotes and whitespace that models like to add
fn clean_output(raw: &str) -> String {
    let trimmed = raw.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed);
    unquoted.trim().to_string()
}
