//! Text-in/text-out access to the external classification oracle.
//!
//! The advisor only depends on [`Oracle`]; [`ChatCompletionsOracle`] is
//! the production implementation against an OpenAI-compatible
//! `/chat/completions` endpoint.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument};

/// One prompt plus the sampling knobs for it
#[derive(Debug, Clone, PartialEq)]
pub struct OracleRequest
{
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Errors from the oracle transport.
#[derive(Debug, thiserror::Error)]
pub enum OracleError
{
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("oracle request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The endpoint answered with a non-2xx status.
    #[error("oracle returned {status}: {body}")]
    Status
    {
        status: u16,
        body: String,
    },

    /// A 2xx answer without any usable text.
    #[error("oracle returned an empty response")]
    Empty,

    /// No API key configured.
    #[error("no oracle API key configured (set oracle.api_key or BUGLINK__ORACLE__API_KEY)")]
    MissingApiKey,
}

/// Anything that turns a prompt into a completion.
pub trait Oracle
{
    fn complete(
        &self,
        request: &OracleRequest,
    ) -> Result<String, OracleError>;
}

/// Connection settings for [`ChatCompletionsOracle`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig
{
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub keyword_temperature: f32,
    pub keyword_max_tokens: u32,
    pub classify_temperature: f32,
    pub classify_max_tokens: u32,
}

impl Default for OracleConfig
{
    fn default() -> Self
    {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-3.5-turbo".to_string(),
            timeout_secs: 60,
            keyword_temperature: 0.3,
            keyword_max_tokens: 150,
            classify_temperature: 0.1,
            classify_max_tokens: 250,
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse
{
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice
{
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage
{
    #[serde(default)]
    content: Option<String>,
}

/// Blocking client for an OpenAI-compatible chat-completions API.
pub struct ChatCompletionsOracle
{
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl ChatCompletionsOracle
{
    /// Build a client; fails fast when no API key is configured.
    pub fn new(config: &OracleConfig) -> Result<Self, OracleError>
    {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| {
                !k.trim()
                    .is_empty()
            })
            .ok_or(OracleError::MissingApiKey)?;

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/chat/completions",
                config
                    .api_base
                    .trim_end_matches('/')
            ),
            api_key,
            model: config
                .model
                .clone(),
        })
    }
}

impl Oracle for ChatCompletionsOracle
{
    #[instrument(skip_all, fields(model = %self.model, max_tokens = request.max_tokens))]
    fn complete(
        &self,
        request: &OracleRequest,
    ) -> Result<String, OracleError>
    {
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": request.prompt}],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;

        let status = response.status();
        if !status.is_success()
        {
            let body = response
                .text()
                .unwrap_or_default();
            return Err(OracleError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json()?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| {
                c.message
                    .content
            })
            .map(|s| {
                s.trim()
                    .to_string()
            })
            .filter(|s| !s.is_empty())
            .ok_or(OracleError::Empty)?;

        debug!(chars = text.len(), "oracle answered");
        Ok(text)
    }
}
