use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{
    config::{Config, SummaryLength},
    error::Result,
    provider::Provider,
};

static SYSTEM_PROMPT: &str =
    "You are a helpful assistant that creates concise and accurate summaries.";

const KEY_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Produces summary text for a transcript.
///
/// `Ok(None)` means the service declined (bad credential, rate limit, nothing
/// usable in the response). `Err` is reserved for transport level failures.
/// Callers have to cope with both.
#[async_trait]
pub trait Summarizer: Send {
    async fn summarize(&mut self, text: &str, api_key: &str) -> Result<Option<String>>;
}

pub struct ChatSummarizer {
    client: reqwest::Client,
    api_url: String,
    model: String,
    length: SummaryLength,
}

impl ChatSummarizer {
    pub fn new(provider: Provider, length: SummaryLength) -> Result<Self> {
        let config = provider.config();
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            api_url: config.api_url.to_string(),
            model: config.model.to_string(),
            length,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(config.request_timeout)
                .build()?,
            api_url: config.provider.config().api_url.to_string(),
            model: config.summary_model().to_string(),
            length: config.summary_length,
        })
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn build_prompt(&self, text: &str) -> String {
        format!(
            "Please summarize the following text {}. Focus on the key points and main ideas:\n\n{}",
            self.length.instruction(),
            text
        )
    }

    fn request_body(&self, text: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": SYSTEM_PROMPT,
                },
                {
                    "role": "user",
                    "content": self.build_prompt(text),
                },
            ],
            "max_tokens": self.length.max_tokens(),
            "temperature": 0.3,
        })
    }

    fn key_check_body(&self) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": "Test"}],
            "max_tokens": 5,
        })
    }

    /// Send a five-token request to see whether the provider accepts
    /// `api_key`. Any transport error counts as rejected.
    pub async fn check_api_key(&self, api_key: &str) -> bool {
        if api_key.trim().is_empty() {
            return false;
        }

        let response = self
            .client
            .post(&self.api_url)
            .timeout(KEY_CHECK_TIMEOUT)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&self.key_check_body())
            .send()
            .await;

        match response {
            Ok(response) => {
                debug!("API key check returned HTTP {}", response.status());
                response.status().is_success()
            }
            Err(e) => {
                debug!("API key check failed: {}", e);
                false
            }
        }
    }
}

/// Pull `choices[0].message.content` out of a chat completion response.
pub fn extract_content(response: &serde_json::Value) -> Option<String> {
    response["choices"][0]["message"]["content"]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl Summarizer for ChatSummarizer {
    async fn summarize(&mut self, text: &str, api_key: &str) -> Result<Option<String>> {
        if text.trim().is_empty() || api_key.trim().is_empty() {
            return Ok(None);
        }

        debug!("Requesting summary from {} ({})", self.api_url, self.model);
        let response = self
            .client
            .post(&self.api_url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&self.request_body(text))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Summary request rejected with HTTP {}", status);
            return Ok(None);
        }

        let body = match response.json::<serde_json::Value>().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Summary response was not valid JSON: {}", e);
                return Ok(None);
            }
        };

        Ok(extract_content(&body))
    }
}
