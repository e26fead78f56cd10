use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, ScrapeError};
use crate::settings::AiSettings;

/// Prompt-in, text-out language model capability.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiCompletion {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompletion {
    pub fn new(settings: &AiSettings, api_key: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(OpenAiCompletion {
            client,
            api_key,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        })
    }

    /// Build a client when AI is enabled and its key is present; `None` means heuristics only.
    pub fn from_settings(settings: &AiSettings, timeout: Duration) -> Result<Option<Self>> {
        if !settings.enabled {
            info!("AI-assisted extraction disabled");
            return Ok(None);
        }
        match settings.api_key() {
            Some(key) => Ok(Some(Self::new(settings, key, timeout)?)),
            None => {
                info!(
                    "{} not set, AI-assisted extraction disabled",
                    settings.api_key_env
                );
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl TextCompletion for OpenAiCompletion {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let start = Instant::now();
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ScrapeError::Completion(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Completion API returned {}: {}", status, body);
            return Err(ScrapeError::Completion(format!("HTTP {}", status)));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ScrapeError::Completion(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ScrapeError::Completion("empty completion".into()))?;

        debug!(
            "Completion from {} in {}ms",
            self.model,
            start.elapsed().as_millis()
        );
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_settings_build_nothing() {
        let settings = AiSettings {
            enabled: false,
            ..AiSettings::default()
        };
        let client = OpenAiCompletion::from_settings(&settings, Duration::from_secs(1)).unwrap();
        assert!(client.is_none());
    }

    #[test]
    fn missing_key_builds_nothing() {
        let settings = AiSettings {
            api_key_env: "PROFILE_SCOUT_TEST_UNSET_KEY".into(),
            ..AiSettings::default()
        };
        let client = OpenAiCompletion::from_settings(&settings, Duration::from_secs(1)).unwrap();
        assert!(client.is_none());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_completion_error() {
        let settings = AiSettings {
            base_url: "http://127.0.0.1:9/v1/".into(),
            ..AiSettings::default()
        };
        let client =
            OpenAiCompletion::new(&settings, "sk-test".into(), Duration::from_millis(200)).unwrap();
        assert!(matches!(
            client.complete("hello").await,
            Err(ScrapeError::Completion(_))
        ));
    }
}
