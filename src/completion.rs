//! OpenAI-compatible chat-completion provider.
//!
//! Implements the core [`CompletionProvider`] trait against
//! `POST {base_url}/chat/completions`. The base URL and API-key variable
//! are configurable so OpenAI-compatible endpoints work unchanged.
//! Temperature is pinned to 0.
//!
//! Retry policy matches the embedding provider (429/5xx/network → backoff
//! and retry, other 4xx → immediate failure); every terminal failure or
//! malformed body surfaces as
//! [`Error::CompletionUnavailable`](askdocs_core::Error::CompletionUnavailable).

use std::time::Duration;

use anyhow::bail;
use async_trait::async_trait;

use askdocs_core::providers::{CompletionProvider, CompletionRequest};
use askdocs_core::{Error, Result};

use crate::config::CompletionConfig;

pub struct OpenAiCompletions {
    model: String,
    base_url: String,
    max_retries: u32,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompletions {
    /// Build the provider from configuration. Fails when the model is
    /// missing or the configured API-key variable is not set.
    pub fn new(config: &CompletionConfig) -> anyhow::Result<Self> {
        let Some(model) = config.model.clone() else {
            bail!("completion.model required for OpenAI provider");
        };
        let Ok(api_key) = std::env::var(&config.api_key_env) else {
            bail!(
                "{} environment variable not set (see completion.api_key_env)",
                config.api_key_env
            );
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompletions {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(serde_json::json!({
            "role": "system",
            "content": request.system,
        }));
        for turn in &request.history {
            messages.push(serde_json::json!({
                "role": turn.role.as_str(),
                "content": turn.text,
            }));
        }
        messages.push(serde_json::json!({
            "role": "user",
            "content": request.user,
        }));

        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": 0,
        });

        let url = format!("{}/chat/completions", self.base_url);
        let mut last_err: Option<String> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await.map_err(|e| {
                            Error::CompletionUnavailable(format!(
                                "invalid completion response body: {e}"
                            ))
                        })?;
                        return parse_completion_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(format!("completion API error {status}: {body_text}"));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    return Err(Error::CompletionUnavailable(format!(
                        "completion API error {status}: {body_text}"
                    )));
                }
                Err(e) => {
                    last_err = Some(e.to_string());
                    continue;
                }
            }
        }

        Err(Error::CompletionUnavailable(last_err.unwrap_or_else(
            || "completion failed after retries".to_string(),
        )))
    }
}

/// Extract `choices[0].message.content`.
fn parse_completion_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            Error::CompletionUnavailable(
                "malformed completion response: missing choices[0].message.content".to_string(),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_completion_response() {
        let json = serde_json::json!({
            "choices": [
                { "message": { "role": "assistant", "content": "Week 10." } }
            ]
        });
        assert_eq!(parse_completion_response(&json).unwrap(), "Week 10.");
    }

    #[test]
    fn test_parse_rejects_empty_choices() {
        let err = parse_completion_response(&serde_json::json!({ "choices": [] })).unwrap_err();
        assert!(matches!(err, Error::CompletionUnavailable(_)));
    }

    #[test]
    fn test_parse_rejects_missing_content() {
        let json = serde_json::json!({
            "choices": [ { "message": { "role": "assistant" } } ]
        });
        let err = parse_completion_response(&json).unwrap_err();
        assert!(matches!(err, Error::CompletionUnavailable(_)));
    }
}
