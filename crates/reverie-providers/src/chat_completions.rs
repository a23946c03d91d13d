//! OpenAI-compatible chat completions client.
//!
//! One request per call. No retry.

use async_trait::async_trait;
use reverie_core::{
    config::ModelConfig,
    error::ReverieError,
    message::ModelMessage,
    traits::ModelClient,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

pub struct ChatCompletionsClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl ChatCompletionsClient {
    pub fn new(api_url: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
            model,
        }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        if config.api_key.is_empty() {
            warn!("model: no API key configured");
        }
        Self::new(
            config.api_url.clone(),
            config.api_key.clone(),
            config.model.clone(),
        )
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ModelMessage],
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Option<Vec<Choice>>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    total_tokens: Option<u64>,
}

fn reply_text(parsed: CompletionResponse) -> Option<String> {
    parsed
        .choices?
        .into_iter()
        .next()?
        .message?
        .content
        .filter(|c| !c.trim().is_empty())
}

#[async_trait]
impl ModelClient for ChatCompletionsClient {
    fn name(&self) -> &str {
        "chat-completions"
    }

    async fn complete(&self, messages: &[ModelMessage]) -> Result<String, ReverieError> {
        let start = Instant::now();
        let body = CompletionRequest {
            model: &self.model,
            messages,
        };
        debug!("model: POST {} model={}", self.api_url, self.model);

        let resp = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ReverieError::Provider(format!("model request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ReverieError::Provider(format!(
                "model endpoint returned {status}: {text}"
            )));
        }

        let parsed: CompletionResponse = resp
            .json()
            .await
            .map_err(|e| ReverieError::Provider(format!("failed to parse model response: {e}")))?;

        let tokens = parsed.usage.as_ref().and_then(|u| u.total_tokens);
        debug!(
            "model: replied in {}ms, {} tokens",
            start.elapsed().as_millis(),
            tokens.map_or_else(|| "?".to_string(), |t| t.to_string())
        );

        reply_text(parsed).ok_or_else(|| ReverieError::Provider("model returned no content".into()))
    }
}
