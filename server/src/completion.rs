use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::CompletionConfig;

#[derive(Debug)]
pub enum CompletionError {
    NotConfigured,
    Http(reqwest::Error),
    Upstream(u16, String),
}

impl std::fmt::Display for CompletionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompletionError::NotConfigured => write!(f, "Completion service is not configured"),
            CompletionError::Http(e) => write!(f, "Completion request failed: {e}"),
            CompletionError::Upstream(status, body) => {
                write!(f, "Completion service returned {status}: {body}")
            }
        }
    }
}

impl std::error::Error for CompletionError {}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ReplyMessage>,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Clone)]
pub struct CompletionClient {
    http: reqwest::Client,
    config: CompletionConfig,
}

impl CompletionClient {
    pub fn new(config: CompletionConfig) -> Result<Self, CompletionError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(CompletionError::Http)?;
        Ok(Self { http, config })
    }

    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// Send one user message and return the first choice's text ("" if absent).
    pub async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(CompletionError::NotConfigured)?;

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let body = ChatRequest {
            model: &self.config.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let res = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(CompletionError::Http)?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(CompletionError::Upstream(status.as_u16(), text));
        }

        let parsed: ChatResponse = res.json().await.map_err(CompletionError::Http)?;
        Ok(first_choice_text(parsed))
    }
}

fn first_choice_text(res: ChatResponse) -> String {
    res.choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .unwrap_or_default()
}
