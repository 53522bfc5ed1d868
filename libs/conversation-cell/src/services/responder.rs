use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
};
use serde_json::json;
use tracing::{debug, error};

use shared_config::AppConfig;

/// The generative responder, treated as a black box over the conversation
/// context. Callers wrap invocations in a bounded timeout.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, context: &str, phone: &str) -> Result<String>;
}

const SYSTEM_PROMPT: &str = "You are the scheduling assistant of a medical clinic. \
You answer patient messages over chat: warm, brief, and concrete. \
You never invent appointment times; when real availability is supplied in the \
context you offer only those times.";

/// Chat-completions style responder client.
pub struct OpenAiResponder {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiResponder {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.responder_base_url.clone(),
            api_key: config.responder_api_key.clone(),
            model: config.responder_model.clone(),
        }
    }

    fn get_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.api_key)) {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }
}

#[async_trait]
impl Responder for OpenAiResponder {
    async fn respond(&self, context: &str, phone: &str) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(anyhow!("Responder not configured"));
        }

        debug!("Requesting draft reply for {}", phone);

        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": context },
            ],
        });

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .headers(self.get_headers())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Responder API error ({}) for {}: {}", status, phone, error_text);
            return Err(anyhow!("Responder API error ({}): {}", status, error_text));
        }

        let result: serde_json::Value = response.json().await?;
        let text = result["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("Responder returned no content"))?
            .trim()
            .to_string();

        if text.is_empty() {
            return Err(anyhow!("Responder returned empty content"));
        }
        Ok(text)
    }
}
