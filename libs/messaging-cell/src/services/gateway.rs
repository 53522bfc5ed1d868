use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
};
use serde_json::json;
use tracing::{debug, error};

use shared_config::AppConfig;

#[derive(Debug, Clone, Default)]
pub struct SendReceipt {
    pub message_id: Option<String>,
}

/// Outbound text channel to the patient.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    async fn send_text(&self, phone: &str, message: &str) -> Result<SendReceipt>;
}

/// WhatsApp Cloud API style gateway.
pub struct WhatsAppClient {
    client: Client,
    base_url: String,
    api_token: String,
    phone_id: String,
}

impl WhatsAppClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.messaging_base_url.clone(),
            api_token: config.messaging_api_token.clone(),
            phone_id: config.messaging_phone_id.clone(),
        }
    }

    fn get_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.api_token)) {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }
}

#[async_trait]
impl MessagingGateway for WhatsAppClient {
    async fn send_text(&self, phone: &str, message: &str) -> Result<SendReceipt> {
        if self.api_token.is_empty() || self.phone_id.is_empty() {
            return Err(anyhow!("Messaging gateway not configured"));
        }

        let url = format!("{}/{}/messages", self.base_url, self.phone_id);
        debug!("Sending text to {}", phone);

        let body = json!({
            "messaging_product": "whatsapp",
            "to": phone,
            "type": "text",
            "text": { "body": message },
        });

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
            error!("Messaging API error ({}) for {}: {}", status, phone, error_text);
            return Err(anyhow!("Messaging API error ({}): {}", status, error_text));
        }

        let result: serde_json::Value = response.json().await?;
        let message_id = result["messages"][0]["id"].as_str().map(|s| s.to_string());

        Ok(SendReceipt { message_id })
    }
}
