use async_trait::async_trait;
use log::{info, warn};
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::BrevoConfig;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateEmail {
    pub to: String,
    pub name: Option<String>,
    pub template_id: i64,
    pub params: Value,
}

/// Transactional email channel.
#[async_trait]
pub trait EmailChannel: Send + Sync {
    async fn send_template(&self, email: &TemplateEmail) -> AppResult<Value>;
}

/// Brevo transactional email API (`POST /v3/smtp/email`).
pub struct BrevoMailer {
    client: Client,
    config: BrevoConfig,
}

impl BrevoMailer {
    pub fn new(client: Client, config: BrevoConfig) -> Self {
        Self { client, config }
    }

    fn payload(&self, email: &TemplateEmail) -> Value {
        let mut recipient = json!({ "email": email.to });
        if let Some(name) = &email.name {
            recipient["name"] = json!(name);
        }
        json!({
            "to": [recipient],
            "templateId": email.template_id,
            "params": email.params,
            "sender": {
                "email": self.config.sender_email,
                "name": self.config.sender_name,
            },
        })
    }
}

#[async_trait]
impl EmailChannel for BrevoMailer {
    async fn send_template(&self, email: &TemplateEmail) -> AppResult<Value> {
        if email.to.trim().is_empty() {
            return Err(AppError::invalid("Email recipient is required"));
        }

        let response = self
            .client
            .post(&self.config.api_url)
            .header("api-key", &self.config.api_key)
            .header("Accept", "application/json")
            .json(&self.payload(email))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(AppError::ChannelFailure(format!(
                "email service returned {}: {}",
                status, body
            )));
        }

        let result: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
        info!(
            "Template email {} sent, messageId {}",
            email.template_id,
            result.get("messageId").and_then(Value::as_str).unwrap_or("-")
        );
        Ok(result)
    }
}

/// Used when no email provider is configured.
pub struct DisabledMailer;

#[async_trait]
impl EmailChannel for DisabledMailer {
    async fn send_template(&self, email: &TemplateEmail) -> AppResult<Value> {
        warn!(
            "Email sending is disabled; template {} to {} dropped",
            email.template_id, email.to
        );
        Err(AppError::ChannelFailure("email sending is not configured".to_string()))
    }
}
