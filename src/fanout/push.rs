use std::sync::OnceLock;

use async_trait::async_trait;
use log::warn;
use regex::Regex;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::error::{AppError, AppResult};

/// One entry of a batched push request; one per device token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushMessage {
    pub to: String,
    pub sound: String,
    pub title: String,
    pub subtitle: String,
    pub body: String,
    pub data: PushData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushData {
    pub title: String,
    pub sub_title: String,
    pub message: String,
}

impl PushMessage {
    pub fn new(token: &str, title: &str, subtitle: &str, body: &str) -> Self {
        Self {
            to: token.to_string(),
            sound: "default".to_string(),
            title: title.to_string(),
            subtitle: subtitle.to_string(),
            body: body.to_string(),
            data: PushData {
                title: title.to_string(),
                sub_title: subtitle.to_string(),
                message: body.to_string(),
            },
        }
    }
}

/// Push delivery channel. Implementations send the whole batch in one call.
#[async_trait]
pub trait PushChannel: Send + Sync {
    async fn send(&self, messages: &[PushMessage]) -> AppResult<Value>;
}

/// `ExponentPushToken[...]` or `ExpoPushToken[...]`.
pub fn is_valid_push_token(token: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"^Expo(nent)?PushToken\[[^\[\]\s]+\]$").expect("static regex compiles")
        })
        .is_match(token)
}

/// Expo push API client.
pub struct ExpoPushClient {
    client: Client,
    url: String,
}

impl ExpoPushClient {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl PushChannel for ExpoPushClient {
    async fn send(&self, messages: &[PushMessage]) -> AppResult<Value> {
        let response = self
            .client
            .post(&self.url)
            .header("Accept", "application/json")
            .json(messages)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(AppError::ChannelFailure(format!(
                "push service returned {}: {}",
                status, body
            )));
        }

        let payload: Value = serde_json::from_str(&body).map_err(|e| {
            AppError::ChannelFailure(format!("unreadable push response: {}, body: {}", e, body))
        })?;

        // Request-level rejection, e.g. a malformed batch.
        if let Some(errors) = payload.get("errors") {
            return Err(AppError::ChannelFailure(format!(
                "push service rejected batch: {}",
                errors
            )));
        }

        // Per-token tickets: report and carry on.
        if let Some(tickets) = payload.get("data").and_then(Value::as_array) {
            for (ticket, message) in tickets.iter().zip(messages) {
                if ticket.get("status").and_then(Value::as_str) == Some("error") {
                    warn!(
                        "Push to {} rejected: {}",
                        message.to,
                        ticket.get("message").and_then(Value::as_str).unwrap_or("unknown")
                    );
                }
            }
        }

        Ok(payload)
    }
}
