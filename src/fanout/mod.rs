//! Notification fanout.
//!
//! A notice goes out on two independent paths: one batched push request for
//! every resolved device token, and one persisted [`Notification`] per
//! recipient. A failure on either path is logged and does not affect the other.
//! Delivery is at-most-once: nothing is retried or queued.

pub mod email;
pub mod push;

use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::models::{insert_unique, new_id, Notification};
use crate::store::Store;

pub use email::{BrevoMailer, DisabledMailer, EmailChannel, TemplateEmail};
pub use push::{ExpoPushClient, PushChannel, PushMessage};

#[derive(Debug, Clone, Default)]
pub struct Notice {
    pub sender: Option<String>,
    pub title: String,
    pub subtitle: String,
    pub message: String,
    /// One record is persisted per entry.
    pub recipients: Vec<String>,
    /// Overrides the tokens stored on the recipients.
    pub push_tokens: Option<Vec<String>>,
    /// Fail with `InvalidInput` instead of sending nothing when no token resolves.
    pub require_tokens: bool,
}

impl Notice {
    pub fn new(
        title: impl Into<String>,
        subtitle: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            subtitle: subtitle.into(),
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn from_user(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    pub fn to(mut self, recipients: Vec<String>) -> Self {
        self.recipients = recipients;
        self
    }

    pub fn with_push_tokens(mut self, tokens: Vec<String>) -> Self {
        self.push_tokens = Some(tokens);
        self
    }

    /// For sends whose whole point is the push, such as an explicit device
    /// list: an empty token set fails before any record is written.
    pub fn requiring_tokens(mut self) -> Self {
        self.require_tokens = true;
        self
    }
}

#[derive(Clone)]
pub struct Fanout {
    store: Arc<dyn Store>,
    push: Arc<dyn PushChannel>,
}

impl Fanout {
    pub fn new(store: Arc<dyn Store>, push: Arc<dyn PushChannel>) -> Self {
        Self { store, push }
    }

    /// Dispatches `notice` and returns the push channel's response, if any.
    pub async fn notify(&self, notice: Notice) -> AppResult<Option<Value>> {
        let tokens = match &notice.push_tokens {
            Some(explicit) => dedup(explicit.iter()),
            None => self.resolve_tokens(&notice.recipients).await,
        };

        if tokens.is_empty() && notice.require_tokens {
            return Err(AppError::invalid("No push tokens provided"));
        }

        let push_result = if tokens.is_empty() {
            debug!("No push tokens for \"{}\", skipping push", notice.title);
            None
        } else {
            let messages: Vec<PushMessage> = tokens
                .iter()
                .map(|t| PushMessage::new(t, &notice.title, &notice.subtitle, &notice.message))
                .collect();
            match self.push.send(&messages).await {
                Ok(response) => Some(response),
                Err(err) => {
                    warn!(
                        "Push delivery of \"{}\" to {} device(s) failed: {}",
                        notice.title,
                        messages.len(),
                        err
                    );
                    None
                }
            }
        };

        let mut persisted = 0usize;
        for recipient in &notice.recipients {
            let record = Notification {
                id: new_id(),
                to: recipient.clone(),
                from: notice.sender.clone(),
                is_read: false,
                title: notice.title.clone(),
                subject: notice.subtitle.clone(),
                message: notice.message.clone(),
                created_at: Utc::now(),
            };
            match self.store.insert_notification(&record).await {
                Ok(()) => persisted += 1,
                Err(err) => warn!("Saving notification for user {} failed: {}", recipient, err),
            }
        }
        info!(
            "Notification \"{}\": {} token(s), {}/{} record(s) saved",
            notice.title,
            tokens.len(),
            persisted,
            notice.recipients.len()
        );

        Ok(push_result)
    }

    /// Side-effect form of [`Fanout::notify`]: errors are logged, never returned.
    pub async fn notify_quietly(&self, notice: Notice) {
        let title = notice.title.clone();
        if let Err(err) = self.notify(notice).await {
            warn!("Notification \"{}\" not sent: {}", title, err);
        }
    }

    async fn resolve_tokens(&self, recipients: &[String]) -> Vec<String> {
        if recipients.is_empty() {
            return Vec::new();
        }
        match self.store.find_users(recipients).await {
            Ok(users) => {
                // Keep recipient order, not store order.
                let mut tokens = Vec::new();
                for id in recipients {
                    if let Some(user) = users.iter().find(|u| &u.id == id) {
                        for token in &user.push_tokens {
                            insert_unique(&mut tokens, token);
                        }
                    }
                }
                tokens
            }
            Err(err) => {
                warn!("Resolving push tokens failed, sending no push: {}", err);
                Vec::new()
            }
        }
    }
}

fn dedup<'a>(tokens: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut out = Vec::new();
    for token in tokens {
        if !token.trim().is_empty() {
            insert_unique(&mut out, token);
        }
    }
    out
}
