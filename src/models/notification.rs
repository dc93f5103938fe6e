use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// In-app notification. Always addressed to exactly one recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(rename = "_id")]
    pub id: String,
    pub to: String,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub is_read: bool,
    pub title: String,
    pub subject: String,
    pub message: String,
    #[serde(with = "crate::models::timestamp")]
    pub created_at: DateTime<Utc>,
}
