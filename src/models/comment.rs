use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: String,
    pub user: String,
    pub for_task: String,
    #[serde(default)]
    pub title: String,
    pub content: String,
    /// Set once at creation, never updated.
    pub background_color: String,
    #[serde(with = "crate::models::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::models::timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// `#RRGGBB` with a random value.
pub fn random_color() -> String {
    let value: u32 = rand::thread_rng().gen_range(0..=0xFF_FFFF);
    format!("#{:06X}", value)
}
