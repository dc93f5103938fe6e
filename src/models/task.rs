use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Forward-only lifecycle: pending → in-progress → completed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn can_advance_to(self, next: TaskStatus) -> bool {
        next >= self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub created_by: String,
    pub feedback: String,
}

/// Appends unless an entry with the same (author, text) pair already exists.
pub fn push_feedback(entries: &mut Vec<Feedback>, author: &str, text: &str) -> bool {
    if entries
        .iter()
        .any(|fb| fb.created_by == author && fb.feedback == text)
    {
        return false;
    }
    entries.push(Feedback {
        created_by: author.to_string(),
        feedback: text.to_string(),
    });
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub tags: Vec<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub created_by: String,
    #[serde(default)]
    pub status: TaskStatus,
    /// Mean of subtask progress while any subtask exists.
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub comments: Vec<String>,
    #[serde(default)]
    pub subtasks: Vec<String>,
    #[serde(default)]
    pub feedback: Vec<Feedback>,
    #[serde(default)]
    pub summary: Vec<String>,
    #[serde(default)]
    pub conclusion: String,
    #[serde(with = "crate::models::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::models::timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p == user_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubTask {
    #[serde(rename = "_id")]
    pub id: String,
    pub main_task: String,
    pub assigned_to: String,
    pub created_by: String,
    pub title: String,
    #[serde(default)]
    pub status: TaskStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub feedback: Vec<Feedback>,
    #[serde(with = "crate::models::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::models::timestamp")]
    pub updated_at: DateTime<Utc>,
}
