use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Represents a team in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    #[serde(rename = "_id")]
    pub id: String,
    pub team_name: String,
    /// Lowercased, trimmed name used for the case-insensitive uniqueness check.
    pub team_name_key: String,
    pub team_code: String,
    #[serde(default)]
    pub team_logo: String,
    #[serde(default)]
    pub team_slogan: String,
    pub supervised_by: String,
    #[serde(default)]
    pub managed_by: Vec<String>,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(with = "crate::models::timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Team {
    pub fn name_key(name: &str) -> String {
        name.trim().to_lowercase()
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m == user_id)
    }

    /// Supervisor or manager: may resolve join requests.
    pub fn is_moderated_by(&self, user_id: &str) -> bool {
        self.supervised_by == user_id || self.managed_by.iter().any(|m| m == user_id)
    }

    /// Supervisor first, then managers in assignment order.
    pub fn leadership(&self) -> impl Iterator<Item = &String> {
        std::iter::once(&self.supervised_by).chain(self.managed_by.iter())
    }
}

/// Pending request by a user to join the team identified by `team_code`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamJoinRequest {
    #[serde(rename = "_id")]
    pub id: String,
    pub user: String,
    pub team_code: String,
    #[serde(default)]
    pub is_approved: bool,
    #[serde(default)]
    pub approved_by: Option<String>,
    #[serde(with = "crate::models::timestamp")]
    pub created_at: DateTime<Utc>,
}
