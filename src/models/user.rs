use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Position {
    Manager,
    Supervisor,
    #[default]
    Employee,
}

impl Position {
    pub fn oversees_teams(self) -> bool {
        matches!(self, Position::Manager | Position::Supervisor)
    }
}

/// A user as stored in the `users` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_name: String,
    pub email: String,
    #[serde(default)]
    pub email_confirmed: bool,
    pub full_name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub profile_picture: String,
    /// Color applied to this user's comments, if they picked one.
    #[serde(default)]
    pub profile_color: Option<String>,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub dob: Option<DateTime<Utc>>,
    /// bcrypt hash.
    pub password: String,
    #[serde(default)]
    pub member_of_teams: Vec<String>,
    #[serde(default)]
    pub manager_of_teams: Vec<String>,
    #[serde(default)]
    pub supervisor_of_teams: Vec<String>,
    #[serde(default)]
    pub push_tokens: Vec<String>,
    #[serde(default)]
    pub tasks: Vec<String>,
    #[serde(with = "crate::models::timestamp")]
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Teams this user manages or supervises.
    pub fn overseen_teams(&self) -> Vec<String> {
        let mut teams = self.manager_of_teams.clone();
        for team in &self.supervisor_of_teams {
            super::insert_unique(&mut teams, team);
        }
        teams
    }
}

/// What we expose to clients: everything but the password hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_name: String,
    pub email: String,
    pub email_confirmed: bool,
    pub full_name: String,
    pub title: String,
    pub profile_picture: String,
    pub profile_color: Option<String>,
    pub position: Position,
    pub dob: Option<DateTime<Utc>>,
    pub member_of_teams: Vec<String>,
    pub manager_of_teams: Vec<String>,
    pub supervisor_of_teams: Vec<String>,
    pub tasks: Vec<String>,
    #[serde(with = "crate::models::timestamp")]
    pub created_at: DateTime<Utc>,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            user_name: u.user_name,
            email: u.email,
            email_confirmed: u.email_confirmed,
            full_name: u.full_name,
            title: u.title,
            profile_picture: u.profile_picture,
            profile_color: u.profile_color,
            position: u.position,
            dob: u.dob,
            member_of_teams: u.member_of_teams,
            manager_of_teams: u.manager_of_teams,
            supervisor_of_teams: u.supervisor_of_teams,
            tasks: u.tasks,
            created_at: u.created_at,
        }
    }
}

/// A pending password reset code. Valid for [`PasswordReset::TTL_MINUTES`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordReset {
    #[serde(rename = "_id")]
    pub id: String,
    pub user: String,
    pub code: String,
    #[serde(with = "crate::models::timestamp")]
    pub created_at: DateTime<Utc>,
}

impl PasswordReset {
    pub const TTL_MINUTES: i64 = 5;

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at > chrono::Duration::minutes(Self::TTL_MINUTES)
    }
}

/// A pending email confirmation code. Same lifetime as a reset code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailConfirmation {
    #[serde(rename = "_id")]
    pub id: String,
    pub user: String,
    pub code: String,
    #[serde(with = "crate::models::timestamp")]
    pub created_at: DateTime<Utc>,
}

impl EmailConfirmation {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at > chrono::Duration::minutes(PasswordReset::TTL_MINUTES)
    }
}
