pub mod comment;
pub mod notification;
pub mod task;
pub mod team;
pub mod user;

pub use comment::Comment;
pub use notification::Notification;
pub use task::{Priority, SubTask, Task, TaskStatus};
pub use team::{Team, TeamJoinRequest};
pub use user::{EmailConfirmation, PasswordReset, Position, PublicUser, User};

use uuid::Uuid;

/// Serde adapter for stored timestamps: RFC 3339 with a fixed six-digit
/// fraction, so string comparison in the database matches time order.
pub mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn to_sortable(at: &DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&to_sortable(at))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        DateTime::<Utc>::deserialize(deserializer)
    }
}

/// Fresh document id, stored as the `_id` string.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Set-style insert for id lists. Returns false if the id was already present.
pub fn insert_unique(ids: &mut Vec<String>, id: &str) -> bool {
    if ids.iter().any(|existing| existing == id) {
        return false;
    }
    ids.push(id.to_string());
    true
}

/// Removes every occurrence of `id`. Returns true if anything was removed.
pub fn remove_id(ids: &mut Vec<String>, id: &str) -> bool {
    let before = ids.len();
    ids.retain(|existing| existing != id);
    ids.len() != before
}
