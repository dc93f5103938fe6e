//! Persistence seam.
//!
//! Every service takes an `Arc<dyn Store>` so the MongoDB backend can be
//! swapped for an in-memory one in tests. Writes are whole-document
//! replacements unless a method says otherwise; concurrent writers to the
//! same document resolve last-write-wins.

pub mod mongo;

use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{
    Comment, EmailConfirmation, Notification, PasswordReset, SubTask, Task, Team, TeamJoinRequest, User,
};

pub use mongo::MongoStore;

#[async_trait]
pub trait Store: Send + Sync {
    // ─── users ────────────────────────────────────────────────────────────
    async fn insert_user(&self, user: &User) -> AppResult<()>;
    async fn find_user(&self, id: &str) -> AppResult<Option<User>>;
    async fn find_user_by_user_name(&self, user_name: &str) -> AppResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;
    /// Users with the given ids, in no particular order. Unknown ids are skipped.
    async fn find_users(&self, ids: &[String]) -> AppResult<Vec<User>>;
    /// Users whose `memberOfTeams` intersects `team_ids`.
    async fn find_team_members(&self, team_ids: &[String]) -> AppResult<Vec<User>>;
    async fn replace_user(&self, user: &User) -> AppResult<bool>;
    async fn delete_user(&self, id: &str) -> AppResult<bool>;

    // ─── teams ────────────────────────────────────────────────────────────
    async fn insert_team(&self, team: &Team) -> AppResult<()>;
    async fn find_team(&self, id: &str) -> AppResult<Option<Team>>;
    async fn find_team_by_code(&self, code: &str) -> AppResult<Option<Team>>;
    async fn find_team_by_name_key(&self, name_key: &str) -> AppResult<Option<Team>>;
    async fn find_teams(&self, ids: &[String]) -> AppResult<Vec<Team>>;
    async fn replace_team(&self, team: &Team) -> AppResult<bool>;
    async fn delete_team(&self, id: &str) -> AppResult<bool>;

    // ─── join requests ────────────────────────────────────────────────────
    async fn insert_join_request(&self, request: &TeamJoinRequest) -> AppResult<()>;
    async fn find_join_request(&self, id: &str) -> AppResult<Option<TeamJoinRequest>>;
    async fn find_pending_join_request(
        &self,
        user_id: &str,
        team_code: &str,
    ) -> AppResult<Option<TeamJoinRequest>>;
    async fn list_join_requests(&self, team_code: &str) -> AppResult<Vec<TeamJoinRequest>>;
    async fn delete_join_request(&self, id: &str) -> AppResult<bool>;

    // ─── tasks ────────────────────────────────────────────────────────────
    async fn insert_task(&self, task: &Task) -> AppResult<()>;
    async fn find_task(&self, id: &str) -> AppResult<Option<Task>>;
    /// Tasks created by, or with a participant among, `user_ids`.
    async fn find_tasks_involving(&self, user_ids: &[String]) -> AppResult<Vec<Task>>;
    async fn replace_task(&self, task: &Task) -> AppResult<bool>;
    /// Targeted `$set` of the progress field only.
    async fn set_task_progress(&self, id: &str, progress: f64) -> AppResult<bool>;
    async fn delete_task(&self, id: &str) -> AppResult<bool>;

    // ─── subtasks ─────────────────────────────────────────────────────────
    async fn insert_subtask(&self, subtask: &SubTask) -> AppResult<()>;
    async fn find_subtask(&self, id: &str) -> AppResult<Option<SubTask>>;
    async fn find_subtasks_for_task(&self, task_id: &str) -> AppResult<Vec<SubTask>>;
    async fn replace_subtask(&self, subtask: &SubTask) -> AppResult<bool>;
    async fn delete_subtask(&self, id: &str) -> AppResult<bool>;
    async fn delete_subtasks_for_task(&self, task_id: &str) -> AppResult<u64>;

    // ─── comments ─────────────────────────────────────────────────────────
    async fn insert_comment(&self, comment: &Comment) -> AppResult<()>;
    async fn find_comment(&self, id: &str) -> AppResult<Option<Comment>>;
    async fn find_comments_for_task(&self, task_id: &str) -> AppResult<Vec<Comment>>;
    async fn find_comment_by_content(
        &self,
        task_id: &str,
        author_id: &str,
        content: &str,
    ) -> AppResult<Option<Comment>>;
    async fn replace_comment(&self, comment: &Comment) -> AppResult<bool>;
    async fn delete_comment(&self, id: &str) -> AppResult<bool>;
    async fn delete_comments_for_task(&self, task_id: &str) -> AppResult<u64>;

    // ─── notifications ────────────────────────────────────────────────────
    async fn insert_notification(&self, notification: &Notification) -> AppResult<()>;
    async fn find_notification(&self, id: &str) -> AppResult<Option<Notification>>;
    /// Newest first.
    async fn list_notifications_for(&self, user_id: &str) -> AppResult<Vec<Notification>>;
    /// Sets `isRead`; returns false when no such notification exists.
    async fn mark_notification_read(&self, id: &str) -> AppResult<bool>;

    // ─── password resets ──────────────────────────────────────────────────
    async fn insert_password_reset(&self, reset: &PasswordReset) -> AppResult<()>;
    async fn find_password_reset(&self, user_id: &str, code: &str)
        -> AppResult<Option<PasswordReset>>;
    async fn delete_password_resets(&self, user_id: &str) -> AppResult<u64>;

    // ─── email confirmations ──────────────────────────────────────────────
    async fn insert_email_confirmation(&self, confirmation: &EmailConfirmation) -> AppResult<()>;
    async fn find_email_confirmation(
        &self,
        user_id: &str,
        code: &str,
    ) -> AppResult<Option<EmailConfirmation>>;
    async fn delete_email_confirmations(&self, user_id: &str) -> AppResult<u64>;
}
