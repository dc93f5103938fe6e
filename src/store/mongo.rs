use async_trait::async_trait;
use chrono::Utc;
use futures::stream::TryStreamExt;
use log::info;
use mongodb::bson::{doc, Document};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};
use serde::de::DeserializeOwned;

use super::Store;
use crate::error::AppResult;
use crate::models::{
    timestamp, Comment, EmailConfirmation, Notification, PasswordReset, SubTask, Task, Team,
    TeamJoinRequest, User,
};

const USERS: &str = "users";
const TEAMS: &str = "teams";
const JOIN_REQUESTS: &str = "team_join_requests";
const TASKS: &str = "tasks";
const SUBTASKS: &str = "subtasks";
const COMMENTS: &str = "comments";
const NOTIFICATIONS: &str = "notifications";
const PASSWORD_RESETS: &str = "password_resets";
const EMAIL_CONFIRMATIONS: &str = "email_confirmations";

pub struct MongoStore {
    pub client: Client,
    pub db: Database,
}

impl MongoStore {
    pub async fn init(uri: &str, db_name: &str) -> AppResult<Self> {
        let client_options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(client_options)?;
        let db = client.database(db_name);
        Ok(MongoStore { client, db })
    }

    /// Unique indexes backing the username/email/team name/team code invariants.
    pub async fn ensure_indexes(&self) -> AppResult<()> {
        let unique = |keys: Document| {
            IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().unique(true).build())
                .build()
        };
        let users = self.db.collection::<Document>(USERS);
        users.create_index(unique(doc! { "userName": 1 })).await?;
        users.create_index(unique(doc! { "email": 1 })).await?;

        let teams = self.db.collection::<Document>(TEAMS);
        teams.create_index(unique(doc! { "teamNameKey": 1 })).await?;
        teams.create_index(unique(doc! { "teamCode": 1 })).await?;

        self.db
            .collection::<Document>(SUBTASKS)
            .create_index(IndexModel::builder().keys(doc! { "mainTask": 1 }).build())
            .await?;
        self.db
            .collection::<Document>(NOTIFICATIONS)
            .create_index(IndexModel::builder().keys(doc! { "to": 1 }).build())
            .await?;
        info!("MongoDB indexes ensured");
        Ok(())
    }

    fn users(&self) -> Collection<User> {
        self.db.collection(USERS)
    }

    fn teams(&self) -> Collection<Team> {
        self.db.collection(TEAMS)
    }

    fn join_requests(&self) -> Collection<TeamJoinRequest> {
        self.db.collection(JOIN_REQUESTS)
    }

    fn tasks(&self) -> Collection<Task> {
        self.db.collection(TASKS)
    }

    fn subtasks(&self) -> Collection<SubTask> {
        self.db.collection(SUBTASKS)
    }

    fn comments(&self) -> Collection<Comment> {
        self.db.collection(COMMENTS)
    }

    fn notifications(&self) -> Collection<Notification> {
        self.db.collection(NOTIFICATIONS)
    }

    fn password_resets(&self) -> Collection<PasswordReset> {
        self.db.collection(PASSWORD_RESETS)
    }

    fn email_confirmations(&self) -> Collection<EmailConfirmation> {
        self.db.collection(EMAIL_CONFIRMATIONS)
    }
}

async fn find_all<T>(coll: Collection<T>, filter: Document) -> AppResult<Vec<T>>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    let cursor = coll.find(filter).sort(doc! { "createdAt": 1 }).await?;
    Ok(cursor.try_collect().await?)
}

fn by_id(id: &str) -> Document {
    doc! { "_id": id }
}

#[async_trait]
impl Store for MongoStore {
    async fn insert_user(&self, user: &User) -> AppResult<()> {
        self.users().insert_one(user).await?;
        Ok(())
    }

    async fn find_user(&self, id: &str) -> AppResult<Option<User>> {
        Ok(self.users().find_one(by_id(id)).await?)
    }

    async fn find_user_by_user_name(&self, user_name: &str) -> AppResult<Option<User>> {
        Ok(self.users().find_one(doc! { "userName": user_name }).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self.users().find_one(doc! { "email": email }).await?)
    }

    async fn find_users(&self, ids: &[String]) -> AppResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        find_all(self.users(), doc! { "_id": { "$in": ids } }).await
    }

    async fn find_team_members(&self, team_ids: &[String]) -> AppResult<Vec<User>> {
        if team_ids.is_empty() {
            return Ok(Vec::new());
        }
        find_all(self.users(), doc! { "memberOfTeams": { "$in": team_ids } }).await
    }

    async fn replace_user(&self, user: &User) -> AppResult<bool> {
        let res = self.users().replace_one(by_id(&user.id), user).await?;
        Ok(res.matched_count == 1)
    }

    async fn delete_user(&self, id: &str) -> AppResult<bool> {
        let res = self.users().delete_one(by_id(id)).await?;
        Ok(res.deleted_count == 1)
    }

    async fn insert_team(&self, team: &Team) -> AppResult<()> {
        self.teams().insert_one(team).await?;
        Ok(())
    }

    async fn find_team(&self, id: &str) -> AppResult<Option<Team>> {
        Ok(self.teams().find_one(by_id(id)).await?)
    }

    async fn find_team_by_code(&self, code: &str) -> AppResult<Option<Team>> {
        Ok(self.teams().find_one(doc! { "teamCode": code }).await?)
    }

    async fn find_team_by_name_key(&self, name_key: &str) -> AppResult<Option<Team>> {
        Ok(self.teams().find_one(doc! { "teamNameKey": name_key }).await?)
    }

    async fn find_teams(&self, ids: &[String]) -> AppResult<Vec<Team>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        find_all(self.teams(), doc! { "_id": { "$in": ids } }).await
    }

    async fn replace_team(&self, team: &Team) -> AppResult<bool> {
        let res = self.teams().replace_one(by_id(&team.id), team).await?;
        Ok(res.matched_count == 1)
    }

    async fn delete_team(&self, id: &str) -> AppResult<bool> {
        let res = self.teams().delete_one(by_id(id)).await?;
        Ok(res.deleted_count == 1)
    }

    async fn insert_join_request(&self, request: &TeamJoinRequest) -> AppResult<()> {
        self.join_requests().insert_one(request).await?;
        Ok(())
    }

    async fn find_join_request(&self, id: &str) -> AppResult<Option<TeamJoinRequest>> {
        Ok(self.join_requests().find_one(by_id(id)).await?)
    }

    async fn find_pending_join_request(
        &self,
        user_id: &str,
        team_code: &str,
    ) -> AppResult<Option<TeamJoinRequest>> {
        Ok(self
            .join_requests()
            .find_one(doc! { "user": user_id, "teamCode": team_code, "isApproved": false })
            .await?)
    }

    async fn list_join_requests(&self, team_code: &str) -> AppResult<Vec<TeamJoinRequest>> {
        find_all(
            self.join_requests(),
            doc! { "teamCode": team_code, "isApproved": false },
        )
        .await
    }

    async fn delete_join_request(&self, id: &str) -> AppResult<bool> {
        let res = self.join_requests().delete_one(by_id(id)).await?;
        Ok(res.deleted_count == 1)
    }

    async fn insert_task(&self, task: &Task) -> AppResult<()> {
        self.tasks().insert_one(task).await?;
        Ok(())
    }

    async fn find_task(&self, id: &str) -> AppResult<Option<Task>> {
        Ok(self.tasks().find_one(by_id(id)).await?)
    }

    async fn find_tasks_involving(&self, user_ids: &[String]) -> AppResult<Vec<Task>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let filter = doc! {
            "$or": [
                { "participants": { "$in": user_ids } },
                { "createdBy": { "$in": user_ids } },
            ]
        };
        find_all(self.tasks(), filter).await
    }

    async fn replace_task(&self, task: &Task) -> AppResult<bool> {
        let res = self.tasks().replace_one(by_id(&task.id), task).await?;
        Ok(res.matched_count == 1)
    }

    async fn set_task_progress(&self, id: &str, progress: f64) -> AppResult<bool> {
        let update = doc! {
            "$set": { "progress": progress, "updatedAt": timestamp::to_sortable(&Utc::now()) }
        };
        let res = self.tasks().update_one(by_id(id), update).await?;
        Ok(res.matched_count == 1)
    }

    async fn delete_task(&self, id: &str) -> AppResult<bool> {
        let res = self.tasks().delete_one(by_id(id)).await?;
        Ok(res.deleted_count == 1)
    }

    async fn insert_subtask(&self, subtask: &SubTask) -> AppResult<()> {
        self.subtasks().insert_one(subtask).await?;
        Ok(())
    }

    async fn find_subtask(&self, id: &str) -> AppResult<Option<SubTask>> {
        Ok(self.subtasks().find_one(by_id(id)).await?)
    }

    async fn find_subtasks_for_task(&self, task_id: &str) -> AppResult<Vec<SubTask>> {
        find_all(self.subtasks(), doc! { "mainTask": task_id }).await
    }

    async fn replace_subtask(&self, subtask: &SubTask) -> AppResult<bool> {
        let res = self.subtasks().replace_one(by_id(&subtask.id), subtask).await?;
        Ok(res.matched_count == 1)
    }

    async fn delete_subtask(&self, id: &str) -> AppResult<bool> {
        let res = self.subtasks().delete_one(by_id(id)).await?;
        Ok(res.deleted_count == 1)
    }

    async fn delete_subtasks_for_task(&self, task_id: &str) -> AppResult<u64> {
        let res = self.subtasks().delete_many(doc! { "mainTask": task_id }).await?;
        Ok(res.deleted_count)
    }

    async fn insert_comment(&self, comment: &Comment) -> AppResult<()> {
        self.comments().insert_one(comment).await?;
        Ok(())
    }

    async fn find_comment(&self, id: &str) -> AppResult<Option<Comment>> {
        Ok(self.comments().find_one(by_id(id)).await?)
    }

    async fn find_comments_for_task(&self, task_id: &str) -> AppResult<Vec<Comment>> {
        find_all(self.comments(), doc! { "forTask": task_id }).await
    }

    async fn find_comment_by_content(
        &self,
        task_id: &str,
        author_id: &str,
        content: &str,
    ) -> AppResult<Option<Comment>> {
        Ok(self
            .comments()
            .find_one(doc! { "forTask": task_id, "user": author_id, "content": content })
            .await?)
    }

    async fn replace_comment(&self, comment: &Comment) -> AppResult<bool> {
        let res = self.comments().replace_one(by_id(&comment.id), comment).await?;
        Ok(res.matched_count == 1)
    }

    async fn delete_comment(&self, id: &str) -> AppResult<bool> {
        let res = self.comments().delete_one(by_id(id)).await?;
        Ok(res.deleted_count == 1)
    }

    async fn delete_comments_for_task(&self, task_id: &str) -> AppResult<u64> {
        let res = self.comments().delete_many(doc! { "forTask": task_id }).await?;
        Ok(res.deleted_count)
    }

    async fn insert_notification(&self, notification: &Notification) -> AppResult<()> {
        self.notifications().insert_one(notification).await?;
        Ok(())
    }

    async fn find_notification(&self, id: &str) -> AppResult<Option<Notification>> {
        Ok(self.notifications().find_one(by_id(id)).await?)
    }

    async fn list_notifications_for(&self, user_id: &str) -> AppResult<Vec<Notification>> {
        let cursor = self
            .notifications()
            .find(doc! { "to": user_id })
            .sort(doc! { "createdAt": -1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn mark_notification_read(&self, id: &str) -> AppResult<bool> {
        let res = self
            .notifications()
            .update_one(by_id(id), doc! { "$set": { "isRead": true } })
            .await?;
        Ok(res.matched_count == 1)
    }

    async fn insert_password_reset(&self, reset: &PasswordReset) -> AppResult<()> {
        self.password_resets().insert_one(reset).await?;
        Ok(())
    }

    async fn find_password_reset(
        &self,
        user_id: &str,
        code: &str,
    ) -> AppResult<Option<PasswordReset>> {
        Ok(self
            .password_resets()
            .find_one(doc! { "user": user_id, "code": code })
            .await?)
    }

    async fn delete_password_resets(&self, user_id: &str) -> AppResult<u64> {
        let res = self
            .password_resets()
            .delete_many(doc! { "user": user_id })
            .await?;
        Ok(res.deleted_count)
    }

    async fn insert_email_confirmation(&self, confirmation: &EmailConfirmation) -> AppResult<()> {
        self.email_confirmations().insert_one(confirmation).await?;
        Ok(())
    }

    async fn find_email_confirmation(
        &self,
        user_id: &str,
        code: &str,
    ) -> AppResult<Option<EmailConfirmation>> {
        Ok(self
            .email_confirmations()
            .find_one(doc! { "user": user_id, "code": code })
            .await?)
    }

    async fn delete_email_confirmations(&self, user_id: &str) -> AppResult<u64> {
        let res = self
            .email_confirmations()
            .delete_many(doc! { "user": user_id })
            .await?;
        Ok(res.deleted_count)
    }
}
