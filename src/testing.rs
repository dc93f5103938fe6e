//! Test doubles: an in-memory [`Store`], push/email channel stubs and fixtures.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use crate::app_state::AppState;
use crate::auth::create_jwt;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::fanout::{EmailChannel, Fanout, PushChannel, PushMessage, TemplateEmail};
use crate::models::{
    new_id, Comment, EmailConfirmation, Notification, PasswordReset, Position, SubTask, Task, TaskStatus, Team,
    TeamJoinRequest, User,
};
use crate::store::Store;

#[derive(Default)]
struct Collections {
    users: Vec<User>,
    teams: Vec<Team>,
    join_requests: Vec<TeamJoinRequest>,
    tasks: Vec<Task>,
    subtasks: Vec<SubTask>,
    comments: Vec<Comment>,
    notifications: Vec<Notification>,
    password_resets: Vec<PasswordReset>,
    email_confirmations: Vec<EmailConfirmation>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Collections>,
}

impl MemoryStore {
    fn with<R>(&self, f: impl FnOnce(&mut Collections) -> R) -> R {
        let mut guard = self.inner.lock().expect("memory store poisoned");
        f(&mut guard)
    }

    pub fn notification_count(&self) -> usize {
        self.with(|c| c.notifications.len())
    }

    pub fn join_request_count(&self) -> usize {
        self.with(|c| c.join_requests.len())
    }

    pub fn comment_count(&self) -> usize {
        self.with(|c| c.comments.len())
    }

    pub fn subtask_count(&self) -> usize {
        self.with(|c| c.subtasks.len())
    }

    pub fn all_notifications(&self) -> Vec<Notification> {
        self.with(|c| c.notifications.clone())
    }
}

fn replace<T: Clone>(items: &mut [T], item: &T, same: impl Fn(&T) -> bool) -> bool {
    match items.iter_mut().find(|existing| same(existing)) {
        Some(slot) => {
            *slot = item.clone();
            true
        }
        None => false,
    }
}

fn remove<T>(items: &mut Vec<T>, matches: impl Fn(&T) -> bool) -> u64 {
    let before = items.len();
    items.retain(|item| !matches(item));
    (before - items.len()) as u64
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: &User) -> AppResult<()> {
        self.with(|c| c.users.push(user.clone()));
        Ok(())
    }

    async fn find_user(&self, id: &str) -> AppResult<Option<User>> {
        Ok(self.with(|c| c.users.iter().find(|u| u.id == id).cloned()))
    }

    async fn find_user_by_user_name(&self, user_name: &str) -> AppResult<Option<User>> {
        Ok(self.with(|c| c.users.iter().find(|u| u.user_name == user_name).cloned()))
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self.with(|c| c.users.iter().find(|u| u.email == email).cloned()))
    }

    async fn find_users(&self, ids: &[String]) -> AppResult<Vec<User>> {
        Ok(self.with(|c| {
            c.users
                .iter()
                .filter(|u| ids.contains(&u.id))
                .cloned()
                .collect()
        }))
    }

    async fn find_team_members(&self, team_ids: &[String]) -> AppResult<Vec<User>> {
        Ok(self.with(|c| {
            c.users
                .iter()
                .filter(|u| u.member_of_teams.iter().any(|t| team_ids.contains(t)))
                .cloned()
                .collect()
        }))
    }

    async fn replace_user(&self, user: &User) -> AppResult<bool> {
        Ok(self.with(|c| replace(&mut c.users, user, |u| u.id == user.id)))
    }

    async fn delete_user(&self, id: &str) -> AppResult<bool> {
        Ok(self.with(|c| remove(&mut c.users, |u| u.id == id) == 1))
    }

    async fn insert_team(&self, team: &Team) -> AppResult<()> {
        self.with(|c| c.teams.push(team.clone()));
        Ok(())
    }

    async fn find_team(&self, id: &str) -> AppResult<Option<Team>> {
        Ok(self.with(|c| c.teams.iter().find(|t| t.id == id).cloned()))
    }

    async fn find_team_by_code(&self, code: &str) -> AppResult<Option<Team>> {
        Ok(self.with(|c| c.teams.iter().find(|t| t.team_code == code).cloned()))
    }

    async fn find_team_by_name_key(&self, name_key: &str) -> AppResult<Option<Team>> {
        Ok(self.with(|c| c.teams.iter().find(|t| t.team_name_key == name_key).cloned()))
    }

    async fn find_teams(&self, ids: &[String]) -> AppResult<Vec<Team>> {
        Ok(self.with(|c| {
            c.teams
                .iter()
                .filter(|t| ids.contains(&t.id))
                .cloned()
                .collect()
        }))
    }

    async fn replace_team(&self, team: &Team) -> AppResult<bool> {
        Ok(self.with(|c| replace(&mut c.teams, team, |t| t.id == team.id)))
    }

    async fn delete_team(&self, id: &str) -> AppResult<bool> {
        Ok(self.with(|c| remove(&mut c.teams, |t| t.id == id) == 1))
    }

    async fn insert_join_request(&self, request: &TeamJoinRequest) -> AppResult<()> {
        self.with(|c| c.join_requests.push(request.clone()));
        Ok(())
    }

    async fn find_join_request(&self, id: &str) -> AppResult<Option<TeamJoinRequest>> {
        Ok(self.with(|c| c.join_requests.iter().find(|r| r.id == id).cloned()))
    }

    async fn find_pending_join_request(
        &self,
        user_id: &str,
        team_code: &str,
    ) -> AppResult<Option<TeamJoinRequest>> {
        Ok(self.with(|c| {
            c.join_requests
                .iter()
                .find(|r| r.user == user_id && r.team_code == team_code && !r.is_approved)
                .cloned()
        }))
    }

    async fn list_join_requests(&self, team_code: &str) -> AppResult<Vec<TeamJoinRequest>> {
        Ok(self.with(|c| {
            c.join_requests
                .iter()
                .filter(|r| r.team_code == team_code && !r.is_approved)
                .cloned()
                .collect()
        }))
    }

    async fn delete_join_request(&self, id: &str) -> AppResult<bool> {
        Ok(self.with(|c| remove(&mut c.join_requests, |r| r.id == id) == 1))
    }

    async fn insert_task(&self, task: &Task) -> AppResult<()> {
        self.with(|c| c.tasks.push(task.clone()));
        Ok(())
    }

    async fn find_task(&self, id: &str) -> AppResult<Option<Task>> {
        Ok(self.with(|c| c.tasks.iter().find(|t| t.id == id).cloned()))
    }

    async fn find_tasks_involving(&self, user_ids: &[String]) -> AppResult<Vec<Task>> {
        Ok(self.with(|c| {
            c.tasks
                .iter()
                .filter(|t| {
                    user_ids.contains(&t.created_by)
                        || t.participants.iter().any(|p| user_ids.contains(p))
                })
                .cloned()
                .collect()
        }))
    }

    async fn replace_task(&self, task: &Task) -> AppResult<bool> {
        Ok(self.with(|c| replace(&mut c.tasks, task, |t| t.id == task.id)))
    }

    async fn set_task_progress(&self, id: &str, progress: f64) -> AppResult<bool> {
        Ok(self.with(|c| match c.tasks.iter_mut().find(|t| t.id == id) {
            Some(task) => {
                task.progress = progress;
                task.updated_at = Utc::now();
                true
            }
            None => false,
        }))
    }

    async fn delete_task(&self, id: &str) -> AppResult<bool> {
        Ok(self.with(|c| remove(&mut c.tasks, |t| t.id == id) == 1))
    }

    async fn insert_subtask(&self, subtask: &SubTask) -> AppResult<()> {
        self.with(|c| c.subtasks.push(subtask.clone()));
        Ok(())
    }

    async fn find_subtask(&self, id: &str) -> AppResult<Option<SubTask>> {
        Ok(self.with(|c| c.subtasks.iter().find(|s| s.id == id).cloned()))
    }

    async fn find_subtasks_for_task(&self, task_id: &str) -> AppResult<Vec<SubTask>> {
        Ok(self.with(|c| {
            c.subtasks
                .iter()
                .filter(|s| s.main_task == task_id)
                .cloned()
                .collect()
        }))
    }

    async fn replace_subtask(&self, subtask: &SubTask) -> AppResult<bool> {
        Ok(self.with(|c| replace(&mut c.subtasks, subtask, |s| s.id == subtask.id)))
    }

    async fn delete_subtask(&self, id: &str) -> AppResult<bool> {
        Ok(self.with(|c| remove(&mut c.subtasks, |s| s.id == id) == 1))
    }

    async fn delete_subtasks_for_task(&self, task_id: &str) -> AppResult<u64> {
        Ok(self.with(|c| remove(&mut c.subtasks, |s| s.main_task == task_id)))
    }

    async fn insert_comment(&self, comment: &Comment) -> AppResult<()> {
        self.with(|c| c.comments.push(comment.clone()));
        Ok(())
    }

    async fn find_comment(&self, id: &str) -> AppResult<Option<Comment>> {
        Ok(self.with(|c| c.comments.iter().find(|cm| cm.id == id).cloned()))
    }

    async fn find_comments_for_task(&self, task_id: &str) -> AppResult<Vec<Comment>> {
        Ok(self.with(|c| {
            c.comments
                .iter()
                .filter(|cm| cm.for_task == task_id)
                .cloned()
                .collect()
        }))
    }

    async fn find_comment_by_content(
        &self,
        task_id: &str,
        author_id: &str,
        content: &str,
    ) -> AppResult<Option<Comment>> {
        Ok(self.with(|c| {
            c.comments
                .iter()
                .find(|cm| cm.for_task == task_id && cm.user == author_id && cm.content == content)
                .cloned()
        }))
    }

    async fn replace_comment(&self, comment: &Comment) -> AppResult<bool> {
        Ok(self.with(|c| replace(&mut c.comments, comment, |cm| cm.id == comment.id)))
    }

    async fn delete_comment(&self, id: &str) -> AppResult<bool> {
        Ok(self.with(|c| remove(&mut c.comments, |cm| cm.id == id) == 1))
    }

    async fn delete_comments_for_task(&self, task_id: &str) -> AppResult<u64> {
        Ok(self.with(|c| remove(&mut c.comments, |cm| cm.for_task == task_id)))
    }

    async fn insert_notification(&self, notification: &Notification) -> AppResult<()> {
        self.with(|c| c.notifications.push(notification.clone()));
        Ok(())
    }

    async fn find_notification(&self, id: &str) -> AppResult<Option<Notification>> {
        Ok(self.with(|c| c.notifications.iter().find(|n| n.id == id).cloned()))
    }

    async fn list_notifications_for(&self, user_id: &str) -> AppResult<Vec<Notification>> {
        Ok(self.with(|c| {
            c.notifications
                .iter()
                .rev()
                .filter(|n| n.to == user_id)
                .cloned()
                .collect()
        }))
    }

    async fn mark_notification_read(&self, id: &str) -> AppResult<bool> {
        Ok(self.with(|c| match c.notifications.iter_mut().find(|n| n.id == id) {
            Some(n) => {
                n.is_read = true;
                true
            }
            None => false,
        }))
    }

    async fn insert_password_reset(&self, reset: &PasswordReset) -> AppResult<()> {
        self.with(|c| c.password_resets.push(reset.clone()));
        Ok(())
    }

    async fn find_password_reset(
        &self,
        user_id: &str,
        code: &str,
    ) -> AppResult<Option<PasswordReset>> {
        Ok(self.with(|c| {
            c.password_resets
                .iter()
                .find(|r| r.user == user_id && r.code == code)
                .cloned()
        }))
    }

    async fn delete_password_resets(&self, user_id: &str) -> AppResult<u64> {
        Ok(self.with(|c| remove(&mut c.password_resets, |r| r.user == user_id)))
    }

    async fn insert_email_confirmation(&self, confirmation: &EmailConfirmation) -> AppResult<()> {
        self.with(|c| c.email_confirmations.push(confirmation.clone()));
        Ok(())
    }

    async fn find_email_confirmation(
        &self,
        user_id: &str,
        code: &str,
    ) -> AppResult<Option<EmailConfirmation>> {
        Ok(self.with(|c| {
            c.email_confirmations
                .iter()
                .find(|r| r.user == user_id && r.code == code)
                .cloned()
        }))
    }

    async fn delete_email_confirmations(&self, user_id: &str) -> AppResult<u64> {
        Ok(self.with(|c| remove(&mut c.email_confirmations, |r| r.user == user_id)))
    }
}

/// Records every batch and answers with one "ok" ticket per message.
#[derive(Default)]
pub struct RecordingPush {
    batches: Mutex<Vec<Vec<PushMessage>>>,
}

impl RecordingPush {
    pub fn batches(&self) -> Vec<Vec<PushMessage>> {
        self.batches.lock().expect("push stub poisoned").clone()
    }
}

#[async_trait]
impl PushChannel for RecordingPush {
    async fn send(&self, messages: &[PushMessage]) -> AppResult<Value> {
        self.batches
            .lock()
            .expect("push stub poisoned")
            .push(messages.to_vec());
        let tickets: Vec<Value> = messages.iter().map(|_| json!({ "status": "ok" })).collect();
        Ok(json!({ "data": tickets }))
    }
}

/// Push channel that is always down.
pub struct FailingPush;

#[async_trait]
impl PushChannel for FailingPush {
    async fn send(&self, _messages: &[PushMessage]) -> AppResult<Value> {
        Err(AppError::ChannelFailure("push service unreachable".to_string()))
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<TemplateEmail>>,
    fail: bool,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<TemplateEmail> {
        self.sent.lock().expect("mail stub poisoned").clone()
    }
}

#[async_trait]
impl EmailChannel for RecordingMailer {
    async fn send_template(&self, email: &TemplateEmail) -> AppResult<Value> {
        self.sent
            .lock()
            .expect("mail stub poisoned")
            .push(email.clone());
        if self.fail {
            return Err(AppError::ChannelFailure("email service unreachable".to_string()));
        }
        Ok(json!({ "messageId": "<test@brevo>" }))
    }
}

pub fn fanout(store: &Arc<MemoryStore>, push: Arc<dyn PushChannel>) -> Fanout {
    Fanout::new(store.clone(), push)
}

pub type TestHandles = (AppState, Arc<MemoryStore>, Arc<RecordingPush>, Arc<RecordingMailer>);

/// App state over an empty in-memory store with recording channels.
pub fn test_app_state() -> TestHandles {
    test_app_state_with(RecordingMailer::default())
}

pub fn test_app_state_with(mailer: RecordingMailer) -> TestHandles {
    let store = Arc::new(MemoryStore::default());
    let push = Arc::new(RecordingPush::default());
    let mailer = Arc::new(mailer);
    let state = AppState::new(store.clone(), push.clone(), mailer.clone(), Config::for_tests());
    (state, store, push, mailer)
}

/// `Authorization` header value for `user_id`, signed with the test secret.
pub fn bearer(user_id: &str) -> String {
    let token = create_jwt(user_id, &Config::for_tests().jwt_secret).expect("sign test token");
    format!("Bearer {}", token)
}

pub fn user_named(name: &str) -> User {
    User {
        id: new_id(),
        user_name: name.to_string(),
        email: format!("{}@example.com", name),
        email_confirmed: false,
        full_name: format!("{} Example", name),
        title: "Engineer".to_string(),
        profile_picture: String::new(),
        profile_color: None,
        position: Position::Employee,
        dob: None,
        password: String::new(),
        member_of_teams: Vec::new(),
        manager_of_teams: Vec::new(),
        supervisor_of_teams: Vec::new(),
        push_tokens: Vec::new(),
        tasks: Vec::new(),
        created_at: Utc::now(),
    }
}

pub async fn seed_user(store: &MemoryStore, name: &str) -> User {
    let user = user_named(name);
    store.insert_user(&user).await.expect("seed user");
    user
}

pub async fn seed_user_with_tokens(store: &MemoryStore, name: &str, tokens: &[&str]) -> User {
    let mut user = user_named(name);
    user.push_tokens = tokens.iter().map(|t| t.to_string()).collect();
    store.insert_user(&user).await.expect("seed user");
    user
}

pub async fn seed_user_with_position(store: &MemoryStore, name: &str, position: Position) -> User {
    let mut user = user_named(name);
    user.position = position;
    store.insert_user(&user).await.expect("seed user");
    user
}

pub async fn seed_task(store: &MemoryStore, creator: &str, participants: &[&str]) -> Task {
    let now = Utc::now();
    let task = Task {
        id: new_id(),
        title: "Quarterly report".to_string(),
        description: String::new(),
        priority: Default::default(),
        tags: Vec::new(),
        start_date: now,
        end_date: now + Duration::days(7),
        created_by: creator.to_string(),
        status: TaskStatus::Pending,
        progress: 0.0,
        participants: participants.iter().map(|p| p.to_string()).collect(),
        comments: Vec::new(),
        subtasks: Vec::new(),
        feedback: Vec::new(),
        summary: Vec::new(),
        conclusion: String::new(),
        created_at: now,
        updated_at: now,
    };
    store.insert_task(&task).await.expect("seed task");
    task
}

pub async fn seed_subtask(store: &MemoryStore, task_id: &str, owner: &str, progress: f64) -> SubTask {
    let now = Utc::now();
    let subtask = SubTask {
        id: new_id(),
        main_task: task_id.to_string(),
        assigned_to: owner.to_string(),
        created_by: owner.to_string(),
        title: "Part".to_string(),
        status: TaskStatus::InProgress,
        start_date: now,
        end_date: now + Duration::days(7),
        progress,
        feedback: Vec::new(),
        created_at: now,
        updated_at: now,
    };
    store.insert_subtask(&subtask).await.expect("seed subtask");
    if let Some(mut task) = store.find_task(task_id).await.expect("load task") {
        task.subtasks.push(subtask.id.clone());
        store.replace_task(&task).await.expect("link subtask");
    }
    subtask
}

/// A team with a supervisor and members, both sides of the relation filled in.
pub async fn seed_team(
    store: &MemoryStore,
    name: &str,
    code: &str,
    supervisor: &str,
    members: &[&str],
) -> Team {
    let team = Team {
        id: new_id(),
        team_name: name.to_string(),
        team_name_key: Team::name_key(name),
        team_code: code.to_string(),
        team_logo: String::new(),
        team_slogan: String::new(),
        supervised_by: supervisor.to_string(),
        managed_by: Vec::new(),
        members: members.iter().map(|m| m.to_string()).collect(),
        created_at: Utc::now(),
    };
    store.insert_team(&team).await.expect("seed team");

    if let Some(mut user) = store.find_user(supervisor).await.expect("load supervisor") {
        user.supervisor_of_teams.push(team.id.clone());
        store.replace_user(&user).await.expect("link supervisor");
    }
    for member in members {
        if let Some(mut user) = store.find_user(member).await.expect("load member") {
            user.member_of_teams.push(team.id.clone());
            store.replace_user(&user).await.expect("link member");
        }
    }
    team
}
