//! Task and subtask lifecycle.
//!
//! A task moves `pending → in-progress → completed` and never back. Every
//! subtask mutation that can move a progress value ends with a rollup into the
//! parent. Notifications go out after the mutation is stored and never undo it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::fanout::{Fanout, Notice};
use crate::membership::Membership;
use crate::models::comment::random_color;
use crate::models::task::push_feedback;
use crate::models::{
    insert_unique, new_id, remove_id, Comment, Priority, PublicUser, SubTask, Task, TaskStatus,
    User,
};
use crate::progress::{apply_delta, check_bounds, recompute_task_progress};
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct NewTask {
    pub created_by: String,
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<TaskStatus>,
    pub progress: Option<f64>,
    pub tags: Vec<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub participants: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub tags: Option<Vec<String>>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub progress: Option<f64>,
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct SubTaskChanges {
    pub title: Option<String>,
    pub assigned_to: Option<String>,
    pub status: Option<TaskStatus>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct CommentChanges {
    pub title: Option<String>,
    pub content: Option<String>,
}

/// A task with its referenced documents loaded.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetails {
    #[serde(flatten)]
    pub task: Task,
    pub participant_details: Vec<PublicUser>,
    pub comment_details: Vec<Comment>,
    pub subtask_details: Vec<SubTask>,
}

fn require_text(value: &str, field: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

fn check_dates(start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<()> {
    if end < start {
        return Err(AppError::invalid("End date cannot be before start date"));
    }
    Ok(())
}

fn dedup_ids(ids: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for id in ids {
        if !id.trim().is_empty() {
            insert_unique(&mut out, id);
        }
    }
    out
}

#[derive(Clone)]
pub struct TaskEngine {
    store: Arc<dyn Store>,
    fanout: Fanout,
    membership: Membership,
}

impl TaskEngine {
    pub fn new(store: Arc<dyn Store>, fanout: Fanout, membership: Membership) -> Self {
        Self {
            store,
            fanout,
            membership,
        }
    }

    async fn load_task(&self, id: &str) -> AppResult<Task> {
        self.store.find_task(id).await?.ok_or(AppError::NotFound("Task"))
    }

    async fn load_subtask(&self, id: &str) -> AppResult<SubTask> {
        self.store
            .find_subtask(id)
            .await?
            .ok_or(AppError::NotFound("Subtask"))
    }

    async fn load_user(&self, id: &str) -> AppResult<User> {
        self.store.find_user(id).await?.ok_or(AppError::NotFound("User"))
    }

    async fn save_task(&self, task: &mut Task) -> AppResult<()> {
        task.updated_at = Utc::now();
        if !self.store.replace_task(task).await? {
            return Err(AppError::NotFound("Task"));
        }
        Ok(())
    }

    async fn save_subtask(&self, subtask: &mut SubTask) -> AppResult<()> {
        subtask.updated_at = Utc::now();
        if !self.store.replace_subtask(subtask).await? {
            return Err(AppError::NotFound("Subtask"));
        }
        Ok(())
    }

    /// Loads every id, failing with `NotFound("User")` if any is unknown.
    async fn load_users(&self, ids: &[String]) -> AppResult<Vec<User>> {
        let users = self.store.find_users(ids).await?;
        if let Some(missing) = ids.iter().find(|id| !users.iter().any(|u| &u.id == *id)) {
            debug!("Unknown user {} referenced", missing);
            return Err(AppError::NotFound("User"));
        }
        Ok(users)
    }

    /// Adds or removes `task_id` in the `tasks` list of each user.
    async fn link_tasks(&self, user_ids: &[String], task_id: &str, link: bool) -> AppResult<()> {
        for mut user in self.store.find_users(user_ids).await? {
            let changed = if link {
                insert_unique(&mut user.tasks, task_id)
            } else {
                remove_id(&mut user.tasks, task_id)
            };
            if changed {
                self.store.replace_user(&user).await?;
            }
        }
        Ok(())
    }

    async fn notify_assigned(&self, assigner: &User, task: &Task, recipients: Vec<String>) {
        if recipients.is_empty() {
            return;
        }
        self.fanout
            .notify_quietly(
                Notice::new(
                    format!("{} assigned you a new task", assigner.full_name),
                    "You have been added to a new task",
                    format!("You have been assigned to the task: {}", task.title),
                )
                .from_user(&assigner.id)
                .to(recipients),
            )
            .await;
    }

    // ─── tasks ────────────────────────────────────────────────────────────

    pub async fn create_task(&self, input: NewTask) -> AppResult<Task> {
        let title = require_text(&input.title, "Title")?;
        check_dates(input.start_date, input.end_date)?;
        if let Some(status) = input.status {
            if status != TaskStatus::Pending {
                return Err(AppError::invalid("A new task must start as pending"));
            }
        }
        let progress = check_bounds(input.progress.unwrap_or(0.0))?;

        let creator = self.load_user(&input.created_by).await?;
        let participants = dedup_ids(&input.participants);
        self.load_users(&participants).await?;

        let now = Utc::now();
        let task = Task {
            id: new_id(),
            title,
            description: input.description.unwrap_or_default(),
            priority: input.priority.unwrap_or_default(),
            tags: input.tags,
            start_date: input.start_date,
            end_date: input.end_date,
            created_by: creator.id.clone(),
            status: TaskStatus::Pending,
            progress,
            participants,
            comments: Vec::new(),
            subtasks: Vec::new(),
            feedback: Vec::new(),
            summary: Vec::new(),
            conclusion: String::new(),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_task(&task).await?;

        let mut linked = vec![creator.id.clone()];
        for id in &task.participants {
            insert_unique(&mut linked, id);
        }
        self.link_tasks(&linked, &task.id, true).await?;
        info!("Task {} created by {}", task.id, creator.id);

        let others: Vec<String> = task
            .participants
            .iter()
            .filter(|p| **p != creator.id)
            .cloned()
            .collect();
        self.notify_assigned(&creator, &task, others).await;
        Ok(task)
    }

    pub async fn get_task(&self, task_id: &str) -> AppResult<TaskDetails> {
        let task = self.load_task(task_id).await?;
        let (participants, comment_details, subtask_details) = tokio::try_join!(
            self.store.find_users(&task.participants),
            self.store.find_comments_for_task(&task.id),
            self.store.find_subtasks_for_task(&task.id),
        )?;
        let participant_details = task
            .participants
            .iter()
            .filter_map(|id| participants.iter().find(|u| &u.id == id))
            .cloned()
            .map(PublicUser::from)
            .collect();
        Ok(TaskDetails {
            task,
            participant_details,
            comment_details,
            subtask_details,
        })
    }

    /// Tasks the user can see, oldest first.
    pub async fn tasks_for_user(&self, user_id: &str) -> AppResult<Vec<Task>> {
        let viewer = self.load_user(user_id).await?;
        let ids = self.membership.visible_user_ids(&viewer).await?;
        let tasks = self.store.find_tasks_involving(&ids).await?;
        debug!(
            "{} task(s) visible to {} through {} user(s)",
            tasks.len(),
            viewer.id,
            ids.len()
        );
        Ok(tasks)
    }

    pub async fn add_participants(
        &self,
        task_id: &str,
        actor_id: &str,
        participants: &[String],
    ) -> AppResult<Task> {
        let participants = dedup_ids(participants);
        if participants.is_empty() {
            return Err(AppError::invalid("participants must not be empty"));
        }
        let actor = self.load_user(actor_id).await?;
        let mut task = self.load_task(task_id).await?;
        self.load_users(&participants).await?;

        let added: Vec<String> = participants
            .iter()
            .filter(|id| insert_unique(&mut task.participants, id))
            .cloned()
            .collect();
        if added.is_empty() {
            return Ok(task);
        }
        self.save_task(&mut task).await?;
        self.link_tasks(&added, &task.id, true).await?;
        info!("{} participant(s) added to task {}", added.len(), task.id);

        self.notify_assigned(&actor, &task, added).await;
        Ok(task)
    }

    pub async fn unassign_participants(&self, task_id: &str, ids: &[String]) -> AppResult<Task> {
        if ids.is_empty() {
            return Err(AppError::invalid("participantIds must not be empty"));
        }
        let mut task = self.load_task(task_id).await?;
        let removed: Vec<String> = ids
            .iter()
            .filter(|id| remove_id(&mut task.participants, id))
            .cloned()
            .collect();
        if removed.is_empty() {
            return Ok(task);
        }
        self.save_task(&mut task).await?;
        // The creator keeps the task even when unassigned.
        let unlinked: Vec<String> = removed
            .into_iter()
            .filter(|id| *id != task.created_by)
            .collect();
        self.link_tasks(&unlinked, &task.id, false).await?;
        info!("Participants unassigned from task {}", task.id);
        Ok(task)
    }

    pub async fn update_details(&self, task_id: &str, changes: TaskChanges) -> AppResult<Task> {
        let mut task = self.load_task(task_id).await?;

        if let Some(title) = changes.title {
            task.title = require_text(&title, "Title")?;
        }
        if let Some(description) = changes.description {
            task.description = description;
        }
        if let Some(priority) = changes.priority {
            task.priority = priority;
        }
        if let Some(tags) = changes.tags {
            task.tags = tags;
        }
        if let Some(start) = changes.start_date {
            task.start_date = start;
        }
        if let Some(end) = changes.end_date {
            task.end_date = end;
        }
        check_dates(task.start_date, task.end_date)?;

        if let Some(progress) = changes.progress {
            if !self.store.find_subtasks_for_task(&task.id).await?.is_empty() {
                return Err(AppError::invalid(
                    "Progress is derived from subtasks and cannot be set directly",
                ));
            }
            task.progress = check_bounds(progress)?;
        }
        if let Some(status) = changes.status {
            if status == TaskStatus::Completed && task.status != TaskStatus::Completed {
                return Err(AppError::invalid(
                    "Tasks are completed by summarizing their feedback",
                ));
            }
            if !task.status.can_advance_to(status) {
                return Err(AppError::invalid("Task status cannot move backwards"));
            }
            task.status = status;
        }

        self.save_task(&mut task).await?;
        info!("Task {} details updated", task.id);
        Ok(task)
    }

    /// Deletes the task with its subtasks and comments.
    pub async fn delete_task(&self, task_id: &str) -> AppResult<()> {
        let task = self.load_task(task_id).await?;
        let subtasks = self.store.delete_subtasks_for_task(&task.id).await?;
        let comments = self.store.delete_comments_for_task(&task.id).await?;

        let mut linked = vec![task.created_by.clone()];
        for id in &task.participants {
            insert_unique(&mut linked, id);
        }
        self.link_tasks(&linked, &task.id, false).await?;

        if !self.store.delete_task(&task.id).await? {
            return Err(AppError::NotFound("Task"));
        }
        info!(
            "Task {} deleted with {} subtask(s) and {} comment(s)",
            task.id, subtasks, comments
        );
        Ok(())
    }

    // ─── subtasks ─────────────────────────────────────────────────────────

    pub async fn add_subtask(
        &self,
        task_id: &str,
        creator_id: &str,
        title: &str,
        assigned_to: Option<&str>,
    ) -> AppResult<SubTask> {
        let title = require_text(title, "Title")?;
        let mut task = self.load_task(task_id).await?;
        if task.status == TaskStatus::Completed {
            return Err(AppError::conflict("Task is already completed"));
        }
        let creator = self.load_user(creator_id).await?;
        let assignee = match assigned_to {
            Some(id) if id != creator.id => self.load_user(id).await?,
            _ => creator.clone(),
        };

        let now = Utc::now();
        let subtask = SubTask {
            id: new_id(),
            main_task: task.id.clone(),
            assigned_to: assignee.id.clone(),
            created_by: creator.id.clone(),
            title,
            status: TaskStatus::InProgress,
            start_date: now,
            end_date: task.end_date,
            progress: 0.0,
            feedback: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_subtask(&subtask).await?;

        insert_unique(&mut task.subtasks, &subtask.id);
        self.save_task(&mut task).await?;
        recompute_task_progress(self.store.as_ref(), &task.id).await?;
        info!("Subtask {} added to task {}", subtask.id, task.id);

        let notice = if assignee.id == creator.id {
            Notice::new(
                "Subtask Created",
                "You created a new subtask",
                format!("Your subtask created successfully : {}", subtask.title),
            )
        } else {
            Notice::new(
                "New Subtask Assigned",
                "You have been assigned a new subtask",
                format!("A new subtask assigned to you : {}", subtask.title),
            )
        };
        self.fanout
            .notify_quietly(notice.from_user(&creator.id).to(vec![assignee.id.clone()]))
            .await;

        Ok(subtask)
    }

    /// Adds `delta` to the subtask's progress and rolls the parent up.
    /// Returns the subtask and the parent's new progress.
    pub async fn update_subtask_progress(
        &self,
        subtask_id: &str,
        delta: f64,
    ) -> AppResult<(SubTask, f64)> {
        let mut subtask = self.load_subtask(subtask_id).await?;
        let task = self.load_task(&subtask.main_task).await?;

        subtask.progress = apply_delta(subtask.progress, delta)?;
        self.save_subtask(&mut subtask).await?;

        let rolled_up = recompute_task_progress(self.store.as_ref(), &task.id)
            .await?
            .unwrap_or(task.progress);
        info!(
            "Subtask {} progress now {}, task {} at {}",
            subtask.id, subtask.progress, task.id, rolled_up
        );
        Ok((subtask, rolled_up))
    }

    pub async fn update_subtask(&self, subtask_id: &str, changes: SubTaskChanges) -> AppResult<SubTask> {
        let mut subtask = self.load_subtask(subtask_id).await?;

        if let Some(title) = changes.title {
            subtask.title = require_text(&title, "Title")?;
        }
        if let Some(assignee) = changes.assigned_to {
            subtask.assigned_to = self.load_user(&assignee).await?.id;
        }
        if let Some(status) = changes.status {
            if !subtask.status.can_advance_to(status) {
                return Err(AppError::invalid("Subtask status cannot move backwards"));
            }
            subtask.status = status;
        }
        if let Some(end) = changes.end_date {
            check_dates(subtask.start_date, end)?;
            subtask.end_date = end;
        }

        self.save_subtask(&mut subtask).await?;
        info!("Subtask {} updated", subtask.id);
        Ok(subtask)
    }

    pub async fn delete_subtask(&self, task_id: &str, subtask_id: &str) -> AppResult<Option<f64>> {
        let subtask = self.load_subtask(subtask_id).await?;
        if subtask.main_task != task_id {
            return Err(AppError::NotFound("Subtask"));
        }
        let mut task = self.load_task(task_id).await?;

        self.store.delete_subtask(&subtask.id).await?;
        if remove_id(&mut task.subtasks, &subtask.id) {
            self.save_task(&mut task).await?;
        }
        let rolled_up = recompute_task_progress(self.store.as_ref(), &task.id).await?;
        info!("Subtask {} deleted from task {}", subtask.id, task.id);
        Ok(rolled_up)
    }

    // ─── comments ─────────────────────────────────────────────────────────

    pub async fn add_comment(
        &self,
        task_id: &str,
        author_id: &str,
        title: &str,
        content: &str,
    ) -> AppResult<Comment> {
        let content = require_text(content, "Content")?;
        let mut task = self.load_task(task_id).await?;
        let author = self.load_user(author_id).await?;

        if self
            .store
            .find_comment_by_content(&task.id, &author.id, &content)
            .await?
            .is_some()
        {
            return Err(AppError::invalid("You have already posted this comment"));
        }

        let now = Utc::now();
        let comment = Comment {
            id: new_id(),
            user: author.id.clone(),
            for_task: task.id.clone(),
            title: title.trim().to_string(),
            content,
            background_color: author.profile_color.clone().unwrap_or_else(random_color),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_comment(&comment).await?;

        insert_unique(&mut task.comments, &comment.id);
        if task.status == TaskStatus::Pending {
            task.status = TaskStatus::InProgress;
        }
        self.save_task(&mut task).await?;
        info!("Comment {} added to task {} by {}", comment.id, task.id, author.id);

        self.fanout
            .notify_quietly(
                Notice::new(
                    format!("New comment on task: {}", task.title),
                    "A new comment has been added",
                    format!("{} - {}", comment.title, comment.content),
                )
                .from_user(&author.id)
                .to(task.participants.clone()),
            )
            .await;

        Ok(comment)
    }

    /// Edits title and content. The color stays what it was at creation.
    pub async fn update_comment(&self, comment_id: &str, changes: CommentChanges) -> AppResult<Comment> {
        let mut comment = self
            .store
            .find_comment(comment_id)
            .await?
            .ok_or(AppError::NotFound("Comment"))?;
        if let Some(title) = changes.title {
            comment.title = title.trim().to_string();
        }
        if let Some(content) = changes.content {
            comment.content = require_text(&content, "Content")?;
        }
        comment.updated_at = Utc::now();
        if !self.store.replace_comment(&comment).await? {
            return Err(AppError::NotFound("Comment"));
        }
        Ok(comment)
    }

    pub async fn delete_comment(&self, task_id: &str, comment_id: &str) -> AppResult<()> {
        let comment = self
            .store
            .find_comment(comment_id)
            .await?
            .ok_or(AppError::NotFound("Comment"))?;
        if comment.for_task != task_id {
            return Err(AppError::NotFound("Comment"));
        }
        self.store.delete_comment(&comment.id).await?;
        if let Some(mut task) = self.store.find_task(task_id).await? {
            if remove_id(&mut task.comments, &comment.id) {
                self.save_task(&mut task).await?;
            }
        }
        info!("Comment {} deleted from task {}", comment.id, task_id);
        Ok(())
    }

    // ─── feedback ─────────────────────────────────────────────────────────

    /// Records feedback on the subtask and mirrors it into the parent task.
    pub async fn add_subtask_feedback(
        &self,
        subtask_id: &str,
        author_id: &str,
        feedback: &str,
    ) -> AppResult<SubTask> {
        let feedback = require_text(feedback, "Feedback")?;
        let mut subtask = self.load_subtask(subtask_id).await?;
        let mut task = self.load_task(&subtask.main_task).await?;
        let author = self.load_user(author_id).await?;

        if push_feedback(&mut subtask.feedback, &author.id, &feedback) {
            self.save_subtask(&mut subtask).await?;
        }
        if push_feedback(&mut task.feedback, &author.id, &feedback) {
            self.save_task(&mut task).await?;
        }

        self.fanout
            .notify_quietly(
                Notice::new(
                    format!("New feedback on subtask of: {}", task.title),
                    "A new feedback has been added",
                    feedback,
                )
                .from_user(&author.id)
                .to(task.participants.clone()),
            )
            .await;
        Ok(subtask)
    }

    pub async fn add_task_feedback(
        &self,
        task_id: &str,
        author_id: &str,
        feedback: &str,
    ) -> AppResult<Task> {
        let feedback = require_text(feedback, "Feedback")?;
        let mut task = self.load_task(task_id).await?;
        let author = self.load_user(author_id).await?;

        if push_feedback(&mut task.feedback, &author.id, &feedback) {
            self.save_task(&mut task).await?;
        }

        self.fanout
            .notify_quietly(
                Notice::new(
                    format!("New feedback on task: {}", task.title),
                    "A new feedback has been added",
                    feedback,
                )
                .from_user(&author.id)
                .to(task.participants.clone()),
            )
            .await;
        Ok(task)
    }

    /// Collects feedback into the summary and completes the task. Everyone up
    /// the participants' team chains is told.
    pub async fn summarize(&self, task_id: &str, conclusion: &str) -> AppResult<Task> {
        let mut task = self.load_task(task_id).await?;
        if task.status == TaskStatus::Completed {
            return Err(AppError::conflict("Task is already completed"));
        }

        task.summary = task.feedback.iter().map(|fb| fb.feedback.clone()).collect();
        task.conclusion = conclusion.trim().to_string();
        task.status = TaskStatus::Completed;
        self.save_task(&mut task).await?;
        info!(
            "Task {} summarized from {} feedback entr(ies) and completed",
            task.id,
            task.summary.len()
        );

        let recipients = match self.membership.escalation_recipients(&task.participants).await {
            Ok(recipients) => recipients,
            Err(err) => {
                warn!("Resolving escalation for task {} failed: {}", task.id, err);
                task.participants.clone()
            }
        };
        self.fanout
            .notify_quietly(
                Notice::new(
                    format!("Task summary created: {}", task.title),
                    "Task has been summarized and completed",
                    "A summary and conclusion have been added to the task.",
                )
                .to(recipients),
            )
            .await;
        Ok(task)
    }
}
