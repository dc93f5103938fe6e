// task_management.rs

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use log::debug;
use serde::Deserialize;
use serde_json::json;

use crate::app_state::AppState;
use crate::error::{AppError, AppResult};
use crate::lifecycle::{CommentChanges, NewTask, SubTaskChanges, TaskChanges};
use crate::middleware::AuthenticatedUser;
use crate::models::{Priority, TaskStatus};

/// Bodies name the acting user; it has to be the token's user.
fn acting_as(user: &AuthenticatedUser, claimed: &str) -> AppResult<()> {
    if claimed != user.id() {
        return Err(AppError::Forbidden(
            "Cannot act on behalf of another user".to_string(),
        ));
    }
    Ok(())
}

// ─── REQUEST PAYLOADS ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<TaskStatus>,
    pub progress: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub user_id: Option<String>,
    #[serde(default)]
    pub participants: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AddParticipantsRequest {
    pub user_id: String,
    pub participants: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UnassignRequest {
    pub participant_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub tags: Option<Vec<String>>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub progress: Option<f64>,
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AddSubtaskRequest {
    pub user_id: String,
    pub title: String,
    pub assigned_to: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProgressDelta {
    pub progress: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateSubtaskRequest {
    pub title: Option<String>,
    pub assigned_to: Option<String>,
    pub status: Option<TaskStatus>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CommentRequest {
    pub user_id: String,
    #[serde(default)]
    pub title: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateCommentRequest {
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FeedbackRequest {
    pub user_id: String,
    pub feedback: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SummarizeRequest {
    #[serde(default)]
    pub conclusion: String,
}

// ─── TASKS ────────────────────────────────────────────────────────────────────

// POST /api/tasks
pub async fn create_task(
    user: AuthenticatedUser,
    data: web::Data<AppState>,
    body: web::Json<CreateTaskRequest>,
) -> AppResult<HttpResponse> {
    let body = body.into_inner();
    if let Some(claimed) = &body.user_id {
        acting_as(&user, claimed)?;
    }
    let task = data
        .tasks
        .create_task(NewTask {
            created_by: user.id().to_string(),
            title: body.title,
            description: body.description,
            priority: body.priority,
            status: body.status,
            progress: body.progress,
            tags: body.tags,
            start_date: body.start_date,
            end_date: body.end_date,
            participants: body.participants,
        })
        .await?;
    Ok(HttpResponse::Created().json(json!({ "message": "Task created successfully", "task": task })))
}

// GET /api/tasks/{taskId}
pub async fn get_task(
    _user: AuthenticatedUser,
    data: web::Data<AppState>,
    task_id: web::Path<String>,
) -> AppResult<HttpResponse> {
    let task = data.tasks.get_task(&task_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "task": task })))
}

// GET /api/tasks/user/{userId}
pub async fn get_user_tasks(
    user: AuthenticatedUser,
    data: web::Data<AppState>,
    user_id: web::Path<String>,
) -> AppResult<HttpResponse> {
    // Only the caller's own view.
    if user.id() != user_id.as_str() {
        return Err(AppError::Forbidden("Cannot access other user's tasks".to_string()));
    }
    let tasks = data.tasks.tasks_for_user(&user_id).await?;
    debug!("Returning {} task(s) for {}", tasks.len(), user_id);
    Ok(HttpResponse::Ok().json(json!({ "tasks": tasks })))
}

// PUT /api/tasks/{taskId}
pub async fn add_participants(
    user: AuthenticatedUser,
    data: web::Data<AppState>,
    task_id: web::Path<String>,
    body: web::Json<AddParticipantsRequest>,
) -> AppResult<HttpResponse> {
    acting_as(&user, &body.user_id)?;
    let task = data
        .tasks
        .add_participants(&task_id, &body.user_id, &body.participants)
        .await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Task updated successfully and a notification sent to participants",
        "task": task,
    })))
}

// PUT /api/tasks/{taskId}/details
pub async fn update_task(
    _user: AuthenticatedUser,
    data: web::Data<AppState>,
    task_id: web::Path<String>,
    body: web::Json<UpdateTaskRequest>,
) -> AppResult<HttpResponse> {
    let body = body.into_inner();
    let task = data
        .tasks
        .update_details(
            &task_id,
            TaskChanges {
                title: body.title,
                description: body.description,
                priority: body.priority,
                tags: body.tags,
                start_date: body.start_date,
                end_date: body.end_date,
                progress: body.progress,
                status: body.status,
            },
        )
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Task updated successfully", "task": task })))
}

// PUT /api/tasks/{taskId}/unassign-participants
pub async fn unassign_participants(
    _user: AuthenticatedUser,
    data: web::Data<AppState>,
    task_id: web::Path<String>,
    body: web::Json<UnassignRequest>,
) -> AppResult<HttpResponse> {
    let task = data
        .tasks
        .unassign_participants(&task_id, &body.participant_ids)
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Participants unassigned", "task": task })))
}

// DELETE /api/tasks/{taskId}
pub async fn delete_task(
    _user: AuthenticatedUser,
    data: web::Data<AppState>,
    task_id: web::Path<String>,
) -> AppResult<HttpResponse> {
    data.tasks.delete_task(&task_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Task deleted successfully" })))
}

// ─── SUBTASKS ─────────────────────────────────────────────────────────────────

// PUT /api/tasks/add-subtask/{taskId}
pub async fn add_subtask(
    user: AuthenticatedUser,
    data: web::Data<AppState>,
    task_id: web::Path<String>,
    body: web::Json<AddSubtaskRequest>,
) -> AppResult<HttpResponse> {
    acting_as(&user, &body.user_id)?;
    let subtask = data
        .tasks
        .add_subtask(&task_id, &body.user_id, &body.title, body.assigned_to.as_deref())
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Subtask added successfully", "subtask": subtask })))
}

// PUT /api/tasks/update-subtask-progress/{subtaskId}
pub async fn update_subtask_progress(
    _user: AuthenticatedUser,
    data: web::Data<AppState>,
    subtask_id: web::Path<String>,
    body: web::Json<ProgressDelta>,
) -> AppResult<HttpResponse> {
    let (subtask, task_progress) = data
        .tasks
        .update_subtask_progress(&subtask_id, body.progress)
        .await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Subtask progress updated",
        "subtask": subtask,
        "taskProgress": task_progress,
    })))
}

// PUT /api/tasks/subtasks/{subtaskId}
pub async fn update_subtask(
    _user: AuthenticatedUser,
    data: web::Data<AppState>,
    subtask_id: web::Path<String>,
    body: web::Json<UpdateSubtaskRequest>,
) -> AppResult<HttpResponse> {
    let body = body.into_inner();
    let subtask = data
        .tasks
        .update_subtask(
            &subtask_id,
            SubTaskChanges {
                title: body.title,
                assigned_to: body.assigned_to,
                status: body.status,
                end_date: body.end_date,
            },
        )
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Subtask updated", "subtask": subtask })))
}

// DELETE /api/tasks/{taskId}/subtasks/{subtaskId}
pub async fn delete_subtask(
    _user: AuthenticatedUser,
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> AppResult<HttpResponse> {
    let (task_id, subtask_id) = path.into_inner();
    let task_progress = data.tasks.delete_subtask(&task_id, &subtask_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Subtask deleted", "taskProgress": task_progress })))
}

// ─── COMMENTS ─────────────────────────────────────────────────────────────────

// PUT /api/tasks/comment-main-task/{taskId}
pub async fn add_comment(
    user: AuthenticatedUser,
    data: web::Data<AppState>,
    task_id: web::Path<String>,
    body: web::Json<CommentRequest>,
) -> AppResult<HttpResponse> {
    acting_as(&user, &body.user_id)?;
    let comment = data
        .tasks
        .add_comment(&task_id, &body.user_id, &body.title, &body.content)
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Comment added successfully", "comment": comment })))
}

// PUT /api/tasks/comments/{commentId}
pub async fn update_comment(
    user: AuthenticatedUser,
    data: web::Data<AppState>,
    comment_id: web::Path<String>,
    body: web::Json<UpdateCommentRequest>,
) -> AppResult<HttpResponse> {
    let existing = data
        .store
        .find_comment(&comment_id)
        .await?
        .ok_or(AppError::NotFound("Comment"))?;
    if existing.user != user.id() {
        return Err(AppError::Forbidden("Only the author can edit a comment".to_string()));
    }
    let body = body.into_inner();
    let comment = data
        .tasks
        .update_comment(
            &comment_id,
            CommentChanges {
                title: body.title,
                content: body.content,
            },
        )
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Comment updated", "comment": comment })))
}

// DELETE /api/tasks/{taskId}/comments/{commentId}
pub async fn delete_comment(
    _user: AuthenticatedUser,
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> AppResult<HttpResponse> {
    let (task_id, comment_id) = path.into_inner();
    data.tasks.delete_comment(&task_id, &comment_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Comment deleted and removed from task" })))
}

// ─── FEEDBACK ─────────────────────────────────────────────────────────────────

// PUT /api/tasks/add-subtask-feedback/{subtaskId}
pub async fn add_subtask_feedback(
    user: AuthenticatedUser,
    data: web::Data<AppState>,
    subtask_id: web::Path<String>,
    body: web::Json<FeedbackRequest>,
) -> AppResult<HttpResponse> {
    acting_as(&user, &body.user_id)?;
    let subtask = data
        .tasks
        .add_subtask_feedback(&subtask_id, &body.user_id, &body.feedback)
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Feedback added to subtask", "subtask": subtask })))
}

// PUT /api/tasks/add-task-feedback/{taskId}
pub async fn add_task_feedback(
    user: AuthenticatedUser,
    data: web::Data<AppState>,
    task_id: web::Path<String>,
    body: web::Json<FeedbackRequest>,
) -> AppResult<HttpResponse> {
    acting_as(&user, &body.user_id)?;
    let task = data
        .tasks
        .add_task_feedback(&task_id, &body.user_id, &body.feedback)
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Feedback added to task", "task": task })))
}

// PUT /api/tasks/summarize-feedback/{taskId}
pub async fn summarize_feedback(
    _user: AuthenticatedUser,
    data: web::Data<AppState>,
    task_id: web::Path<String>,
    body: web::Json<SummarizeRequest>,
) -> AppResult<HttpResponse> {
    let task = data.tasks.summarize(&task_id, &body.conclusion).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Task summarized and completed",
        "summary": task.summary,
        "conclusion": task.conclusion,
    })))
}

#[cfg(test)]
mod tests {
    use actix_web::{test, App};
    use serde_json::{json, Value};

    use crate::store::Store;
    use crate::testing::{bearer, seed_subtask, seed_task, seed_user, test_app_state};

    #[actix_web::test]
    async fn create_requires_a_token() {
        let (state, _store, _push, _mail) = test_app_state();
        let app = test::init_service(App::new().configure(crate::configure(state))).await;

        let req = test::TestRequest::post()
            .uri("/api/tasks")
            .set_json(json!({
                "title": "t",
                "startDate": "2026-01-01T00:00:00Z",
                "endDate": "2026-01-02T00:00:00Z",
            }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 401);

        let req = test::TestRequest::get()
            .uri("/api/tasks/anything")
            .insert_header(("Authorization", "Bearer not-a-jwt"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 401);
    }

    #[actix_web::test]
    async fn create_returns_201_with_the_task() {
        let (state, store, _push, _mail) = test_app_state();
        let owner = seed_user(&store, "owner").await;
        let app = test::init_service(App::new().configure(crate::configure(state))).await;

        let req = test::TestRequest::post()
            .uri("/api/tasks")
            .insert_header(("Authorization", bearer(&owner.id)))
            .set_json(json!({
                "title": "Launch",
                "startDate": "2026-01-01T00:00:00Z",
                "endDate": "2026-01-09T00:00:00Z",
                "priority": "high",
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 201);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["task"]["status"], "pending");
        assert_eq!(body["task"]["priority"], "high");
        assert_eq!(body["task"]["createdBy"], owner.id);
    }

    #[actix_web::test]
    async fn progress_route_rolls_up_and_rejects_bad_deltas() {
        let (state, store, _push, _mail) = test_app_state();
        let owner = seed_user(&store, "owner").await;
        let task = seed_task(&store, &owner.id, &[]).await;
        let first = seed_subtask(&store, &task.id, &owner.id, 40.0).await;
        seed_subtask(&store, &task.id, &owner.id, 60.0).await;
        let app = test::init_service(App::new().configure(crate::configure(state))).await;

        let req = test::TestRequest::put()
            .uri(&format!("/api/tasks/update-subtask-progress/{}", first.id))
            .insert_header(("Authorization", bearer(&owner.id)))
            .set_json(json!({ "progress": 10 }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["taskProgress"], 55.0);

        let req = test::TestRequest::put()
            .uri(&format!("/api/tasks/update-subtask-progress/{}", first.id))
            .insert_header(("Authorization", bearer(&owner.id)))
            .set_json(json!({ "progress": 80 }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400);
    }

    #[actix_web::test]
    async fn duplicate_comment_returns_400() {
        let (state, store, _push, _mail) = test_app_state();
        let owner = seed_user(&store, "owner").await;
        let task = seed_task(&store, &owner.id, &[&owner.id]).await;
        let app = test::init_service(App::new().configure(crate::configure(state))).await;

        let mut statuses = Vec::new();
        for _ in 0..2 {
            let req = test::TestRequest::put()
                .uri(&format!("/api/tasks/comment-main-task/{}", task.id))
                .insert_header(("Authorization", bearer(&owner.id)))
                .set_json(json!({ "userId": owner.id, "title": "Note", "content": "same" }))
                .to_request();
            statuses.push(test::call_service(&app, req).await.status().as_u16());
        }
        assert_eq!(statuses, vec![200, 400]);
        assert_eq!(store.comment_count(), 1);
    }

    #[actix_web::test]
    async fn body_user_must_match_token() {
        let (state, store, _push, _mail) = test_app_state();
        let owner = seed_user(&store, "owner").await;
        let other = seed_user(&store, "other").await;
        let task = seed_task(&store, &owner.id, &[]).await;
        let app = test::init_service(App::new().configure(crate::configure(state))).await;

        let req = test::TestRequest::put()
            .uri(&format!("/api/tasks/add-subtask/{}", task.id))
            .insert_header(("Authorization", bearer(&other.id)))
            .set_json(json!({ "userId": owner.id, "title": "sneaky" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 403);
    }

    #[actix_web::test]
    async fn delete_and_missing_task() {
        let (state, store, _push, _mail) = test_app_state();
        let owner = seed_user(&store, "owner").await;
        let task = seed_task(&store, &owner.id, &[]).await;
        let app = test::init_service(App::new().configure(crate::configure(state))).await;

        let req = test::TestRequest::delete()
            .uri(&format!("/api/tasks/{}", task.id))
            .insert_header(("Authorization", bearer(&owner.id)))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 200);
        assert!(store.find_task(&task.id).await.unwrap().is_none());

        let req = test::TestRequest::get()
            .uri(&format!("/api/tasks/{}", task.id))
            .insert_header(("Authorization", bearer(&owner.id)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Task not found");
    }

    #[actix_web::test]
    async fn summarize_completes_the_task() {
        let (state, store, _push, _mail) = test_app_state();
        let owner = seed_user(&store, "owner").await;
        let task = seed_task(&store, &owner.id, &[&owner.id]).await;
        let app = test::init_service(App::new().configure(crate::configure(state))).await;

        let req = test::TestRequest::put()
            .uri(&format!("/api/tasks/add-task-feedback/{}", task.id))
            .insert_header(("Authorization", bearer(&owner.id)))
            .set_json(json!({ "userId": owner.id, "feedback": "great" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 200);

        let req = test::TestRequest::put()
            .uri(&format!("/api/tasks/summarize-feedback/{}", task.id))
            .insert_header(("Authorization", bearer(&owner.id)))
            .set_json(json!({ "conclusion": "done" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["summary"], json!(["great"]));

        let req = test::TestRequest::put()
            .uri(&format!("/api/tasks/summarize-feedback/{}", task.id))
            .insert_header(("Authorization", bearer(&owner.id)))
            .set_json(json!({ "conclusion": "again" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400);
    }
}
