// notifications.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::app_state::AppState;
use crate::error::{AppError, AppResult};
use crate::fanout::push::is_valid_push_token;
use crate::fanout::Notice;
use crate::middleware::AuthenticatedUser;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ManualNotification {
    pub user_ids: Vec<String>,
    pub title: String,
    #[serde(default)]
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DirectPush {
    pub push_tokens: Vec<String>,
    #[serde(default)]
    pub user_ids: Vec<String>,
    pub title: String,
    #[serde(default)]
    pub subject: String,
    pub message: String,
}

// GET /api/notifications/user/{userId}
pub async fn list_for_user(
    user: AuthenticatedUser,
    data: web::Data<AppState>,
    user_id: web::Path<String>,
) -> AppResult<HttpResponse> {
    if user.id() != user_id.as_str() {
        return Err(AppError::Forbidden(
            "Cannot access other user's notifications".to_string(),
        ));
    }
    let notifications = data.store.list_notifications_for(&user_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "notifications": notifications })))
}

// PUT /api/notifications/{id}
pub async fn mark_read(
    user: AuthenticatedUser,
    data: web::Data<AppState>,
    id: web::Path<String>,
) -> AppResult<HttpResponse> {
    let notification = data
        .store
        .find_notification(&id)
        .await?
        .ok_or(AppError::NotFound("Notification"))?;
    if notification.to != user.id() {
        return Err(AppError::Forbidden(
            "Only the recipient can mark a notification as read".to_string(),
        ));
    }
    if !notification.is_read {
        data.store.mark_notification_read(&id).await?;
    }
    Ok(HttpResponse::Ok().json(json!({ "message": "Notification marked as read" })))
}

// POST /api/notifications
pub async fn create_manual(
    user: AuthenticatedUser,
    data: web::Data<AppState>,
    body: web::Json<ManualNotification>,
) -> AppResult<HttpResponse> {
    let body = body.into_inner();
    if body.user_ids.is_empty() {
        return Err(AppError::invalid("userIds must not be empty"));
    }
    if body.title.trim().is_empty() || body.message.trim().is_empty() {
        return Err(AppError::invalid("Title and message are required"));
    }
    let count = body.user_ids.len();

    // Records only; an empty token override keeps the push channel out of it.
    data.fanout
        .notify(
            Notice::new(body.title, body.subject, body.message)
                .from_user(user.id())
                .to(body.user_ids)
                .with_push_tokens(Vec::new()),
        )
        .await?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Notifications created",
        "count": count,
    })))
}

// POST /api/notifications/push
// Pushes to the given devices and records the notice for `userIds`.
pub async fn send_push(
    user: AuthenticatedUser,
    data: web::Data<AppState>,
    body: web::Json<DirectPush>,
) -> AppResult<HttpResponse> {
    let body = body.into_inner();
    if let Some(bad) = body.push_tokens.iter().find(|t| !is_valid_push_token(t)) {
        return Err(AppError::invalid(format!("Invalid push token: {}", bad)));
    }

    let result = data
        .fanout
        .notify(
            Notice::new(body.title, body.subject, body.message)
                .from_user(user.id())
                .to(body.user_ids)
                .with_push_tokens(body.push_tokens)
                .requiring_tokens(),
        )
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Notification sent",
        "expoResult": result,
    })))
}
