use std::sync::OnceLock;

use actix_web::{web, HttpResponse};
use bcrypt::{hash, verify};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::{info, warn};
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::app_state::AppState;
use crate::error::{AppError, AppResult};
use crate::fanout::push::is_valid_push_token;
use crate::fanout::TemplateEmail;
use crate::middleware::AuthenticatedUser;
use crate::models::{
    insert_unique, new_id, remove_id, EmailConfirmation, PasswordReset, Position, PublicUser, User,
};

const TOKEN_TTL_HOURS: i64 = 24;
const PASSWORD_HASH_COST: u32 = 10;
const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

// JWT Creation
pub fn create_jwt(user_id: &str, secret: &str) -> AppResult<String> {
    let expiration = Utc::now() + Duration::hours(TOKEN_TTL_HOURS);
    let claims = Claims {
        sub: user_id.to_string(),
        exp: expiration.timestamp() as usize,
    };
    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?)
}

// JWT Validation
pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

fn is_valid_email(email: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static regex compiles"))
        .is_match(email)
}

fn required(value: &str, message: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::invalid(message));
    }
    Ok(value.to_string())
}

fn check_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::invalid(format!(
            "Please enter a password with {} or more characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

fn one_time_code() -> String {
    rand::thread_rng().gen_range(10_000..=99_999).to_string()
}

async fn load_user(data: &AppState, id: &str) -> AppResult<User> {
    data.store.find_user(id).await?.ok_or(AppError::NotFound("User"))
}

// ─── REQUEST PAYLOADS ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterRequest {
    pub user_name: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub title: String,
    pub profile_picture: Option<String>,
    pub profile_color: Option<String>,
    pub position: Option<Position>,
    pub dob: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoginRequest {
    pub user_name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserNameQuery {
    pub user_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub profile_picture: Option<String>,
    pub profile_color: Option<String>,
    pub position: Option<Position>,
    pub dob: Option<DateTime<Utc>>,
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PushTokenRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SendConfirmationRequest {
    pub email: String,
    #[serde(alias = "full_name")]
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyEmailRequest {
    pub email: String,
    pub code: String,
}

// ─── ENDPOINTS ─────────────────────────────────────────────────────────────

// POST /api/auth/register
pub async fn register(
    data: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> AppResult<HttpResponse> {
    let body = body.into_inner();
    let user_name = required(&body.user_name, "Username is required")?;
    let email = body.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::invalid("Please include a valid email"));
    }
    let full_name = required(&body.full_name, "Full name is required")?;
    let title = required(&body.title, "Title is required")?;
    check_password(&body.password)?;

    if data.store.find_user_by_user_name(&user_name).await?.is_some()
        || data.store.find_user_by_email(&email).await?.is_some()
    {
        return Err(AppError::conflict("Username or email already exists"));
    }

    let user = User {
        id: new_id(),
        user_name,
        email,
        email_confirmed: false,
        full_name,
        title,
        profile_picture: body.profile_picture.unwrap_or_default(),
        profile_color: body.profile_color,
        position: body.position.unwrap_or_default(),
        dob: body.dob,
        password: hash(&body.password, PASSWORD_HASH_COST)?,
        member_of_teams: Vec::new(),
        manager_of_teams: Vec::new(),
        supervisor_of_teams: Vec::new(),
        push_tokens: Vec::new(),
        tasks: Vec::new(),
        created_at: Utc::now(),
    };
    data.store.insert_user(&user).await?;
    let token = create_jwt(&user.id, &data.config.jwt_secret)?;
    info!("User {} registered as {}", user.id, user.user_name);

    Ok(HttpResponse::Ok().json(json!({
        "message": "User registered successfully",
        "user": PublicUser::from(user),
        "token": token,
    })))
}

// POST /api/auth/login
pub async fn login(
    data: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> AppResult<HttpResponse> {
    let invalid = || AppError::Unauthorized("Invalid Username or Password".to_string());
    let user = data
        .store
        .find_user_by_user_name(body.user_name.trim())
        .await?
        .ok_or_else(invalid)?;
    if !verify(&body.password, &user.password).unwrap_or(false) {
        return Err(invalid());
    }

    let token = create_jwt(&user.id, &data.config.jwt_secret)?;
    info!("User {} logged in", user.id);
    Ok(HttpResponse::Ok().json(json!({ "user": PublicUser::from(user), "token": token })))
}

// GET /api/auth/check-username?userName=
pub async fn check_username(
    data: web::Data<AppState>,
    query: web::Query<UserNameQuery>,
) -> AppResult<HttpResponse> {
    let user_name = required(
        query.user_name.as_deref().unwrap_or_default(),
        "Username is required",
    )?;
    let taken = data.store.find_user_by_user_name(&user_name).await?.is_some();
    let message = if taken {
        "Username is already taken"
    } else {
        "Username is available"
    };
    Ok(HttpResponse::Ok().json(json!({ "unique": !taken, "message": message })))
}

// GET /api/auth/check-email?email=
pub async fn check_email(
    data: web::Data<AppState>,
    query: web::Query<EmailQuery>,
) -> AppResult<HttpResponse> {
    let email = required(query.email.as_deref().unwrap_or_default(), "Email is required")?
        .to_lowercase();
    let taken = data.store.find_user_by_email(&email).await?.is_some();
    let message = if taken {
        "Email is already taken"
    } else {
        "Email is available"
    };
    Ok(HttpResponse::Ok().json(json!({ "unique": !taken, "message": message })))
}

// PUT /api/auth/profile
pub async fn update_profile(
    user: AuthenticatedUser,
    data: web::Data<AppState>,
    body: web::Json<ProfileUpdate>,
) -> AppResult<HttpResponse> {
    let body = body.into_inner();
    let mut current = load_user(&data, user.id()).await?;

    if let Some(email) = body.email {
        let email = email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(AppError::invalid("Please include a valid email"));
        }
        if let Some(other) = data.store.find_user_by_email(&email).await? {
            if other.id != current.id {
                return Err(AppError::conflict("Email is already taken"));
            }
        }
        current.email = email;
    }
    if let Some(full_name) = body.full_name {
        current.full_name = required(&full_name, "Full name is required")?;
    }
    if let Some(title) = body.title {
        current.title = title;
    }
    if let Some(picture) = body.profile_picture {
        current.profile_picture = picture;
    }
    if let Some(color) = body.profile_color {
        current.profile_color = Some(color);
    }
    if let Some(position) = body.position {
        current.position = position;
    }
    if body.dob.is_some() {
        current.dob = body.dob;
    }

    data.store.replace_user(&current).await?;
    info!("Profile of user {} updated", current.id);
    Ok(HttpResponse::Ok().json(json!({
        "message": "Profile updated successfully",
        "user": PublicUser::from(current),
    })))
}

// POST /api/auth/push-token
pub async fn add_push_token(
    user: AuthenticatedUser,
    data: web::Data<AppState>,
    body: web::Json<PushTokenRequest>,
) -> AppResult<HttpResponse> {
    let token = body.token.trim();
    if !is_valid_push_token(token) {
        return Err(AppError::invalid("Invalid push token"));
    }
    let mut current = load_user(&data, user.id()).await?;
    if insert_unique(&mut current.push_tokens, token) {
        data.store.replace_user(&current).await?;
        info!("Push token registered for user {}", current.id);
    }
    Ok(HttpResponse::Ok().json(json!({
        "message": "Push token saved",
        "pushTokens": current.push_tokens,
    })))
}

// DELETE /api/auth/push-token
pub async fn remove_push_token(
    user: AuthenticatedUser,
    data: web::Data<AppState>,
    body: web::Json<PushTokenRequest>,
) -> AppResult<HttpResponse> {
    let mut current = load_user(&data, user.id()).await?;
    if remove_id(&mut current.push_tokens, body.token.trim()) {
        data.store.replace_user(&current).await?;
        info!("Push token removed for user {}", current.id);
    }
    Ok(HttpResponse::Ok().json(json!({
        "message": "Push token removed",
        "pushTokens": current.push_tokens,
    })))
}

// POST /api/auth/request-reset
pub async fn request_reset(
    data: web::Data<AppState>,
    body: web::Json<ResetRequest>,
) -> AppResult<HttpResponse> {
    let email = required(&body.email, "Email is required")?.to_lowercase();
    let user = data
        .store
        .find_user_by_email(&email)
        .await?
        .ok_or(AppError::NotFound("User"))?;

    data.store.delete_password_resets(&user.id).await?;
    let reset = PasswordReset {
        id: new_id(),
        user: user.id.clone(),
        code: one_time_code(),
        created_at: Utc::now(),
    };
    data.store.insert_password_reset(&reset).await?;

    let template_id = data
        .config
        .brevo
        .as_ref()
        .map(|b| b.reset_template_id)
        .unwrap_or(1);
    let email = TemplateEmail {
        to: user.email.clone(),
        name: Some(user.full_name.clone()),
        template_id,
        params: json!({
            "full_name": user.full_name,
            "code": reset.code,
            "time": reset.created_at.format("%I:%M %p").to_string(),
        }),
    };
    // The code is stored either way; a lost email only means the user asks again.
    if let Err(err) = data.mailer.send_template(&email).await {
        warn!("Reset code email to user {} failed: {}", user.id, err);
    }

    info!("Password reset requested for user {}", user.id);
    Ok(HttpResponse::Ok().json(json!({ "message": "Reset code sent to registered email" })))
}

// PUT /api/auth/reset-password
pub async fn reset_password(
    data: web::Data<AppState>,
    body: web::Json<ResetPasswordRequest>,
) -> AppResult<HttpResponse> {
    let email = required(&body.email, "Email, code, and new password are required")?;
    let code = required(&body.code, "Email, code, and new password are required")?;
    check_password(&body.new_password)?;

    let mut user = data
        .store
        .find_user_by_email(&email.to_lowercase())
        .await?
        .ok_or(AppError::NotFound("User"))?;
    let reset = data
        .store
        .find_password_reset(&user.id, &code)
        .await?
        .ok_or_else(|| AppError::invalid("Invalid or expired code"))?;
    if reset.is_expired(Utc::now()) {
        data.store.delete_password_resets(&user.id).await?;
        return Err(AppError::invalid("Code expired"));
    }

    user.password = hash(&body.new_password, PASSWORD_HASH_COST)?;
    data.store.replace_user(&user).await?;
    data.store.delete_password_resets(&user.id).await?;

    info!("Password reset for user {}", user.id);
    Ok(HttpResponse::Ok().json(json!({ "message": "Password reset successful" })))
}

// POST /api/auth/send-email-confirmation
pub async fn send_email_confirmation(
    data: web::Data<AppState>,
    body: web::Json<SendConfirmationRequest>,
) -> AppResult<HttpResponse> {
    let email = required(&body.email, "Email is required")?.to_lowercase();
    let user = data
        .store
        .find_user_by_email(&email)
        .await?
        .ok_or(AppError::NotFound("User"))?;
    let name = body
        .full_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(&user.full_name)
        .to_string();

    data.store.delete_email_confirmations(&user.id).await?;
    let confirmation = EmailConfirmation {
        id: new_id(),
        user: user.id.clone(),
        code: one_time_code(),
        created_at: Utc::now(),
    };
    data.store.insert_email_confirmation(&confirmation).await?;

    let template_id = data
        .config
        .brevo
        .as_ref()
        .map(|b| b.confirm_template_id)
        .unwrap_or(2);
    let message = TemplateEmail {
        to: user.email.clone(),
        name: Some(name.clone()),
        template_id,
        params: json!({
            "full_name": name,
            "email_code": confirmation.code,
        }),
    };
    if let Err(err) = data.mailer.send_template(&message).await {
        warn!("Confirmation code email to user {} failed: {}", user.id, err);
    }

    info!("Email confirmation requested for user {}", user.id);
    Ok(HttpResponse::Ok().json(json!({ "message": "Confirmation code sent to email" })))
}

// POST /api/auth/verify-email-code
pub async fn verify_email_code(
    data: web::Data<AppState>,
    body: web::Json<VerifyEmailRequest>,
) -> AppResult<HttpResponse> {
    let email = required(&body.email, "Email and code are required")?.to_lowercase();
    let code = required(&body.code, "Email and code are required")?;

    let mut user = data
        .store
        .find_user_by_email(&email)
        .await?
        .ok_or(AppError::NotFound("User"))?;
    let confirmation = data
        .store
        .find_email_confirmation(&user.id, &code)
        .await?
        .ok_or_else(|| AppError::invalid("Invalid or expired code"))?;
    if confirmation.is_expired(Utc::now()) {
        data.store.delete_email_confirmations(&user.id).await?;
        return Err(AppError::invalid("Invalid or expired code"));
    }

    user.email_confirmed = true;
    data.store.replace_user(&user).await?;
    data.store.delete_email_confirmations(&user.id).await?;

    info!("Email confirmed for user {}", user.id);
    Ok(HttpResponse::Ok().json(json!({ "message": "Email confirmed successfully" })))
}

// DELETE /api/auth/delete-account
pub async fn delete_account(
    user: AuthenticatedUser,
    data: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let current = load_user(&data, user.id()).await?;
    if !current.supervisor_of_teams.is_empty() {
        return Err(AppError::conflict(
            "Transfer ownership of your teams before deleting your account",
        ));
    }

    let mut team_ids = current.member_of_teams.clone();
    for id in &current.manager_of_teams {
        insert_unique(&mut team_ids, id);
    }
    for mut team in data.store.find_teams(&team_ids).await? {
        let a = remove_id(&mut team.members, &current.id);
        let b = remove_id(&mut team.managed_by, &current.id);
        if a || b {
            data.store.replace_team(&team).await?;
        }
    }
    data.store.delete_password_resets(&current.id).await?;
    data.store.delete_email_confirmations(&current.id).await?;
    if !data.store.delete_user(&current.id).await? {
        return Err(AppError::NotFound("User"));
    }

    info!("Account {} deleted", current.id);
    Ok(HttpResponse::Ok().json(json!({ "message": "Account deleted successfully" })))
}
