// src/main.rs

mod app_state;
mod auth;
mod config;
mod error;
mod fanout;
mod lifecycle;
mod membership;
mod middleware;
mod models;
mod notifications;
mod progress;
mod store;
mod task_management;
mod team_management;
#[cfg(test)]
mod testing;

use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{http, middleware::Logger, web, App, HttpServer};
use env_logger::Env;
use log::{error, info, warn};

use crate::app_state::AppState;
use crate::config::Config;
use crate::error::AppError;
use crate::fanout::{BrevoMailer, DisabledMailer, EmailChannel, ExpoPushClient};
use crate::middleware::Authentication;
use crate::store::MongoStore;

/// Routes and shared state, mounted by `main` and by handler tests.
pub fn configure(state: AppState) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg: &mut web::ServiceConfig| {
        cfg.app_data(web::Data::new(state))
            .app_data(
                web::JsonConfig::default()
                    .error_handler(|err, _req| AppError::invalid(err.to_string()).into()),
            )
            .app_data(
                web::QueryConfig::default()
                    .error_handler(|err, _req| AppError::invalid(err.to_string()).into()),
            )
            .service(
                web::scope("/api")
                    .wrap(Authentication)
                    // AUTH
                    .service(
                        web::scope("/auth")
                            .route("/register", web::post().to(auth::register))
                            .route("/login", web::post().to(auth::login))
                            .route("/check-username", web::get().to(auth::check_username))
                            .route("/check-email", web::get().to(auth::check_email))
                            .route("/profile", web::put().to(auth::update_profile))
                            .route("/push-token", web::post().to(auth::add_push_token))
                            .route("/push-token", web::delete().to(auth::remove_push_token))
                            .route("/request-reset", web::post().to(auth::request_reset))
                            .route("/reset-password", web::put().to(auth::reset_password))
                            .route(
                                "/send-email-confirmation",
                                web::post().to(auth::send_email_confirmation),
                            )
                            .route("/verify-email-code", web::post().to(auth::verify_email_code))
                            .route("/delete-account", web::delete().to(auth::delete_account)),
                    )
                    // TASKS
                    .service(
                        web::scope("/tasks")
                            .route("", web::post().to(task_management::create_task))
                            .route("/user/{userId}", web::get().to(task_management::get_user_tasks))
                            .route(
                                "/add-subtask/{taskId}",
                                web::put().to(task_management::add_subtask),
                            )
                            .route(
                                "/update-subtask-progress/{subtaskId}",
                                web::put().to(task_management::update_subtask_progress),
                            )
                            .route(
                                "/subtasks/{subtaskId}",
                                web::put().to(task_management::update_subtask),
                            )
                            .route(
                                "/comment-main-task/{taskId}",
                                web::put().to(task_management::add_comment),
                            )
                            .route(
                                "/comments/{commentId}",
                                web::put().to(task_management::update_comment),
                            )
                            .route(
                                "/add-subtask-feedback/{subtaskId}",
                                web::put().to(task_management::add_subtask_feedback),
                            )
                            .route(
                                "/add-task-feedback/{taskId}",
                                web::put().to(task_management::add_task_feedback),
                            )
                            .route(
                                "/summarize-feedback/{taskId}",
                                web::put().to(task_management::summarize_feedback),
                            )
                            .route("/{taskId}/details", web::put().to(task_management::update_task))
                            .route(
                                "/{taskId}/unassign-participants",
                                web::put().to(task_management::unassign_participants),
                            )
                            .route(
                                "/{taskId}/subtasks/{subtaskId}",
                                web::delete().to(task_management::delete_subtask),
                            )
                            .route(
                                "/{taskId}/comments/{commentId}",
                                web::delete().to(task_management::delete_comment),
                            )
                            .route("/{taskId}", web::get().to(task_management::get_task))
                            .route("/{taskId}", web::put().to(task_management::add_participants))
                            .route("/{taskId}", web::delete().to(task_management::delete_task)),
                    )
                    // TEAMS
                    .service(
                        web::scope("/team")
                            .route("", web::post().to(team_management::create_team))
                            .route("/join", web::post().to(team_management::join_team))
                            .route("/approve-join", web::put().to(team_management::approve_join))
                            .route("/reject-join/{id}", web::delete().to(team_management::reject_join))
                            .route("/user/{userId}", web::get().to(team_management::get_user_teams))
                            .route(
                                "/remove-member/{userId}",
                                web::put().to(team_management::remove_member),
                            )
                            .route(
                                "/bulk-remove-members/{teamId}",
                                web::put().to(team_management::bulk_remove_members),
                            )
                            .route("/leave/{teamId}", web::put().to(team_management::leave_team))
                            .route(
                                "/transfer-ownership/{teamId}",
                                web::put().to(team_management::transfer_ownership),
                            )
                            .route(
                                "/{teamId}/join-requests",
                                web::get().to(team_management::list_join_requests),
                            )
                            .route("/{teamId}/managers", web::put().to(team_management::add_manager))
                            .route("/{teamId}", web::put().to(team_management::update_team))
                            .route("/{teamId}", web::delete().to(team_management::delete_team)),
                    )
                    // NOTIFICATIONS
                    .service(
                        web::scope("/notifications")
                            .route("", web::post().to(notifications::create_manual))
                            .route("/push", web::post().to(notifications::send_push))
                            .route("/user/{userId}", web::get().to(notifications::list_for_user))
                            .route("/{id}", web::put().to(notifications::mark_read)),
                    ),
            );
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::from_env().map_err(|e| {
        error!("Invalid configuration: {}", e);
        io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
    })?;

    let store = MongoStore::init(&config.mongo_uri, &config.database_name)
        .await
        .map_err(|e| {
            error!("Could not connect to MongoDB: {}", e);
            io::Error::new(io::ErrorKind::Other, e.to_string())
        })?;
    if let Err(e) = store.ensure_indexes().await {
        warn!("Creating indexes failed: {}", e);
    }

    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

    let push = Arc::new(ExpoPushClient::new(http.clone(), config.expo_push_url.clone()));
    let mailer: Arc<dyn EmailChannel> = match &config.brevo {
        Some(brevo) => Arc::new(BrevoMailer::new(http.clone(), brevo.clone())),
        None => {
            warn!("BREVO_API_KEY is not set; password reset emails will not be sent");
            Arc::new(DisabledMailer)
        }
    };

    let state = AppState::new(Arc::new(store), push, mailer, config.clone());

    info!("Server running at http://{}", config.bind_address);
    info!("Allowed CORS Origin: {}", config.frontend_origin);

    let frontend_origin = config.frontend_origin.clone();
    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                http::header::CONTENT_TYPE,
                http::header::ACCEPT,
                http::header::AUTHORIZATION,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .configure(configure(state.clone()))
    })
    .bind(&config.bind_address)?
    .run()
    .await
}
