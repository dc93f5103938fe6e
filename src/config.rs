use std::env;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_EXPO_PUSH_URL: &str = "https://exp.host/--/api/v2/push/send";
pub const DEFAULT_BREVO_URL: &str = "https://api.brevo.com/v3/smtp/email";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is not valid: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub mongo_uri: String,
    pub database_name: String,
    pub jwt_secret: String,
    pub bind_address: String,
    pub frontend_origin: String,
    pub expo_push_url: String,
    pub brevo: Option<BrevoConfig>,
    pub http_timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct BrevoConfig {
    pub api_url: String,
    pub api_key: String,
    pub sender_email: String,
    pub sender_name: String,
    pub reset_template_id: i64,
    pub confirm_template_id: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let http_timeout = parse_var("HTTP_TIMEOUT_SECS", 10u64)?;

        // Email sending is optional; without a key the mailer only logs.
        let brevo = match env::var("BREVO_API_KEY") {
            Ok(api_key) if !api_key.trim().is_empty() => Some(BrevoConfig {
                api_url: env::var("BREVO_API_URL")
                    .unwrap_or_else(|_| DEFAULT_BREVO_URL.to_string()),
                api_key,
                sender_email: env::var("BREVO_SENDER_EMAIL")
                    .unwrap_or_else(|_| "info@trellex.com".to_string()),
                sender_name: env::var("BREVO_SENDER_NAME")
                    .unwrap_or_else(|_| "Trellex Support Team".to_string()),
                reset_template_id: parse_var("BREVO_RESET_TEMPLATE_ID", 1i64)?,
                confirm_template_id: parse_var("BREVO_CONFIRM_TEMPLATE_ID", 2i64)?,
            }),
            _ => None,
        };

        Ok(Self {
            mongo_uri: env::var("MONGO_URI").map_err(|_| ConfigError::Missing("MONGO_URI"))?,
            database_name: env::var("DATABASE_NAME").unwrap_or_else(|_| "trellex".to_string()),
            jwt_secret: env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?,
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            frontend_origin: env::var("FRONTEND_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            expo_push_url: env::var("EXPO_PUSH_URL")
                .unwrap_or_else(|_| DEFAULT_EXPO_PUSH_URL.to_string()),
            brevo,
            http_timeout: Duration::from_secs(http_timeout),
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self {
            mongo_uri: "mongodb://localhost:27017".to_string(),
            database_name: "trellex_test".to_string(),
            jwt_secret: "test-secret".to_string(),
            bind_address: "127.0.0.1:0".to_string(),
            frontend_origin: "http://localhost:3000".to_string(),
            expo_push_url: DEFAULT_EXPO_PUSH_URL.to_string(),
            brevo: None,
            http_timeout: Duration::from_secs(1),
        }
    }
}
