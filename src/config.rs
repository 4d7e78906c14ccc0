use anyhow::{Context, Result};
use std::env;

const MB: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub capacity: f64,
    pub refill_per_sec: f64,
    /// Key clients by `X-Forwarded-For` instead of the socket peer.
    pub trust_proxy: bool,
    pub max_tracked_clients: usize,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub upload_dir: String,
    pub max_receipt_bytes: usize,
    pub max_request_body_bytes: usize,
    pub app_url: String,
    pub cors_origin: String,
    pub bind_addr: String,
    pub smtp: Option<SmtpSettings>,
    pub rate_limit: RateLimitSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let smtp = match env::var("SMTP_HOST") {
            Ok(host) if !host.trim().is_empty() => Some(SmtpSettings {
                host,
                port: parse_or("SMTP_PORT", 587)?,
                user: env::var("SMTP_USER").ok(),
                password: env::var("SMTP_PASSWORD").ok(),
                from: env::var("SMTP_FROM").unwrap_or_else(|_| "no-reply@localhost".to_string()),
            }),
            _ => None,
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            jwt_ttl_hours: parse_or("JWT_TTL_HOURS", 24)?,
            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "./uploads".to_string()),
            max_receipt_bytes: parse_or::<usize>("MAX_RECEIPT_MB", 5)? * MB,
            max_request_body_bytes: parse_or::<usize>("MAX_REQUEST_BODY_MB", 10)? * MB,
            app_url: env::var("NEXT_PUBLIC_APP_URL")
                .or_else(|_| env::var("APP_URL"))
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            cors_origin: env::var("CORS_ALLOWED_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string()),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
            smtp,
            rate_limit: RateLimitSettings {
                capacity: parse_or("RATE_LIMIT_CAPACITY", 60.0)?,
                refill_per_sec: parse_or("RATE_LIMIT_REFILL_PER_SEC", 1.0)?,
                trust_proxy: parse_or("TRUST_PROXY", false)?,
                max_tracked_clients: parse_or("RATE_LIMIT_MAX_CLIENTS", 10_000)?,
            },
        })
    }
}

fn parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} has an invalid value: {}", name, raw)),
        Err(_) => Ok(default),
    }
}
