use std::fmt::Display;
use std::str::FromStr;

use tracing::warn;

pub const SESSION_COOKIE: &str = "jwt";
pub const MIN_PASSWORD_LENGTH: usize = 6;
pub const MAX_POST_LENGTH: usize = 5000;
pub const MAX_COMMENT_LENGTH: usize = 1000;
pub const MAX_BIO_LENGTH: usize = 500;

pub const FEED_KEY: &str = "feed";

const DEV_SESSION_SECRET: &str = "flock-development-secret-do-not-deploy";

pub fn user_key(id: &str) -> String {
    format!("user:{}", id)
}

pub fn username_key(username: &str) -> String {
    format!("username:{}", username)
}

pub fn email_key(email: &str) -> String {
    format!("email:{}", email)
}

pub fn post_key(id: &str) -> String {
    format!("post:{}", id)
}

pub fn notification_key(id: &str) -> String {
    format!("notification:{}", id)
}

pub fn inbox_key(user_id: &str) -> String {
    format!("inbox:{}", user_id)
}

/// Runtime settings, read once per process (native) or per request (Spin).
#[derive(Debug, Clone)]
pub struct Settings {
    /// Secret the session token MAC key is derived from.
    /// Env: `FLOCK_SESSION_SECRET`
    pub session_secret: String,

    /// Lifetime of session tokens and of the session cookie.
    /// Env: `FLOCK_SESSION_TTL_DAYS`
    /// Default: `15`
    pub session_ttl_days: i64,

    /// Development mode drops the `Secure` cookie attribute so plain http works.
    /// Env: `FLOCK_ENV=development`
    pub development: bool,

    /// Native listener address.
    /// Env: `FLOCK_HTTP_ADDR`
    /// Default: `0.0.0.0:5000`
    pub http_addr: String,

    /// Argon2id memory cost in KiB.
    /// Env: `FLOCK_PASSWORD_MEMORY_KIB`
    pub password_memory_kib: u32,

    /// Argon2id iteration count.
    /// Env: `FLOCK_PASSWORD_ITERATIONS`
    pub password_iterations: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            session_secret: DEV_SESSION_SECRET.to_string(),
            session_ttl_days: 15,
            development: true,
            http_addr: "0.0.0.0:5000".to_string(),
            password_memory_kib: argon2::Params::DEFAULT_M_COST,
            password_iterations: argon2::Params::DEFAULT_T_COST,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let session_secret = match std::env::var("FLOCK_SESSION_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                warn!("FLOCK_SESSION_SECRET not set, using the development secret");
                defaults.session_secret
            }
        };

        let development = std::env::var("FLOCK_ENV")
            .map(|v| v == "development")
            .unwrap_or(false);

        Self {
            session_secret,
            session_ttl_days: env_or("FLOCK_SESSION_TTL_DAYS", defaults.session_ttl_days),
            development,
            http_addr: std::env::var("FLOCK_HTTP_ADDR").unwrap_or(defaults.http_addr),
            password_memory_kib: env_or("FLOCK_PASSWORD_MEMORY_KIB", defaults.password_memory_kib),
            password_iterations: env_or("FLOCK_PASSWORD_ITERATIONS", defaults.password_iterations),
        }
    }

    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_days * 24 * 60 * 60
    }
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse::<T>().unwrap_or_else(|e| {
            warn!("Invalid {key} value {raw:?}: {e}, using default {default}");
            default
        }),
        Err(_) => default,
    }
}
