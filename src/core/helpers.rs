use std::collections::HashSet;
use std::sync::OnceLock;

use ammonia::Builder;
use anyhow::Context;
use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use rand::rngs::OsRng;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use spin_sdk::http::{Request, Response};
use uuid::Uuid;

use crate::config::Settings;
use crate::core::errors::ApiError;

pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn validate_uuid(id: &str) -> bool {
    Uuid::parse_str(id).is_ok()
}

fn argon2(settings: &Settings) -> anyhow::Result<Argon2<'static>> {
    let params = Params::new(settings.password_memory_kib, settings.password_iterations, 1, None)
        .map_err(|e| anyhow::anyhow!("Invalid password hash parameters: {}", e))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

pub fn hash_password(password: &str, settings: &Settings) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    argon2(settings)?
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))
}

/// Verifies with the parameters recorded in `hash`, not the current settings.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

fn email_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,4}$").expect("email regex should compile")
    })
}

pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email)
}

/// Plain text only: every tag is stripped.
///
/// ammonia escapes the text it keeps; that escaping is undone so `&`, `<`
/// and `>` are stored as typed and a second pass leaves the text unchanged.
pub fn sanitize_text(text: &str) -> String {
    let cleaned = Builder::default().tags(HashSet::new()).clean(text).to_string();
    html_escape::decode_html_entities(&cleaned).into_owned()
}

pub fn read_json<T: DeserializeOwned>(req: &Request) -> Result<T, ApiError> {
    let body = req.body();
    let body = if body.is_empty() { b"{}".as_slice() } else { body };
    serde_json::from_slice(body).map_err(|_| ApiError::validation("Invalid request body"))
}

pub fn json_response<T: Serialize>(status: u16, value: &T) -> Result<Response, ApiError> {
    let body = serde_json::to_vec(value).context("encoding response body")?;
    Ok(Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(body)
        .build())
}

pub fn json_response_with_cookie<T: Serialize>(
    status: u16,
    value: &T,
    cookie: &str,
) -> Result<Response, ApiError> {
    let body = serde_json::to_vec(value).context("encoding response body")?;
    Ok(Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .header("set-cookie", cookie)
        .body(body)
        .build())
}

pub fn message(status: u16, text: &str) -> Result<Response, ApiError> {
    json_response(status, &serde_json::json!({ "message": text }))
}

/// Path segment after `prefix`, or empty when the path does not start with it.
pub fn path_param<'a>(path: &'a str, prefix: &str) -> &'a str {
    path.strip_prefix(prefix).unwrap_or_default().trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap_settings() -> Settings {
        Settings {
            password_memory_kib: Params::MIN_M_COST,
            password_iterations: 1,
            ..Settings::default()
        }
    }

    #[test]
    fn email_pattern() {
        assert!(is_valid_email("al@x.com"));
        assert!(is_valid_email("first.last-1_x@mail.example.org"));
        assert!(!is_valid_email("al@x"));
        assert!(!is_valid_email("al@x.c"));
        assert!(!is_valid_email("al@x.comma"));
        assert!(!is_valid_email("a l@x.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn password_hash_verifies_only_the_same_password() {
        let settings = cheap_settings();
        let hash = hash_password("secret1", &settings).unwrap();
        assert_ne!(hash, "secret1");
        assert!(verify_password("secret1", &hash));
        assert!(!verify_password("secret2", &hash));
        assert!(!verify_password("secret1", "not a phc string"));
    }

    #[test]
    fn hashes_are_salted() {
        let settings = cheap_settings();
        let a = hash_password("same", &settings).unwrap();
        let b = hash_password("same", &settings).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn sanitize_strips_markup() {
        assert_eq!(sanitize_text("<script>alert(1)</script>hi"), "hi");
        assert_eq!(sanitize_text("<b>bold</b>"), "bold");
    }

    #[test]
    fn sanitize_keeps_special_characters() {
        assert_eq!(sanitize_text("Tom & Jerry"), "Tom & Jerry");
        assert_eq!(sanitize_text("if a < b && c > d"), "if a < b && c > d");
        assert_eq!(sanitize_text("\"quoted\" 'text'"), "\"quoted\" 'text'");

        let once = sanitize_text("Tom & Jerry <i>again</i>");
        assert_eq!(once, "Tom & Jerry again");
        assert_eq!(sanitize_text(&once), once);
    }

    #[test]
    fn path_params() {
        assert_eq!(path_param("/api/posts/like/abc", "/api/posts/like/"), "abc");
        assert_eq!(path_param("/api/posts/like/abc/", "/api/posts/like/"), "abc");
        assert_eq!(path_param("/other", "/api/posts/like/"), "");
    }
}
