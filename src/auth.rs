use std::sync::OnceLock;

use serde::Deserialize;
use spin_sdk::http::{Request, Response};
use tracing::{info, warn};

use crate::config::*;
use crate::core::cookies::{bearer_token, get_cookie};
use crate::core::db;
use crate::core::errors::ApiError;
use crate::core::helpers::{
    hash_password, is_valid_email, json_response, json_response_with_cookie, new_id, now_iso, read_json,
    sanitize_text, verify_password,
};
use crate::models::id_set::IdSet;
use crate::models::models::{PublicUser, User};
use crate::session::{cleared_cookie, issue_token, session_cookie, verify_token};
use crate::Api;

#[derive(Deserialize, Default, Debug)]
#[serde(rename_all = "camelCase", default)]
pub struct SignupRequest {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Default, Debug)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// A user together with a freshly minted session token.
pub struct Session {
    pub user: User,
    pub token: String,
}

pub fn register_user(api: &Api, input: SignupRequest) -> Result<Session, ApiError> {
    let username = input.username.trim();
    let full_name = input.full_name.trim();
    let email = input.email.trim();

    if username.is_empty() || full_name.is_empty() || email.is_empty() || input.password.is_empty() {
        return Err(ApiError::validation("All fields are required"));
    }
    if !is_valid_email(email) {
        return Err(ApiError::validation("Invalid email format"));
    }
    if sanitize_text(username) != username {
        return Err(ApiError::validation("Username contains invalid characters"));
    }
    if db::username_taken(api.store, username)? {
        return Err(ApiError::validation("User already exists"));
    }
    if db::email_taken(api.store, email)? {
        return Err(ApiError::validation("Email already exists"));
    }
    if input.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters long"
        )));
    }

    let now = now_iso();
    let user = User {
        id: new_id(),
        username: username.to_string(),
        full_name: sanitize_text(full_name),
        email: email.to_string(),
        password: hash_password(&input.password, api.settings)?,
        followers: IdSet::new(),
        following: IdSet::new(),
        profile_img: String::new(),
        cover_img: String::new(),
        bio: String::new(),
        link: String::new(),
        liked_posts: IdSet::new(),
        created_at: now.clone(),
        updated_at: now,
    };
    db::insert_user(api.store, &user)?;

    let token = issue_token(&user.id, api.settings)?;
    info!(user_id = %user.id, username = %user.username, "user signed up");
    Ok(Session { user, token })
}

/// Hash checked when the username is unknown, so both failure paths cost one verification.
fn dummy_hash(api: &Api) -> anyhow::Result<&'static str> {
    static DUMMY: OnceLock<String> = OnceLock::new();
    if let Some(hash) = DUMMY.get() {
        return Ok(hash);
    }
    let hash = hash_password("flock-unknown-user", api.settings)?;
    Ok(DUMMY.get_or_init(|| hash))
}

pub fn authenticate(api: &Api, username: &str, password: &str) -> Result<Session, ApiError> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(ApiError::validation("Username and password are required"));
    }

    let user = match db::find_user_by_username(api.store, username)? {
        Some(user) if verify_password(password, &user.password) => user,
        Some(_) => return Err(ApiError::InvalidCredentials),
        None => {
            let _ = verify_password(password, dummy_hash(api)?);
            return Err(ApiError::InvalidCredentials);
        }
    };

    let token = issue_token(&user.id, api.settings)?;
    info!(user_id = %user.id, "user logged in");
    Ok(Session { user, token })
}

/// Resolves the caller from the session cookie (or a bearer token).
pub fn validate_session(api: &Api, req: &Request) -> Result<User, ApiError> {
    let token = get_cookie(req, SESSION_COOKIE)
        .or_else(|| bearer_token(req))
        .ok_or(ApiError::Unauthorized)?;

    let claims = verify_token(&token, api.settings).map_err(|e| {
        warn!(reason = %e, "rejected session token");
        ApiError::Unauthorized
    })?;

    db::find_user(api.store, &claims.sub)?.ok_or_else(|| {
        warn!(user_id = %claims.sub, "session for unknown user");
        ApiError::Unauthorized
    })
}

// === HTTP Handlers ===

pub fn signup(api: &Api, req: &Request) -> Result<Response, ApiError> {
    let input: SignupRequest = read_json(req)?;
    let session = register_user(api, input)?;

    json_response_with_cookie(
        201,
        &PublicUser::from(&session.user),
        &session_cookie(&session.token, api.settings),
    )
}

pub fn login(api: &Api, req: &Request) -> Result<Response, ApiError> {
    let creds: LoginRequest = read_json(req)?;
    let session = authenticate(api, &creds.username, &creds.password)?;

    json_response_with_cookie(
        200,
        &PublicUser::from(&session.user),
        &session_cookie(&session.token, api.settings),
    )
}

pub fn logout(api: &Api, _req: &Request) -> Result<Response, ApiError> {
    json_response_with_cookie(
        200,
        &serde_json::json!({ "message": "Logged out successfully" }),
        &cleared_cookie(api.settings),
    )
}

pub fn get_me(api: &Api, req: &Request) -> Result<Response, ApiError> {
    let user = validate_session(api, req)?;
    json_response(200, &PublicUser::from(&user))
}
