use serde::Deserialize;
use spin_sdk::http::{Request, Response};
use tracing::{info, warn};

use crate::auth::validate_session;
use crate::config::*;
use crate::core::db;
use crate::core::errors::ApiError;
use crate::core::helpers::{
    hash_password, is_valid_email, json_response, now_iso, read_json, sanitize_text, verify_password,
};
use crate::core::images::{is_remote_url, public_id_from_url};
use crate::models::models::{PublicUser, User};
use crate::Api;

#[derive(Deserialize, Default, Debug)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub current_password: Option<String>,
    pub new_password: Option<String>,
    pub bio: Option<String>,
    pub link: Option<String>,
    pub profile_img: Option<String>,
    pub cover_img: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn check_image(image: Option<&String>) -> Result<(), ApiError> {
    match image {
        Some(image) if !is_remote_url(image) => Err(ApiError::validation("Invalid image")),
        _ => Ok(()),
    }
}

/// Best-effort release of a hosted image no document points to anymore.
fn release_image(api: &Api, url: &str) {
    if let Some(public_id) = public_id_from_url(url) {
        if let Err(err) = api.images.delete(&public_id) {
            warn!(public_id = %public_id, error = %err, "failed to release image");
        }
    }
}

pub fn update_user_profile(api: &Api, mut user: User, input: UpdateProfileRequest) -> Result<User, ApiError> {
    let before = user.clone();

    match (non_empty(input.current_password), non_empty(input.new_password)) {
        (Some(current), Some(new)) => {
            if !verify_password(&current, &user.password) {
                return Err(ApiError::validation("Current password is incorrect"));
            }
            if new.chars().count() < MIN_PASSWORD_LENGTH {
                return Err(ApiError::validation(format!(
                    "Password must be at least {MIN_PASSWORD_LENGTH} characters long"
                )));
            }
            user.password = hash_password(&new, api.settings)?;
        }
        (None, None) => {}
        _ => {
            return Err(ApiError::validation(
                "Please provide both current password and new password",
            ))
        }
    }

    if let Some(username) = non_empty(input.username) {
        if username != user.username {
            if sanitize_text(&username) != username {
                return Err(ApiError::validation("Username contains invalid characters"));
            }
            if db::username_taken(api.store, &username)? {
                return Err(ApiError::validation("User already exists"));
            }
            user.username = username;
        }
    }

    if let Some(email) = non_empty(input.email) {
        if email != user.email {
            if !is_valid_email(&email) {
                return Err(ApiError::validation("Invalid email format"));
            }
            if db::email_taken(api.store, &email)? {
                return Err(ApiError::validation("Email already exists"));
            }
            user.email = email;
        }
    }

    if let Some(full_name) = non_empty(input.full_name) {
        user.full_name = sanitize_text(&full_name);
    }

    if let Some(bio) = input.bio {
        if bio.chars().count() > MAX_BIO_LENGTH {
            return Err(ApiError::validation(format!(
                "Bio too long (max {MAX_BIO_LENGTH} chars)"
            )));
        }
        user.bio = sanitize_text(bio.trim());
    }

    if let Some(link) = input.link {
        user.link = sanitize_text(link.trim());
    }

    // Old images are only released once the document no longer references them.
    let profile_img = non_empty(input.profile_img);
    let cover_img = non_empty(input.cover_img);
    check_image(profile_img.as_ref())?;
    check_image(cover_img.as_ref())?;

    let mut uploaded = Vec::new();
    for (image, slot) in [(profile_img, &mut user.profile_img), (cover_img, &mut user.cover_img)] {
        let Some(image) = image else { continue };
        match api.images.upload(&image) {
            Ok(url) => {
                *slot = url.clone();
                uploaded.push(url);
            }
            Err(err) => {
                discard_uploads(api, &uploaded, &before);
                return Err(err.into());
            }
        }
    }

    let updated = match write_profile(api, &before.id, user) {
        Ok(updated) => updated,
        Err(err) => {
            discard_uploads(api, &uploaded, &before);
            return Err(err);
        }
    };

    for (old, new) in [
        (&before.profile_img, &updated.profile_img),
        (&before.cover_img, &updated.cover_img),
    ] {
        if !old.is_empty() && old != new {
            release_image(api, old);
        }
    }
    db::reindex_user(api.store, &before, &updated)?;

    info!(user_id = %updated.id, "profile updated");
    Ok(updated)
}

/// Releases images uploaded for an update that was never written.
fn discard_uploads(api: &Api, uploaded: &[String], before: &User) {
    for url in uploaded {
        if *url != before.profile_img && *url != before.cover_img {
            release_image(api, url);
        }
    }
}

/// Copies the edited fields over the stored document.
fn write_profile(api: &Api, id: &str, user: User) -> Result<User, ApiError> {
    // Re-read so relationship sets written since the session lookup are kept.
    db::update_user(api.store, id, |stored| {
        stored.username = user.username;
        stored.email = user.email;
        stored.full_name = user.full_name;
        stored.password = user.password;
        stored.bio = user.bio;
        stored.link = user.link;
        stored.profile_img = user.profile_img;
        stored.cover_img = user.cover_img;
        stored.updated_at = now_iso();
        stored.clone()
    })?
    .ok_or_else(|| ApiError::not_found("User not found"))
}

// === HTTP Handlers ===

pub fn get_user_profile(api: &Api, req: &Request, username: &str) -> Result<Response, ApiError> {
    validate_session(api, req)?;
    let username = urlencoding::decode(username).map_err(|_| ApiError::not_found("User not found"))?;

    let user = db::find_user_by_username(api.store, &username)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    json_response(200, &PublicUser::from(&user))
}

pub fn update_profile(api: &Api, req: &Request) -> Result<Response, ApiError> {
    let user = validate_session(api, req)?;
    let input: UpdateProfileRequest = read_json(req)?;

    let user = update_user_profile(api, user, input)?;
    json_response(200, &PublicUser::from(&user))
}
