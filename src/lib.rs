//! Social networking backend: signup and login with cookie sessions, profiles,
//! follows, posts with likes and comments, and notifications.
//!
//! Handlers speak `spin_sdk::http` requests and responses. The same router
//! runs as a Spin component on `wasm32` (documents in the Spin key-value
//! store) and behind actix-web natively (documents in memory).

use spin_sdk::http::{Method, Request, Response};
use tracing::{debug, error};

pub mod auth;
pub mod config;
pub mod core;
pub mod follow;
pub mod models;
#[cfg(not(target_arch = "wasm32"))]
pub mod native;
pub mod notifications;
pub mod posts;
pub mod session;
pub mod users;

use crate::config::Settings;
use crate::core::errors::ApiError;
use crate::core::helpers::path_param;
use crate::core::images::ImageStore;
use crate::core::store::DocumentStore;

/// Everything a handler needs for one request.
#[derive(Clone, Copy)]
pub struct Api<'a> {
    pub store: &'a dyn DocumentStore,
    pub images: &'a dyn ImageStore,
    pub settings: &'a Settings,
}

impl<'a> Api<'a> {
    pub fn new(store: &'a dyn DocumentStore, images: &'a dyn ImageStore, settings: &'a Settings) -> Self {
        Self { store, images, settings }
    }

    /// Routes `req` and turns any error into its JSON response.
    pub fn handle(&self, req: &Request) -> Response {
        match route(self, req) {
            Ok(resp) => resp,
            Err(err) => {
                match &err {
                    ApiError::Internal(detail) => {
                        error!(path = req.path(), error = %detail, "request failed");
                    }
                    other => debug!(path = req.path(), error = %other, "request rejected"),
                }
                err.into()
            }
        }
    }
}

pub fn route(api: &Api, req: &Request) -> Result<Response, ApiError> {
    let path = req.path();

    match (req.method(), path) {
        (Method::Post, "/api/auth/signup") => auth::signup(api, req),
        (Method::Post, "/api/auth/login") => auth::login(api, req),
        (Method::Post, "/api/auth/logout") => auth::logout(api, req),
        (Method::Get, "/api/auth/me") => auth::get_me(api, req),

        (Method::Post, "/api/users/update") => users::update_profile(api, req),
        (Method::Get, p) if p.starts_with("/api/users/profile/") => {
            users::get_user_profile(api, req, path_param(p, "/api/users/profile/"))
        }
        (Method::Post, p) if p.starts_with("/api/users/follow/") => {
            follow::handle_follow(api, req, path_param(p, "/api/users/follow/"))
        }
        (Method::Get, p) if p.starts_with("/api/users/followers/") => {
            follow::get_followers_list(api, req, path_param(p, "/api/users/followers/"))
        }
        (Method::Get, p) if p.starts_with("/api/users/following/") => {
            follow::get_following_list(api, req, path_param(p, "/api/users/following/"))
        }

        (Method::Get, "/api/posts/all") => posts::get_all_posts(api, req),
        (Method::Get, "/api/posts/following") => posts::get_following_posts(api, req),
        (Method::Post, "/api/posts/create") => posts::handle_create_post(api, req),
        (Method::Get, p) if p.starts_with("/api/posts/likes/") => {
            posts::get_liked_posts(api, req, path_param(p, "/api/posts/likes/"))
        }
        (Method::Get, p) if p.starts_with("/api/posts/user/") => {
            posts::get_user_posts(api, req, path_param(p, "/api/posts/user/"))
        }
        (Method::Post, p) if p.starts_with("/api/posts/like/") => {
            posts::handle_like(api, req, path_param(p, "/api/posts/like/"))
        }
        (Method::Post, p) if p.starts_with("/api/posts/comment/") => {
            posts::handle_comment(api, req, path_param(p, "/api/posts/comment/"))
        }
        (Method::Delete, p) if p.starts_with("/api/posts/") => {
            posts::handle_delete_post(api, req, path_param(p, "/api/posts/"))
        }

        (Method::Get, "/api/notifications") => notifications::get_notifications(api, req),

        _ => Err(ApiError::not_found("No route found")),
    }
}

#[cfg(target_arch = "wasm32")]
#[spin_sdk::http_component]
fn handle_request(req: Request) -> anyhow::Result<Response> {
    let store = crate::core::store::KvStore::open_default()?;
    let images = crate::core::images::LinkImageStore;
    let settings = Settings::from_env();

    Ok(Api::new(&store, &images, &settings).handle(&req))
}
