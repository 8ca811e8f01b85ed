use serde::{Deserialize, Serialize};

use crate::models::id_set::IdSet;

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub email: String,
    /// Argon2 PHC string, never serialized to clients.
    pub password: String,
    #[serde(default)]
    pub followers: IdSet,
    #[serde(default)]
    pub following: IdSet,
    #[serde(default)]
    pub profile_img: String,
    #[serde(default)]
    pub cover_img: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub liked_posts: IdSet,
    pub created_at: String,
    pub updated_at: String,
}

/// Everything about a user except the password hash.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub followers: IdSet,
    pub following: IdSet,
    pub profile_img: String,
    pub cover_img: String,
    pub bio: String,
    pub link: String,
    pub liked_posts: IdSet,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            email: user.email.clone(),
            followers: user.followers.clone(),
            following: user.following.clone(),
            profile_img: user.profile_img.clone(),
            cover_img: user.cover_img.clone(),
            bio: user.bio.clone(),
            link: user.link.clone(),
            liked_posts: user.liked_posts.clone(),
            created_at: user.created_at.clone(),
            updated_at: user.updated_at.clone(),
        }
    }
}

/// A user as embedded in posts, comments and notifications: no password, no email.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuthorView {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub profile_img: String,
}

impl From<&User> for AuthorView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            profile_img: user.profile_img.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub text: String,
    pub user: String,
    pub created_at: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    /// Owning user id.
    pub user: String,
    pub text: Option<String>,
    pub img: Option<String>,
    #[serde(default)]
    pub likes: IdSet,
    #[serde(default)]
    pub comments: Vec<Comment>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: String,
    pub text: String,
    pub user: Option<AuthorView>,
    pub created_at: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: String,
    pub user: Option<AuthorView>,
    pub text: Option<String>,
    pub img: Option<String>,
    pub likes: IdSet,
    pub comments: Vec<CommentView>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Like,
    Follow,
    Comment,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    #[serde(default)]
    pub read: bool,
    pub created_at: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    pub id: String,
    pub from: Option<AuthorView>,
    pub to: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub read: bool,
    pub created_at: String,
}

/// Claims carried inside a session token.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SessionClaims {
    /// User id.
    pub sub: String,
    /// Issued at, unix seconds.
    pub iat: i64,
    /// Expiry, unix seconds.
    pub exp: i64,
}
