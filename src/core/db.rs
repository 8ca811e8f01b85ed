//! Typed access to the documents kept in a [`DocumentStore`].
//!
//! Layout:
//! - `user:{id}` user document, `username:{name}` and `email:{email}` hold the
//!   owning user id and act as unique indexes
//! - `post:{id}` post document, `feed` lists post ids newest first
//! - `notification:{id}` notification document, `inbox:{user}` lists the
//!   notification ids addressed to a user, oldest first

use tracing::debug;

use crate::config::*;
use crate::core::store::{DocumentStore, DocumentStoreExt};
use crate::models::models::{Notification, Post, User};

pub fn find_user(store: &dyn DocumentStore, id: &str) -> anyhow::Result<Option<User>> {
    store.get_json(&user_key(id))
}

pub fn find_user_by_username(store: &dyn DocumentStore, username: &str) -> anyhow::Result<Option<User>> {
    match store.get_json::<String>(&username_key(username))? {
        Some(id) => find_user(store, &id),
        None => Ok(None),
    }
}

pub fn username_taken(store: &dyn DocumentStore, username: &str) -> anyhow::Result<bool> {
    Ok(store.get(&username_key(username))?.is_some())
}

pub fn email_taken(store: &dyn DocumentStore, email: &str) -> anyhow::Result<bool> {
    Ok(store.get(&email_key(email))?.is_some())
}

/// Writes the user document and claims its username and email index entries.
pub fn insert_user(store: &dyn DocumentStore, user: &User) -> anyhow::Result<()> {
    store.set_json(&user_key(&user.id), user)?;
    store.set_json(&username_key(&user.username), &user.id)?;
    store.set_json(&email_key(&user.email), &user.id)?;
    debug!(user_id = %user.id, "user inserted");
    Ok(())
}

/// Moves the index entries of a user whose username or email changed.
pub fn reindex_user(store: &dyn DocumentStore, before: &User, after: &User) -> anyhow::Result<()> {
    if before.username != after.username {
        store.set_json(&username_key(&after.username), &after.id)?;
        store.delete(&username_key(&before.username))?;
    }
    if before.email != after.email {
        store.set_json(&email_key(&after.email), &after.id)?;
        store.delete(&email_key(&before.email))?;
    }
    Ok(())
}

/// Atomic read-modify-write of one user document. `None` when the user does not exist.
pub fn update_user<R>(
    store: &dyn DocumentStore,
    id: &str,
    mutate: impl FnOnce(&mut User) -> R,
) -> anyhow::Result<Option<R>> {
    store.update_json(&user_key(id), mutate)
}

pub fn find_post(store: &dyn DocumentStore, id: &str) -> anyhow::Result<Option<Post>> {
    store.get_json(&post_key(id))
}

pub fn save_post(store: &dyn DocumentStore, post: &Post) -> anyhow::Result<()> {
    store.set_json(&post_key(&post.id), post)
}

pub fn insert_post(store: &dyn DocumentStore, post: &Post) -> anyhow::Result<()> {
    save_post(store, post)?;
    store.upsert_json(FEED_KEY, |feed: &mut Vec<String>| feed.insert(0, post.id.clone()))
}

/// Atomic read-modify-write of one post document. `None` when the post does not exist.
pub fn update_post<R>(
    store: &dyn DocumentStore,
    id: &str,
    mutate: impl FnOnce(&mut Post) -> R,
) -> anyhow::Result<Option<R>> {
    store.update_json(&post_key(id), mutate)
}

pub fn delete_post(store: &dyn DocumentStore, id: &str) -> anyhow::Result<()> {
    store.delete(&post_key(id))?;
    store.upsert_json(FEED_KEY, |feed: &mut Vec<String>| feed.retain(|post_id| post_id != id))
}

/// All posts, newest first.
pub fn list_posts(store: &dyn DocumentStore) -> anyhow::Result<Vec<Post>> {
    let feed: Vec<String> = store.get_json(FEED_KEY)?.unwrap_or_default();
    let mut posts = Vec::with_capacity(feed.len());
    for id in &feed {
        if let Some(post) = find_post(store, id)? {
            posts.push(post);
        }
    }
    Ok(posts)
}

pub fn insert_notification(store: &dyn DocumentStore, notification: &Notification) -> anyhow::Result<()> {
    store.set_json(&notification_key(&notification.id), notification)?;
    store.upsert_json(&inbox_key(&notification.to), |ids: &mut Vec<String>| {
        ids.push(notification.id.clone())
    })
}

pub fn save_notification(store: &dyn DocumentStore, notification: &Notification) -> anyhow::Result<()> {
    store.set_json(&notification_key(&notification.id), notification)
}

/// Notifications addressed to `user_id`, oldest first.
pub fn inbox(store: &dyn DocumentStore, user_id: &str) -> anyhow::Result<Vec<Notification>> {
    let ids: Vec<String> = store.get_json(&inbox_key(user_id))?.unwrap_or_default();
    let mut notifications = Vec::with_capacity(ids.len());
    for id in &ids {
        if let Some(n) = store.get_json::<Notification>(&notification_key(id))? {
            notifications.push(n);
        }
    }
    Ok(notifications)
}
