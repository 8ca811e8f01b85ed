use std::collections::HashMap;

use spin_sdk::http::{Request, Response};
use tracing::{debug, warn};

use crate::auth::validate_session;
use crate::core::db;
use crate::core::errors::ApiError;
use crate::core::helpers::{json_response, new_id, now_iso};
use crate::models::models::{AuthorView, Notification, NotificationType, NotificationView};
use crate::Api;

/// Records a notification for `to`.
///
/// Runs after the change it reports has been written. A failed write is
/// logged and swallowed: the change stands and the caller still reports
/// success, so notifications are eventually consistent at best.
pub fn notify(api: &Api, from: &str, to: &str, kind: NotificationType) -> Option<Notification> {
    let notification = Notification {
        id: new_id(),
        from: from.to_string(),
        to: to.to_string(),
        kind,
        read: false,
        created_at: now_iso(),
    };

    match db::insert_notification(api.store, &notification) {
        Ok(()) => {
            debug!(from, to, kind = ?kind, "notification recorded");
            Some(notification)
        }
        Err(err) => {
            warn!(from, to, kind = ?kind, error = %err, "notification write failed");
            None
        }
    }
}

/// The user's inbox, newest first.
///
/// Returned entries carry the read flag as it was before this call; every
/// unread entry is marked read afterwards.
pub fn list_notifications(api: &Api, user_id: &str) -> Result<Vec<NotificationView>, ApiError> {
    let mut notifications = db::inbox(api.store, user_id)?;
    notifications.reverse();

    let mut senders: HashMap<String, Option<AuthorView>> = HashMap::new();
    let mut views = Vec::with_capacity(notifications.len());
    for n in &notifications {
        if !senders.contains_key(&n.from) {
            let sender = db::find_user(api.store, &n.from)?.map(|u| AuthorView::from(&u));
            senders.insert(n.from.clone(), sender);
        }
        views.push(NotificationView {
            id: n.id.clone(),
            from: senders.get(&n.from).cloned().flatten(),
            to: n.to.clone(),
            kind: n.kind,
            read: n.read,
            created_at: n.created_at.clone(),
        });
    }

    for mut n in notifications.into_iter().filter(|n| !n.read) {
        n.read = true;
        db::save_notification(api.store, &n)?;
    }

    Ok(views)
}

// === HTTP Handlers ===

pub fn get_notifications(api: &Api, req: &Request) -> Result<Response, ApiError> {
    let user = validate_session(api, req)?;
    let notifications = list_notifications(api, &user.id)?;
    json_response(200, &notifications)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::core::images::LinkImageStore;
    use crate::core::store::MemoryStore;
    use crate::models::id_set::IdSet;
    use crate::models::models::User;

    fn sender(store: &MemoryStore) {
        let user = User {
            id: "u1".to_string(),
            username: "al".to_string(),
            full_name: "Al".to_string(),
            email: "al@x.com".to_string(),
            password: "hash".to_string(),
            followers: IdSet::new(),
            following: IdSet::new(),
            profile_img: String::new(),
            cover_img: String::new(),
            bio: String::new(),
            link: String::new(),
            liked_posts: IdSet::new(),
            created_at: String::new(),
            updated_at: String::new(),
        };
        db::insert_user(store, &user).unwrap();
    }

    #[test]
    fn listing_marks_entries_read() {
        let store = MemoryStore::new();
        let settings = Settings::default();
        let api = Api::new(&store, &LinkImageStore, &settings);
        sender(&store);

        notify(&api, "u1", "u2", NotificationType::Follow).unwrap();
        notify(&api, "u1", "u2", NotificationType::Like).unwrap();

        let first = list_notifications(&api, "u2").unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].kind, NotificationType::Like);
        assert!(first.iter().all(|n| !n.read));
        assert_eq!(first[0].from.as_ref().unwrap().username, "al");

        let second = list_notifications(&api, "u2").unwrap();
        assert!(second.iter().all(|n| n.read));
        assert!(db::inbox(&store, "u2").unwrap().iter().all(|n| n.read));
    }

    #[test]
    fn deleted_sender_is_left_out() {
        let store = MemoryStore::new();
        let settings = Settings::default();
        let api = Api::new(&store, &LinkImageStore, &settings);

        notify(&api, "gone", "u2", NotificationType::Comment).unwrap();
        let listed = list_notifications(&api, "u2").unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].from.is_none());
    }
}
