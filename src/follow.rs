use spin_sdk::http::{Request, Response};
use tracing::info;

use crate::auth::validate_session;
use crate::core::db;
use crate::core::errors::ApiError;
use crate::core::helpers::{json_response, message, validate_uuid};
use crate::models::models::{AuthorView, NotificationType, User};
use crate::notifications::notify;
use crate::Api;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Followed,
    Unfollowed,
}

impl FollowOutcome {
    pub fn message(self) -> &'static str {
        match self {
            FollowOutcome::Followed => "Followed",
            FollowOutcome::Unfollowed => "Unfollowed",
        }
    }
}

/// Flips the follow edge `actor -> target`.
///
/// The actor's `following` set decides the direction. Both user documents
/// are then written one after the other; there is no transaction spanning
/// them, so a failure between the two writes leaves the pair asymmetric.
/// Set semantics keep a repeated write from duplicating an entry. Only the
/// follow direction emits a notification.
pub fn toggle_follow(api: &Api, actor_id: &str, target_id: &str) -> Result<FollowOutcome, ApiError> {
    if actor_id == target_id {
        return Err(ApiError::SelfFollow);
    }

    let target = db::find_user(api.store, target_id)?.ok_or_else(|| ApiError::not_found("User not found"))?;
    let actor = db::find_user(api.store, actor_id)?.ok_or_else(|| ApiError::not_found("User not found"))?;

    if actor.following.contains(&target.id) {
        db::update_user(api.store, &target.id, |u| u.followers.remove(&actor.id))?
            .ok_or_else(|| ApiError::not_found("User not found"))?;
        db::update_user(api.store, &actor.id, |u| u.following.remove(&target.id))?
            .ok_or_else(|| ApiError::not_found("User not found"))?;

        info!(actor = %actor.id, target = %target.id, "unfollowed");
        Ok(FollowOutcome::Unfollowed)
    } else {
        db::update_user(api.store, &target.id, |u| u.followers.insert(&actor.id))?
            .ok_or_else(|| ApiError::not_found("User not found"))?;
        db::update_user(api.store, &actor.id, |u| u.following.insert(&target.id))?
            .ok_or_else(|| ApiError::not_found("User not found"))?;

        info!(actor = %actor.id, target = %target.id, "followed");
        notify(api, &actor.id, &target.id, NotificationType::Follow);
        Ok(FollowOutcome::Followed)
    }
}

fn author_views<'a>(api: &Api, ids: impl Iterator<Item = &'a str>) -> Result<Vec<AuthorView>, ApiError> {
    let mut views = Vec::new();
    for id in ids {
        if let Some(user) = db::find_user(api.store, id)? {
            views.push(AuthorView::from(&user));
        }
    }
    Ok(views)
}

fn load_listed_user(api: &Api, user_id: &str) -> Result<User, ApiError> {
    if user_id.is_empty() || !validate_uuid(user_id) {
        return Err(ApiError::validation("Invalid user id"));
    }
    db::find_user(api.store, user_id)?.ok_or_else(|| ApiError::not_found("User not found"))
}

// === HTTP Handlers ===

pub fn handle_follow(api: &Api, req: &Request, target_id: &str) -> Result<Response, ApiError> {
    let actor = validate_session(api, req)?;

    if target_id != actor.id && !validate_uuid(target_id) {
        return Err(ApiError::validation("Invalid user id"));
    }

    let outcome = toggle_follow(api, &actor.id, target_id)?;
    message(200, outcome.message())
}

pub fn get_followers_list(api: &Api, req: &Request, user_id: &str) -> Result<Response, ApiError> {
    validate_session(api, req)?;
    let user = load_listed_user(api, user_id)?;
    json_response(200, &author_views(api, user.followers.iter())?)
}

pub fn get_following_list(api: &Api, req: &Request, user_id: &str) -> Result<Response, ApiError> {
    validate_session(api, req)?;
    let user = load_listed_user(api, user_id)?;
    json_response(200, &author_views(api, user.following.iter())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::core::images::LinkImageStore;
    use crate::core::store::{DocumentStore, MemoryStore};
    use crate::models::id_set::IdSet;
    use std::sync::Barrier;

    fn settings() -> Settings {
        Settings::default()
    }

    fn user(id: &str) -> User {
        User {
            id: id.to_string(),
            username: format!("name-{id}"),
            full_name: "Someone".to_string(),
            email: format!("{id}@x.com"),
            password: String::new(),
            followers: IdSet::new(),
            following: IdSet::new(),
            profile_img: String::new(),
            cover_img: String::new(),
            bio: String::new(),
            link: String::new(),
            liked_posts: IdSet::new(),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn seeded(store: &dyn DocumentStore) {
        db::insert_user(store, &user("u1")).unwrap();
        db::insert_user(store, &user("u2")).unwrap();
    }

    /// Fails every write of a notification document.
    struct NoNotifications(MemoryStore);

    impl DocumentStore for NoNotifications {
        fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
            self.0.get(key)
        }
        fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
            if key.starts_with("notification:") {
                anyhow::bail!("notification collection unavailable");
            }
            self.0.set(key, value)
        }
        fn delete(&self, key: &str) -> anyhow::Result<()> {
            self.0.delete(key)
        }
    }

    #[test]
    fn follow_then_unfollow_restores_state() {
        let store = MemoryStore::new();
        let settings = settings();
        let api = Api::new(&store, &LinkImageStore, &settings);
        seeded(&store);

        assert_eq!(toggle_follow(&api, "u1", "u2").unwrap(), FollowOutcome::Followed);
        let u1 = db::find_user(&store, "u1").unwrap().unwrap();
        let u2 = db::find_user(&store, "u2").unwrap().unwrap();
        assert!(u1.following.contains("u2"));
        assert!(u2.followers.contains("u1"));
        assert!(!u1.followers.contains("u2"));

        assert_eq!(toggle_follow(&api, "u1", "u2").unwrap(), FollowOutcome::Unfollowed);
        let u1 = db::find_user(&store, "u1").unwrap().unwrap();
        let u2 = db::find_user(&store, "u2").unwrap().unwrap();
        assert!(u1.following.is_empty());
        assert!(u2.followers.is_empty());
    }

    #[test]
    fn only_follow_emits_a_notification() {
        let store = MemoryStore::new();
        let settings = settings();
        let api = Api::new(&store, &LinkImageStore, &settings);
        seeded(&store);

        toggle_follow(&api, "u1", "u2").unwrap();
        let inbox = db::inbox(&store, "u2").unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, NotificationType::Follow);
        assert_eq!(inbox[0].from, "u1");
        assert!(!inbox[0].read);

        toggle_follow(&api, "u1", "u2").unwrap();
        assert_eq!(db::inbox(&store, "u2").unwrap().len(), 1);
        assert!(db::inbox(&store, "u1").unwrap().is_empty());
    }

    #[test]
    fn self_follow_always_fails() {
        let store = MemoryStore::new();
        let settings = settings();
        let api = Api::new(&store, &LinkImageStore, &settings);
        seeded(&store);

        assert!(matches!(toggle_follow(&api, "u1", "u1"), Err(ApiError::SelfFollow)));
        toggle_follow(&api, "u1", "u2").unwrap();
        assert!(matches!(toggle_follow(&api, "u1", "u1"), Err(ApiError::SelfFollow)));
        // unknown ids still hit the self check first
        assert!(matches!(toggle_follow(&api, "ghost", "ghost"), Err(ApiError::SelfFollow)));
    }

    #[test]
    fn missing_users_are_not_found() {
        let store = MemoryStore::new();
        let settings = settings();
        let api = Api::new(&store, &LinkImageStore, &settings);
        seeded(&store);

        assert!(matches!(toggle_follow(&api, "u1", "ghost"), Err(ApiError::NotFound(_))));
        assert!(matches!(toggle_follow(&api, "ghost", "u1"), Err(ApiError::NotFound(_))));
        assert!(db::find_user(&store, "u1").unwrap().unwrap().following.is_empty());
    }

    #[test]
    fn concurrent_follows_of_one_target_all_land() {
        for _ in 0..20 {
            let store = MemoryStore::new();
            let settings = settings();
            db::insert_user(&store, &user("target")).unwrap();
            let actors: Vec<String> = (0..8).map(|n| format!("a{n}")).collect();
            for actor in &actors {
                db::insert_user(&store, &user(actor)).unwrap();
            }

            let barrier = Barrier::new(actors.len());
            std::thread::scope(|scope| {
                for actor in &actors {
                    let (store, settings, barrier) = (&store, &settings, &barrier);
                    scope.spawn(move || {
                        let api = Api::new(store, &LinkImageStore, settings);
                        barrier.wait();
                        assert_eq!(toggle_follow(&api, actor, "target").unwrap(), FollowOutcome::Followed);
                    });
                }
            });

            let target = db::find_user(&store, "target").unwrap().unwrap();
            assert_eq!(target.followers.len(), actors.len());
            for actor in &actors {
                assert!(target.followers.contains(actor));
                assert!(db::find_user(&store, actor).unwrap().unwrap().following.contains("target"));
            }
            assert_eq!(db::inbox(&store, "target").unwrap().len(), actors.len());
        }
    }

    #[test]
    fn failed_notification_keeps_the_follow() {
        let store = NoNotifications(MemoryStore::new());
        let settings = settings();
        let api = Api::new(&store, &LinkImageStore, &settings);
        seeded(&store);

        assert_eq!(toggle_follow(&api, "u1", "u2").unwrap(), FollowOutcome::Followed);
        let u2 = db::find_user(&store, "u2").unwrap().unwrap();
        assert!(u2.followers.contains("u1"));
        assert!(db::inbox(&store, "u2").unwrap().is_empty());
    }
}
