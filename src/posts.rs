use std::collections::HashMap;

use serde::Deserialize;
use spin_sdk::http::{Request, Response};
use tracing::{info, warn};

use crate::auth::validate_session;
use crate::config::*;
use crate::core::db;
use crate::core::errors::ApiError;
use crate::core::helpers::{json_response, message, new_id, now_iso, read_json, sanitize_text, validate_uuid};
use crate::core::images::{is_remote_url, public_id_from_url};
use crate::models::id_set::{IdSet, Toggle};
use crate::models::models::{AuthorView, Comment, CommentView, NotificationType, Post, PostView, User};
use crate::notifications::notify;
use crate::Api;

#[derive(Deserialize, Default, Debug)]
#[serde(default)]
pub struct CreatePostRequest {
    pub text: Option<String>,
    pub img: Option<String>,
}

#[derive(Deserialize, Default, Debug)]
#[serde(default)]
pub struct CommentRequest {
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeOutcome {
    Liked,
    Unliked,
}

impl LikeOutcome {
    pub fn message(self) -> &'static str {
        match self {
            LikeOutcome::Liked => "Post liked successfully",
            LikeOutcome::Unliked => "Post unliked successfully",
        }
    }
}

fn post_not_found() -> ApiError {
    ApiError::not_found("Post not found")
}

fn check_post_id(post_id: &str) -> Result<(), ApiError> {
    if post_id.is_empty() || !validate_uuid(post_id) {
        return Err(ApiError::validation("Invalid post id"));
    }
    Ok(())
}

pub fn create_post(api: &Api, author: &User, input: CreatePostRequest) -> Result<Post, ApiError> {
    let text = input
        .text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());
    let img = input
        .img
        .as_deref()
        .map(str::trim)
        .filter(|i| !i.is_empty());

    if text.is_none() && img.is_none() {
        return Err(ApiError::validation("Post must have text or image"));
    }
    if text.is_some_and(|t| t.chars().count() > MAX_POST_LENGTH) {
        return Err(ApiError::validation(format!(
            "Post text must be at most {MAX_POST_LENGTH} characters"
        )));
    }

    let img = match img {
        Some(image) if !is_remote_url(image) => return Err(ApiError::validation("Invalid image")),
        Some(image) => Some(api.images.upload(image)?),
        None => None,
    };

    let now = now_iso();
    let post = Post {
        id: new_id(),
        user: author.id.clone(),
        text: text.map(sanitize_text),
        img,
        likes: IdSet::new(),
        comments: Vec::new(),
        created_at: now.clone(),
        updated_at: now,
    };
    db::insert_post(api.store, &post)?;

    info!(post_id = %post.id, user_id = %author.id, "post created");
    Ok(post)
}

/// Owner-only delete. The hosted image is released on a best-effort basis.
pub fn delete_post(api: &Api, actor: &User, post_id: &str) -> Result<(), ApiError> {
    let post = db::find_post(api.store, post_id)?.ok_or_else(post_not_found)?;

    if post.user != actor.id {
        return Err(ApiError::forbidden("You are not authorized to delete this post"));
    }

    if let Some(public_id) = post.img.as_deref().and_then(public_id_from_url) {
        if let Err(err) = api.images.delete(&public_id) {
            warn!(post_id, public_id = %public_id, error = %err, "failed to release post image");
        }
    }

    db::delete_post(api.store, post_id)?;
    info!(post_id, user_id = %actor.id, "post deleted");
    Ok(())
}

/// Flips the actor's like on a post.
///
/// Same shape as the follow toggle: membership of the actor in `post.likes`
/// decides, the post and the actor's `likedPosts` are written in turn, and
/// only the like direction notifies the post owner.
pub fn toggle_like(api: &Api, actor_id: &str, post_id: &str) -> Result<(LikeOutcome, IdSet), ApiError> {
    let (owner, toggled, likes) = db::update_post(api.store, post_id, |p| {
        let toggled = p.likes.toggle(actor_id);
        (p.user.clone(), toggled, p.likes.clone())
    })?
    .ok_or_else(post_not_found)?;

    match toggled {
        Toggle::Removed => {
            db::update_user(api.store, actor_id, |u| u.liked_posts.remove(post_id))?;
            Ok((LikeOutcome::Unliked, likes))
        }
        Toggle::Added => {
            db::update_user(api.store, actor_id, |u| u.liked_posts.insert(post_id))?;
            if owner != actor_id {
                notify(api, actor_id, &owner, NotificationType::Like);
            }
            Ok((LikeOutcome::Liked, likes))
        }
    }
}

/// Appends a comment and notifies the post owner unless they wrote it.
pub fn add_comment(api: &Api, actor_id: &str, post_id: &str, text: &str) -> Result<Post, ApiError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ApiError::validation("Comment must have text"));
    }
    if text.chars().count() > MAX_COMMENT_LENGTH {
        return Err(ApiError::validation(format!(
            "Comment must be at most {MAX_COMMENT_LENGTH} characters"
        )));
    }

    let comment = Comment {
        id: new_id(),
        text: sanitize_text(text),
        user: actor_id.to_string(),
        created_at: now_iso(),
    };

    let post = db::update_post(api.store, post_id, |p| {
        p.comments.push(comment);
        p.clone()
    })?
    .ok_or_else(post_not_found)?;

    if post.user != actor_id {
        notify(api, actor_id, &post.user, NotificationType::Comment);
    }
    Ok(post)
}

/// Attaches author views to posts and their comments.
pub fn post_views(api: &Api, posts: Vec<Post>) -> Result<Vec<PostView>, ApiError> {
    let mut authors: HashMap<String, Option<AuthorView>> = HashMap::new();
    let mut author = |id: &str| -> Result<Option<AuthorView>, ApiError> {
        if let Some(cached) = authors.get(id) {
            return Ok(cached.clone());
        }
        let view = db::find_user(api.store, id)?.map(|u| AuthorView::from(&u));
        authors.insert(id.to_string(), view.clone());
        Ok(view)
    };

    let mut views = Vec::with_capacity(posts.len());
    for post in posts {
        let mut comments = Vec::with_capacity(post.comments.len());
        for c in post.comments {
            comments.push(CommentView {
                user: author(&c.user)?,
                id: c.id,
                text: c.text,
                created_at: c.created_at,
            });
        }
        views.push(PostView {
            user: author(&post.user)?,
            id: post.id,
            text: post.text,
            img: post.img,
            likes: post.likes,
            comments,
            created_at: post.created_at,
            updated_at: post.updated_at,
        });
    }
    Ok(views)
}

fn post_view(api: &Api, post: Post) -> Result<PostView, ApiError> {
    post_views(api, vec![post])?
        .pop()
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("post view vanished")))
}

fn posts_where(api: &Api, keep: impl Fn(&Post) -> bool) -> Result<Vec<PostView>, ApiError> {
    let posts = db::list_posts(api.store)?.into_iter().filter(|p| keep(p)).collect();
    post_views(api, posts)
}

// === HTTP Handlers ===

pub fn handle_create_post(api: &Api, req: &Request) -> Result<Response, ApiError> {
    let user = validate_session(api, req)?;
    let input: CreatePostRequest = read_json(req)?;

    let post = create_post(api, &user, input)?;
    json_response(
        201,
        &serde_json::json!({
            "message": "Post created successfully",
            "post": post_view(api, post)?,
        }),
    )
}

pub fn handle_delete_post(api: &Api, req: &Request, post_id: &str) -> Result<Response, ApiError> {
    let user = validate_session(api, req)?;
    check_post_id(post_id)?;

    delete_post(api, &user, post_id)?;
    message(200, "Post deleted successfully")
}

pub fn handle_like(api: &Api, req: &Request, post_id: &str) -> Result<Response, ApiError> {
    let user = validate_session(api, req)?;
    check_post_id(post_id)?;

    let (outcome, likes) = toggle_like(api, &user.id, post_id)?;
    json_response(
        200,
        &serde_json::json!({
            "message": outcome.message(),
            "likes": likes,
        }),
    )
}

pub fn handle_comment(api: &Api, req: &Request, post_id: &str) -> Result<Response, ApiError> {
    let user = validate_session(api, req)?;
    check_post_id(post_id)?;
    let input: CommentRequest = read_json(req)?;

    let post = add_comment(api, &user.id, post_id, &input.text)?;
    json_response(
        200,
        &serde_json::json!({
            "message": "Comment added successfully",
            "post": post_view(api, post)?,
        }),
    )
}

pub fn get_all_posts(api: &Api, req: &Request) -> Result<Response, ApiError> {
    validate_session(api, req)?;
    json_response(200, &posts_where(api, |_| true)?)
}

pub fn get_following_posts(api: &Api, req: &Request) -> Result<Response, ApiError> {
    let user = validate_session(api, req)?;
    json_response(200, &posts_where(api, |p| user.following.contains(&p.user))?)
}

pub fn get_liked_posts(api: &Api, req: &Request, user_id: &str) -> Result<Response, ApiError> {
    validate_session(api, req)?;
    if user_id.is_empty() || !validate_uuid(user_id) {
        return Err(ApiError::validation("Invalid user id"));
    }

    let user = db::find_user(api.store, user_id)?.ok_or_else(|| ApiError::not_found("User not found"))?;
    json_response(200, &posts_where(api, |p| user.liked_posts.contains(&p.id))?)
}

pub fn get_user_posts(api: &Api, req: &Request, username: &str) -> Result<Response, ApiError> {
    validate_session(api, req)?;
    let username = urlencoding::decode(username).map_err(|_| ApiError::not_found("User not found"))?;

    let user = db::find_user_by_username(api.store, &username)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    json_response(200, &posts_where(api, |p| p.user == user.id)?)
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;

    use super::*;
    use crate::config::Settings;
    use crate::core::images::LinkImageStore;
    use crate::core::store::MemoryStore;

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

    fn text_post(text: &str) -> CreatePostRequest {
        CreatePostRequest {
            text: Some(text.to_string()),
            img: None,
        }
    }

    #[test]
    fn post_and_comment_text_is_stored_as_typed() {
        let store = MemoryStore::new();
        let settings = Settings::default();
        let api = Api::new(&store, &LinkImageStore, &settings);
        let author = user("owner");
        db::insert_user(&store, &author).unwrap();

        let post = create_post(&api, &author, text_post("if a < b && c > d")).unwrap();
        assert_eq!(post.text.as_deref(), Some("if a < b && c > d"));

        let post = add_comment(&api, "owner", &post.id, "<b>Tom</b> & Jerry").unwrap();
        assert_eq!(post.comments[0].text, "Tom & Jerry");

        let stored = db::find_post(&store, &post.id).unwrap().unwrap();
        assert_eq!(stored.text.as_deref(), Some("if a < b && c > d"));
    }

    #[test]
    fn like_toggle_mirrors_liked_posts() {
        let store = MemoryStore::new();
        let settings = Settings::default();
        let api = Api::new(&store, &LinkImageStore, &settings);
        let author = user("owner");
        db::insert_user(&store, &author).unwrap();
        db::insert_user(&store, &user("fan")).unwrap();
        let post = create_post(&api, &author, text_post("hello")).unwrap();

        let (outcome, likes) = toggle_like(&api, "fan", &post.id).unwrap();
        assert_eq!(outcome, LikeOutcome::Liked);
        assert!(likes.contains("fan"));
        assert!(db::find_user(&store, "fan").unwrap().unwrap().liked_posts.contains(&post.id));
        assert_eq!(db::inbox(&store, "owner").unwrap().len(), 1);

        let (outcome, likes) = toggle_like(&api, "fan", &post.id).unwrap();
        assert_eq!(outcome, LikeOutcome::Unliked);
        assert!(likes.is_empty());
        assert!(db::find_user(&store, "fan").unwrap().unwrap().liked_posts.is_empty());
        assert_eq!(db::inbox(&store, "owner").unwrap().len(), 1);

        assert!(matches!(toggle_like(&api, "fan", "missing"), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn concurrent_likes_all_land() {
        for _ in 0..20 {
            let store = MemoryStore::new();
            let settings = Settings::default();
            let author = user("owner");
            db::insert_user(&store, &author).unwrap();
            let fans: Vec<String> = (0..8).map(|n| format!("fan{n}")).collect();
            for fan in &fans {
                db::insert_user(&store, &user(fan)).unwrap();
            }
            let post = {
                let api = Api::new(&store, &LinkImageStore, &settings);
                create_post(&api, &author, text_post("popular")).unwrap()
            };

            let barrier = Barrier::new(fans.len());
            std::thread::scope(|scope| {
                for fan in &fans {
                    let (store, settings, barrier, post_id) = (&store, &settings, &barrier, &post.id);
                    scope.spawn(move || {
                        let api = Api::new(store, &LinkImageStore, settings);
                        barrier.wait();
                        let (outcome, _) = toggle_like(&api, fan, post_id).unwrap();
                        assert_eq!(outcome, LikeOutcome::Liked);
                    });
                }
            });

            let stored = db::find_post(&store, &post.id).unwrap().unwrap();
            assert_eq!(stored.likes.len(), fans.len());
            assert_eq!(db::inbox(&store, "owner").unwrap().len(), fans.len());
        }
    }
}
