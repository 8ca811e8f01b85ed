use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

/// Where post and profile images live. Handlers only keep the returned URL.
pub trait ImageStore {
    /// Store `image` and return the URL to persist.
    fn upload(&self, image: &str) -> anyhow::Result<String>;
    fn delete(&self, public_id: &str) -> anyhow::Result<()>;
}

fn url_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^https?://[^\s]+$").expect("Regex should compile"))
}

pub fn is_remote_url(image: &str) -> bool {
    url_regex().is_match(image)
}

/// Public id of a hosted image: last path segment without its extension.
pub fn public_id_from_url(url: &str) -> Option<String> {
    let last = url.split(&['?', '#'][..]).next()?.rsplit('/').next()?;
    let id = last.split('.').next()?;
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

/// Accepts images already hosted elsewhere and keeps their URL as-is.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinkImageStore;

impl ImageStore for LinkImageStore {
    fn upload(&self, image: &str) -> anyhow::Result<String> {
        if !is_remote_url(image) {
            anyhow::bail!("image is not a remote http(s) URL");
        }
        Ok(image.to_string())
    }

    fn delete(&self, public_id: &str) -> anyhow::Result<()> {
        debug!(public_id, "linked image released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_id_is_last_segment_stem() {
        assert_eq!(
            public_id_from_url("https://res.example.com/img/upload/v17/abc123.jpg").as_deref(),
            Some("abc123")
        );
        assert_eq!(public_id_from_url("https://x.io/pic.png?w=3").as_deref(), Some("pic"));
        assert_eq!(public_id_from_url("https://x.io/"), None);
    }

    #[test]
    fn link_store_only_takes_urls() {
        let store = LinkImageStore;
        assert_eq!(store.upload("https://x.io/a.png").unwrap(), "https://x.io/a.png");
        assert!(store.upload("data:image/png;base64,AAAA").is_err());
        assert!(store.upload("https://x.io/a b.png").is_err());
    }
}
