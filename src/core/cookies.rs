use std::collections::HashMap;

use spin_sdk::http::Request;

/// Parse a `Cookie` request header into name/value pairs.
///
/// Values are percent-decoded. Pairs without `=` are ignored and a repeated
/// name keeps the last value.
///
/// # Example
/// ```
/// let cookies = flock::core::cookies::parse_cookie_header("jwt=abc; theme=dark");
/// assert_eq!(cookies.get("jwt"), Some(&"abc".to_string()));
/// assert_eq!(cookies.get("theme"), Some(&"dark".to_string()));
/// ```
pub fn parse_cookie_header(header: &str) -> HashMap<String, String> {
    let mut cookies = HashMap::new();

    for pair in header.split(';') {
        if let Some((name, value)) = pair.split_once('=') {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let value = value.trim().trim_matches('"');
            let decoded = urlencoding::decode(value)
                .unwrap_or(std::borrow::Cow::Borrowed(value))
                .to_string();
            cookies.insert(name.to_string(), decoded);
        }
    }

    cookies
}

/// Value of cookie `name` on the request, if sent and non-empty.
pub fn get_cookie(req: &Request, name: &str) -> Option<String> {
    let header = req.header("cookie")?.as_str()?;
    parse_cookie_header(header)
        .remove(name)
        .filter(|v| !v.is_empty())
}

/// Token from an `Authorization: Bearer` header.
pub fn bearer_token(req: &Request) -> Option<String> {
    let auth = req.header("authorization")?.as_str()?;
    auth.strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multiple_cookies() {
        let cookies = parse_cookie_header("a=1;  jwt=tok.en ; empty=; broken");
        assert_eq!(cookies.get("a").map(String::as_str), Some("1"));
        assert_eq!(cookies.get("jwt").map(String::as_str), Some("tok.en"));
        assert_eq!(cookies.get("empty").map(String::as_str), Some(""));
        assert!(!cookies.contains_key("broken"));
    }

    #[test]
    fn decodes_percent_escapes() {
        let cookies = parse_cookie_header("name=hello%20world");
        assert_eq!(cookies.get("name").map(String::as_str), Some("hello world"));
    }
}
