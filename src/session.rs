//! Stateless session tokens.
//!
//! A token is `base64url(claims JSON) "." hex(mac)` where the MAC is a BLAKE3
//! keyed hash of the encoded claims under a key derived from the server
//! secret. Nothing is persisted: a token stays valid until `exp`, logout only
//! clears the client's cookie.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::config::{Settings, SESSION_COOKIE};
use crate::models::models::SessionClaims;

const KDF_CONTEXT_SESSION_KEY: &str = "flock 2024 session token mac key v1";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Invalid token format")]
    InvalidFormat,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Token has expired")]
    Expired,
}

fn mac_key(settings: &Settings) -> [u8; 32] {
    blake3::derive_key(KDF_CONTEXT_SESSION_KEY, settings.session_secret.as_bytes())
}

fn sign(payload: &str, settings: &Settings) -> [u8; 32] {
    *blake3::keyed_hash(&mac_key(settings), payload.as_bytes()).as_bytes()
}

pub fn issue_token(user_id: &str, settings: &Settings) -> anyhow::Result<String> {
    issue_token_at(user_id, settings, Utc::now())
}

pub fn issue_token_at(user_id: &str, settings: &Settings, now: DateTime<Utc>) -> anyhow::Result<String> {
    let claims = SessionClaims {
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::days(settings.session_ttl_days)).timestamp(),
    };
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
    let mac = hex::encode(sign(&payload, settings));
    Ok(format!("{payload}.{mac}"))
}

pub fn verify_token(token: &str, settings: &Settings) -> Result<SessionClaims, TokenError> {
    verify_token_at(token, settings, Utc::now())
}

pub fn verify_token_at(
    token: &str,
    settings: &Settings,
    now: DateTime<Utc>,
) -> Result<SessionClaims, TokenError> {
    let (payload, mac_hex) = token.split_once('.').ok_or(TokenError::InvalidFormat)?;
    let mac = hex::decode(mac_hex).map_err(|_| TokenError::InvalidFormat)?;

    let expected = sign(payload, settings);
    if mac.len() != expected.len() || mac.as_slice().ct_eq(expected.as_slice()).unwrap_u8() != 1 {
        return Err(TokenError::InvalidSignature);
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| TokenError::InvalidFormat)?;
    let claims: SessionClaims = serde_json::from_slice(&bytes).map_err(|_| TokenError::InvalidFormat)?;

    if now.timestamp() >= claims.exp {
        return Err(TokenError::Expired);
    }
    Ok(claims)
}

/// `Set-Cookie` value carrying a freshly issued token.
pub fn session_cookie(token: &str, settings: &Settings) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={token}; Path=/; Max-Age={}; HttpOnly; SameSite=Strict",
        settings.session_ttl_seconds()
    );
    if !settings.development {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that makes the client drop its session.
pub fn cleared_cookie(settings: &Settings) -> String {
    let mut cookie = format!("{SESSION_COOKIE}=; Path=/; Max-Age=0; HttpOnly; SameSite=Strict");
    if !settings.development {
        cookie.push_str("; Secure");
    }
    cookie
}
