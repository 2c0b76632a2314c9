//! Admin authentication: HTTP Basic credentials and login sessions.

use crate::config::AuthConfig;
use axum::http::{HeaderMap, header};
use base64::{Engine, engine::general_purpose::STANDARD, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "auth_session";

/// Realm announced in `WWW-Authenticate`.
pub const REALM: &str = "OPDShelf";

/// Generate a random session token.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    bytes[..16].copy_from_slice(uuid::Uuid::new_v4().as_bytes());
    bytes[16..].copy_from_slice(uuid::Uuid::new_v4().as_bytes());
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode an `Authorization: Basic ...` header value.
pub fn parse_basic_auth(value: &str) -> Option<(String, String)> {
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let (username, password) = credentials.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// Value of a named cookie from the request headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

/// In-memory login sessions.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, i64>>,
    duration_days: u32,
}

impl SessionStore {
    /// Create an empty store whose sessions last `duration_days`.
    pub fn new(duration_days: u32) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            duration_days,
        }
    }

    /// Session lifetime in seconds.
    pub fn max_age(&self) -> i64 {
        self.duration_days as i64 * 24 * 60 * 60
    }

    /// Open a new session and return its token.
    pub fn create(&self) -> String {
        let token = generate_token();
        let expires_at = Utc::now().timestamp() + self.max_age();

        let mut sessions = self.sessions.write();
        let now = Utc::now().timestamp();
        sessions.retain(|_, expires| *expires > now);
        sessions.insert(token.clone(), expires_at);

        token
    }

    /// Whether the token names a live session. Expired sessions are dropped.
    pub fn validate(&self, token: &str) -> bool {
        let now = Utc::now().timestamp();

        match self.sessions.read().get(token) {
            Some(&expires_at) if expires_at > now => return true,
            None => return false,
            Some(_) => {}
        }

        self.sessions.write().remove(token);
        false
    }

    /// Close a session.
    pub fn revoke(&self, token: &str) {
        self.sessions.write().remove(token);
    }
}

/// Whether the request carries a live session cookie or valid Basic credentials.
pub fn is_authenticated(auth: &AuthConfig, sessions: &SessionStore, headers: &HeaderMap) -> bool {
    if cookie_value(headers, SESSION_COOKIE).is_some_and(|token| sessions.validate(&token)) {
        return true;
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_basic_auth)
        .is_some_and(|(username, password)| auth.verify(&username, &password))
}
