//! In-process web sessions keyed by an opaque cookie token.
//!
//! Holds the credentials and last report for a logged-in student so GET
//! routes and the lab JSON endpoints can act without re-posting the login
//! form. Entries expire on a fixed TTL; expiry is lazy on access.

use crate::attendance::AttendanceReport;
use crate::portal::Credentials;
use axum::http::{HeaderMap, HeaderValue, header};
use cookie::Cookie;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const SESSION_COOKIE: &str = "session";

const SESSION_TTL: Duration = Duration::from_secs(2 * 60 * 60);

#[derive(Clone)]
pub struct UserSession {
    pub username: String,
    pub password: String,
    pub report: Option<AttendanceReport>,
}

impl UserSession {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

struct SessionEntry {
    expires_at: Instant,
    session: UserSession,
}

#[derive(Clone, Default)]
pub struct SessionStore {
    entries: Arc<DashMap<String, SessionEntry>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a session and mint its cookie token.
    pub fn create(&self, session: UserSession) -> String {
        let token = nanoid::nanoid!();
        self.entries.insert(
            token.clone(),
            SessionEntry {
                expires_at: Instant::now() + SESSION_TTL,
                session,
            },
        );
        token
    }

    pub fn get(&self, token: &str) -> Option<UserSession> {
        let entry = self.entries.get(token)?;
        if Instant::now() > entry.expires_at {
            drop(entry);
            self.entries.remove(token);
            return None;
        }
        Some(entry.session.clone())
    }

    /// Resolve the session referenced by a request's cookies.
    pub fn from_headers(&self, headers: &HeaderMap) -> Option<UserSession> {
        self.get(&token_from_headers(headers)?)
    }

    /// Build the `Set-Cookie` header for a freshly minted token.
    pub fn cookie_header(token: &str) -> HeaderValue {
        let cookie = Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .build();
        HeaderValue::from_str(&cookie.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static(""))
    }
}

fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    for header_value in headers.get_all(header::COOKIE) {
        let raw = header_value.to_str().ok()?;
        for cookie in Cookie::split_parse(raw).flatten() {
            if cookie.name() == SESSION_COOKIE {
                return Some(cookie.value().to_owned());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> UserSession {
        UserSession {
            username: "22891A0501".to_owned(),
            password: "hunter2".to_owned(),
            report: None,
        }
    }

    #[test]
    fn create_then_get_round_trips() {
        let store = SessionStore::new();
        let token = store.create(session());
        assert_eq!(store.get(&token).unwrap().username, "22891A0501");
    }

    #[test]
    fn unknown_token_is_none() {
        let store = SessionStore::new();
        assert!(store.get("nope").is_none());
    }

    #[test]
    fn cookie_round_trips_through_headers() {
        let store = SessionStore::new();
        let token = store.create(session());

        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {SESSION_COOKIE}={token}")).unwrap(),
        );
        assert_eq!(store.from_headers(&headers).unwrap().username, "22891A0501");
    }
}
