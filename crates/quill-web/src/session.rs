//! Browser session and flash notices, both kept in private (encrypted and
//! authenticated) cookies so the frontend holds no server-side state.

use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use serde::{Deserialize, Serialize};
use tracing::warn;

use quill_types::api::UserResponse;

pub const SESSION_COOKIE: &str = "quill_session";
pub const FLASH_COOKIE: &str = "quill_flash";

/// The slice of the user record the frontend keeps between requests.
/// The avatar is left out; it can be megabytes of base64.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: i64,
    pub username: String,
    pub email: String,
}

impl From<UserResponse> for SessionUser {
    fn from(user: UserResponse) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: SessionUser,
}

impl Session {
    pub fn load(jar: &PrivateCookieJar) -> Option<Self> {
        let cookie = jar.get(SESSION_COOKIE)?;
        serde_json::from_str(cookie.value())
            .map_err(|e| warn!("Discarding unreadable session cookie: {}", e))
            .ok()
    }

    pub fn store(&self, jar: PrivateCookieJar) -> PrivateCookieJar {
        match serde_json::to_string(self) {
            Ok(value) => jar.add(cookie(SESSION_COOKIE, value)),
            Err(e) => {
                warn!("Failed to serialize session: {}", e);
                jar
            }
        }
    }

    pub fn clear(jar: PrivateCookieJar) -> PrivateCookieJar {
        jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Info,
    Warning,
    Danger,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Danger => "danger",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flash {
    pub level: Level,
    pub message: String,
}

/// Queue a notice for the next rendered page.
pub fn flash(jar: PrivateCookieJar, level: Level, message: impl Into<String>) -> PrivateCookieJar {
    let mut flashes = read_flashes(&jar);
    flashes.push(Flash {
        level,
        message: message.into(),
    });

    match serde_json::to_string(&flashes) {
        Ok(value) => jar.add(cookie(FLASH_COOKIE, value)),
        Err(e) => {
            warn!("Failed to serialize flash messages: {}", e);
            jar
        }
    }
}

/// Drain every queued notice.
pub fn take_flashes(jar: PrivateCookieJar) -> (PrivateCookieJar, Vec<Flash>) {
    let flashes = read_flashes(&jar);
    if flashes.is_empty() {
        return (jar, flashes);
    }
    (jar.remove(Cookie::build(FLASH_COOKIE).path("/")), flashes)
}

fn read_flashes(jar: &PrivateCookieJar) -> Vec<Flash> {
    jar.get(FLASH_COOKIE)
        .and_then(|c| serde_json::from_str(c.value()).ok())
        .unwrap_or_default()
}

fn cookie(name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}
