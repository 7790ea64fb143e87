//! One-shot user-visible messages carried across a redirect in a cookie.

use axum_extra::extract::cookie::{Cookie, CookieJar};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use tracing::warn;

use polls_types::api::{FlashMessage, MessageLevel};

pub const FLASH_COOKIE: &str = "flash";

/// Queue a message for the next read view.
pub fn push(jar: CookieJar, level: MessageLevel, message: impl Into<String>) -> CookieJar {
    let mut messages = jar.get(FLASH_COOKIE).map(|c| decode(c.value())).unwrap_or_default();
    messages.push(FlashMessage {
        level,
        message: message.into(),
    });

    let cookie = Cookie::build((FLASH_COOKIE, encode(&messages)))
        .path("/")
        .http_only(true);
    jar.add(cookie)
}

/// Drain all pending messages, clearing the cookie.
pub fn take(jar: CookieJar) -> (CookieJar, Vec<FlashMessage>) {
    let Some(cookie) = jar.get(FLASH_COOKIE) else {
        return (jar, Vec::new());
    };

    let messages = decode(cookie.value());
    let jar = jar.remove(Cookie::build(FLASH_COOKIE).path("/"));
    (jar, messages)
}

fn encode(messages: &[FlashMessage]) -> String {
    // Serializing plain structs of strings cannot fail
    B64.encode(serde_json::to_vec(messages).unwrap_or_default())
}

fn decode(raw: &str) -> Vec<FlashMessage> {
    let parsed = B64
        .decode(raw)
        .map_err(|e| e.to_string())
        .and_then(|bytes| serde_json::from_slice(&bytes).map_err(|e| e.to_string()));

    match parsed {
        Ok(messages) => messages,
        Err(e) => {
            warn!("Discarding malformed flash cookie: {}", e);
            Vec::new()
        }
    }
}
