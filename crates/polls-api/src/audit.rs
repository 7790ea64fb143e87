//! Authentication lifecycle signals and the login audit listener.
//!
//! Listeners are connected once at startup, before the registry is moved into
//! the shared state; dispatch is synchronous and in registration order.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use tracing::{info, warn};

use polls_types::events::AuthEvent;

const FORWARDED_FOR: &str = "x-forwarded-for";

pub trait AuthListener: Send + Sync {
    fn on_event(&self, event: &AuthEvent);
}

#[derive(Clone, Default)]
pub struct AuthSignals {
    listeners: Vec<Arc<dyn AuthListener>>,
}

impl AuthSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&mut self, listener: Arc<dyn AuthListener>) {
        self.listeners.push(listener);
    }

    pub fn send(&self, event: AuthEvent) {
        for listener in &self.listeners {
            listener.on_event(&event);
        }
    }
}

/// Writes one log line per auth event under the `polls::audit` target.
pub struct LoginAuditLog;

impl AuthListener for LoginAuditLog {
    fn on_event(&self, event: &AuthEvent) {
        let username = event.username();
        let ip = event.ip().unwrap_or("unknown");

        match event {
            AuthEvent::LoggedIn { .. } => {
                info!(target: "polls::audit", %username, %ip, "User {} logged in from IP {}", username, ip);
            }
            AuthEvent::LoggedOut { .. } => {
                info!(target: "polls::audit", %username, %ip, "User {} logged out from IP {}", username, ip);
            }
            AuthEvent::LoginFailed { .. } => {
                warn!(
                    target: "polls::audit",
                    %username,
                    %ip,
                    "Unsuccessful login attempt for {} from IP {}",
                    username,
                    ip
                );
            }
        }
    }
}

/// First entry of `X-Forwarded-For` if present, otherwise the peer address.
pub fn client_ip(headers: &HeaderMap, remote: Option<SocketAddr>) -> Option<String> {
    let forwarded = headers
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    match forwarded {
        Some(ip) => Some(ip.to_string()),
        None => remote.map(|addr| addr.ip().to_string()),
    }
}

/// Extractor for the caller's IP; never rejects.
#[derive(Debug, Clone)]
pub struct ClientIp(pub Option<String>);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let remote = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(ClientIp(client_ip(&parts.headers, remote)))
    }
}
