use serde::{Deserialize, Serialize};

/// Authentication lifecycle events delivered to the listeners registered on
/// the API's signal registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum AuthEvent {
    /// Credentials accepted (login or registration)
    LoggedIn { username: String, ip: Option<String> },

    /// Session ended by the user
    LoggedOut { username: String, ip: Option<String> },

    /// Credentials rejected; `username` is whatever was submitted
    LoginFailed { username: String, ip: Option<String> },
}

impl AuthEvent {
    pub fn username(&self) -> &str {
        match self {
            Self::LoggedIn { username, .. }
            | Self::LoggedOut { username, .. }
            | Self::LoginFailed { username, .. } => username,
        }
    }

    pub fn ip(&self) -> Option<&str> {
        match self {
            Self::LoggedIn { ip, .. } | Self::LoggedOut { ip, .. } | Self::LoginFailed { ip, .. } => {
                ip.as_deref()
            }
        }
    }
}
