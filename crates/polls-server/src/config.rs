use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

/// Placeholder JWT secrets that MUST NOT be used outside development.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub staff_users: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let host = var_or("POLLS_HOST", "0.0.0.0");
        let port: u16 = var_or("POLLS_PORT", "8000")
            .parse()
            .context("POLLS_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

        let db_path = PathBuf::from(var_or("POLLS_DB_PATH", "polls.db"));

        let allow_dev_secret = env::var("POLLS_ALLOW_DEV_SECRET").is_ok_and(|v| v == "1");
        let jwt_secret = env::var("POLLS_JWT_SECRET").unwrap_or_default();
        let jwt_secret = if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            if !allow_dev_secret {
                bail!("POLLS_JWT_SECRET is unset or still a placeholder; set it or POLLS_ALLOW_DEV_SECRET=1");
            }
            warn!("Using the development JWT secret; do not expose this server");
            "dev-secret-change-me".to_string()
        } else {
            jwt_secret
        };

        let staff_users = env::var("POLLS_STAFF_USERS")
            .map(|v| parse_list(&v))
            .unwrap_or_default();

        Ok(Self {
            addr,
            db_path,
            jwt_secret,
            staff_users,
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    })
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
