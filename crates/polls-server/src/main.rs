mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use polls_api::audit::{AuthSignals, LoginAuditLog};
use polls_api::state::AppStateInner;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "polls=debug,polls_api=debug,polls_db=info,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = polls_db::Database::open(&config.db_path)?;
    for username in &config.staff_users {
        if !db.set_staff(username, true)? {
            warn!("POLLS_STAFF_USERS names unknown user {}", username);
        }
    }

    // Auth lifecycle listeners
    let mut signals = AuthSignals::new();
    signals.connect(Arc::new(LoginAuditLog));

    let state = Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret,
        signals,
    });

    let app = polls_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("Polls server listening on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
