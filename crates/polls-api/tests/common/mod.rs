#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use tower::ServiceExt;
use uuid::Uuid;

use polls_api::audit::{AuthListener, AuthSignals, LoginAuditLog};
use polls_api::auth::create_token;
use polls_api::state::{AppState, AppStateInner};
use polls_db::Database;
use polls_types::events::AuthEvent;
use polls_types::models::{Choice, Question};

pub const SECRET: &str = "test-secret";

#[derive(Default)]
pub struct Recorder {
    pub seen: Mutex<Vec<AuthEvent>>,
}

impl AuthListener for Recorder {
    fn on_event(&self, event: &AuthEvent) {
        self.seen.lock().unwrap().push(event.clone());
    }
}

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub events: Arc<Recorder>,
}

impl TestApp {
    pub fn new() -> Self {
        let events = Arc::new(Recorder::default());
        let mut signals = AuthSignals::new();
        signals.connect(Arc::new(LoginAuditLog));
        signals.connect(events.clone());

        let state = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            jwt_secret: SECRET.to_string(),
            signals,
        });

        Self {
            router: polls_api::router(state.clone()),
            state,
            events,
        }
    }

    /// Inserts a user directly (no password hashing) and returns a bearer token.
    pub fn user(&self, username: &str) -> (Uuid, String) {
        let id = Uuid::new_v4();
        assert!(self.state.db.create_user(&id.to_string(), username, "unused").unwrap());
        let token = create_token(SECRET, id, username).unwrap();
        (id, token)
    }

    pub fn question(
        &self,
        text: &str,
        pub_date: DateTime<Utc>,
        end_date: Option<DateTime<Utc>>,
        choices: &[&str],
    ) -> (Question, Vec<Choice>) {
        let choices: Vec<String> = choices.iter().map(|c| c.to_string()).collect();
        self.state
            .db
            .create_question(text, pub_date, end_date, &choices)
            .unwrap()
    }

    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(req).await.unwrap()
    }

    pub async fn get(&self, uri: &str, token: Option<&str>, cookie: Option<&str>) -> Response<Body> {
        let mut req = Request::get(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        self.send(req.body(Body::empty()).unwrap()).await
    }

    pub async fn vote(&self, question_id: i64, form: &str, token: Option<&str>) -> Response<Body> {
        let mut req = Request::post(format!("/{}/vote/", question_id))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(req.body(Body::from(form.to_string())).unwrap()).await
    }

    pub async fn post_json(
        &self,
        uri: &str,
        body: serde_json::Value,
        token: Option<&str>,
        forwarded_for: Option<&str>,
    ) -> Response<Body> {
        let mut req = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(ip) = forwarded_for {
            req = req.header("x-forwarded-for", ip);
        }
        self.send(req.body(Body::from(body.to_string())).unwrap()).await
    }

    pub fn events(&self) -> Vec<AuthEvent> {
        self.events.seen.lock().unwrap().clone()
    }
}

pub async fn json<T: DeserializeOwned>(resp: Response<Body>) -> T {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn location(resp: &Response<Body>) -> &str {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap()
}

/// `name=value` pair of the flash cookie set on a response, ready to send back.
pub fn flash_cookie(resp: &Response<Body>) -> String {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("flash="))
        .and_then(|v| v.split(';').next())
        .map(String::from)
        .unwrap()
}
