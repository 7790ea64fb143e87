mod common;

use axum::http::StatusCode;
use serde_json::json as body;

use polls_types::api::{ErrorBody, LoginResponse, RegisterResponse};
use polls_types::events::AuthEvent;

use common::{TestApp, json};

#[tokio::test]
async fn register_login_logout_are_audited() {
    let app = TestApp::new();
    let creds = body!({ "username": "alice", "password": "correct horse" });

    let resp = app.post_json("/register/", creds.clone(), None, Some("198.51.100.4")).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let registered: RegisterResponse = json(resp).await;

    let resp = app.post_json("/login/", creds, None, Some("203.0.113.9, 10.0.0.1")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let login: LoginResponse = json(resp).await;
    assert_eq!(login.user_id, registered.user_id);
    assert_eq!(login.username, "alice");

    let resp = app.post_json("/logout/", body!({}), Some(&login.token), None).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    assert_eq!(
        app.events(),
        vec![
            AuthEvent::LoggedIn { username: "alice".into(), ip: Some("198.51.100.4".into()) },
            AuthEvent::LoggedIn { username: "alice".into(), ip: Some("203.0.113.9".into()) },
            AuthEvent::LoggedOut { username: "alice".into(), ip: None },
        ]
    );
}

#[tokio::test]
async fn bad_credentials_are_rejected_inline() {
    let app = TestApp::new();
    app.post_json("/register/", body!({ "username": "bob", "password": "hunter2hunter2" }), None, None)
        .await;

    let wrong_password = body!({ "username": "bob", "password": "nope-nope" });
    let resp = app.post_json("/login/", wrong_password, None, Some("192.0.2.1")).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let err: ErrorBody = json(resp).await;
    assert_eq!(err.error, "Please enter a correct username and password.");

    let unknown_user = body!({ "username": "carol", "password": "whatever1" });
    let resp = app.post_json("/login/", unknown_user, None, None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let events = app.events();
    assert_eq!(events.len(), 3);
    assert_eq!(
        events[1],
        AuthEvent::LoginFailed { username: "bob".into(), ip: Some("192.0.2.1".into()) }
    );
    assert_eq!(events[2], AuthEvent::LoginFailed { username: "carol".into(), ip: None });
}

#[tokio::test]
async fn registration_validates_input() {
    let app = TestApp::new();

    let resp = app.post_json("/register/", body!({ "username": "al", "password": "longenough" }), None, None).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app.post_json("/register/", body!({ "username": "alice", "password": "short" }), None, None).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    app.user("taken");
    let resp = app.post_json("/register/", body!({ "username": "taken", "password": "longenough" }), None, None).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    assert!(app.events().is_empty());
}

#[tokio::test]
async fn logout_requires_a_session() {
    let app = TestApp::new();
    let resp = app.post_json("/logout/", body!({}), None, None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(app.events().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registration_of_one_name_conflicts() {
    use axum::{body::Body, http::{Request, header}};
    use tower::ServiceExt;

    let app = TestApp::new();
    let creds = body!({ "username": "racer", "password": "fast-and-furious" }).to_string();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let router = app.router.clone();
            let creds = creds.clone();
            tokio::spawn(async move {
                let req = Request::post("/register/")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(creds))
                    .unwrap();
                router.oneshot(req).await.unwrap().status()
            })
        })
        .collect();

    let mut statuses = Vec::new();
    for handle in handles {
        statuses.push(handle.await.unwrap());
    }

    let created = statuses.iter().filter(|s| **s == StatusCode::CREATED).count();
    let conflicts = statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count();
    assert_eq!((created, conflicts), (1, 3), "statuses {:?}", statuses);
    assert_eq!(app.events().len(), 1);
}
