pub mod admin;
pub mod audit;
pub mod auth;
pub mod error;
pub mod flash;
pub mod middleware;
pub mod polls;
pub mod state;

use axum::{
    Router, middleware as layer,
    routing::{delete, get, post},
};

use crate::middleware::{optional_auth, require_auth, require_staff};
use crate::state::AppState;

/// All routes of the polls site. Tracing/CORS layers are left to the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(polls::index))
        .route("/{question_id}/results/", get(polls::results))
        .route("/register/", post(auth::register))
        .route("/login/", post(auth::login));

    let viewer_routes = Router::new()
        .route("/{question_id}/", get(polls::detail))
        .route_layer(layer::from_fn_with_state(state.clone(), optional_auth));

    let protected_routes = Router::new()
        .route("/{question_id}/vote/", post(polls::vote))
        .route("/logout/", post(auth::logout))
        .route_layer(layer::from_fn_with_state(state.clone(), require_auth));

    let admin_routes = Router::new()
        .route(
            "/admin/questions/",
            get(admin::list_questions).post(admin::create_question),
        )
        .route("/admin/questions/{question_id}/", delete(admin::delete_question))
        .route("/admin/questions/{question_id}/choices/", post(admin::add_choice))
        .route_layer(layer::from_fn_with_state(state.clone(), require_staff))
        .route_layer(layer::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(viewer_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .with_state(state)
}
