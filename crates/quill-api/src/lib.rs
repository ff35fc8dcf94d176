pub mod auth;
pub mod comments;
pub mod convert;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod posts;
pub mod users;
pub mod validate;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
};
use serde_json::{Value, json};

use crate::auth::AppState;
use crate::middleware::require_auth;

/// Images and avatars travel as base64 inside JSON bodies.
pub const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Builds the full API router. Protected routes sit behind the bearer-token
/// middleware; everything else is public.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/posts", get(posts::list_posts))
        .route("/posts/{post_id}", get(posts::get_post))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/user/profile", get(users::get_profile))
        .route("/user/change-password", put(users::change_password))
        .route("/user/avatar", put(users::update_avatar))
        .route("/user/delete", delete(users::delete_account))
        .route("/posts", post(posts::create_post))
        .route("/posts/{post_id}", put(posts::update_post).delete(posts::delete_post))
        .route("/posts/{post_id}/comments", post(comments::add_comment))
        .route("/comments/{comment_id}", delete(comments::delete_comment))
        .layer(from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
