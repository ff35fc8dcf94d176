pub mod client;
pub mod config;
pub mod pages;
pub mod routes;
pub mod session;
pub mod upload;

use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post},
};
use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};

use crate::client::ApiClient;

/// Largest multipart upload accepted from the browser.
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Shared state for every frontend handler.
#[derive(Clone)]
pub struct WebState {
    pub api: ApiClient,
    pub key: Key,
}

impl WebState {
    pub fn new(api_url: &str, secret: &str) -> Self {
        Self {
            api: ApiClient::new(api_url),
            key: cookie_key(secret),
        }
    }
}

impl FromRef<WebState> for Key {
    fn from_ref(state: &WebState) -> Self {
        state.key.clone()
    }
}

/// Stretch an arbitrary secret into the 64 bytes the cookie key needs.
pub fn cookie_key(secret: &str) -> Key {
    Key::from(Sha512::digest(secret.as_bytes()).as_slice())
}

pub fn router(state: WebState) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/about", get(routes::about))
        .route("/contact", get(routes::contact))
        .route("/post/{post_id}", get(routes::post_detail))
        .route("/post/{post_id}/comment", post(routes::add_comment))
        .route("/register", get(routes::register_page).post(routes::register))
        .route("/login", get(routes::login_page).post(routes::login))
        .route("/logout", get(routes::logout))
        .route("/create_post", get(routes::create_post_page).post(routes::create_post))
        .route("/edit_post/{post_id}", get(routes::edit_post_page).post(routes::edit_post))
        .route("/delete_post/{post_id}", post(routes::delete_post))
        .route("/delete_comment/{comment_id}", post(routes::delete_comment))
        .route("/profile", get(routes::profile))
        .route("/update_avatar", post(routes::update_avatar))
        .route("/change_password", post(routes::change_password))
        .route("/delete_account", post(routes::delete_account))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}
