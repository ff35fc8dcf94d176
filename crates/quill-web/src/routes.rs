use axum::{
    Form,
    extract::{Multipart, Path, State, multipart::MultipartRejection},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::PrivateCookieJar;
use serde::Deserialize;
use tracing::{info, warn};

use quill_types::api::{
    AvatarRequest, ChangePasswordRequest, CreateCommentRequest, CreatePostRequest, LoginRequest,
    RegisterRequest, UpdatePostRequest,
};

use crate::WebState;
use crate::pages::{self, ProfileView};
use crate::session::{Level, Session, flash, take_flashes};
use crate::upload::UploadForm;

// ── Form bodies ─────────────────────────────────────────────────────────
//
// Every field defaults to empty so a short form never turns into an
// extractor rejection; the API does the validating.

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CommentForm {
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DeleteCommentForm {
    pub post_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EditPostForm {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChangePasswordForm {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn redirect(jar: PrivateCookieJar, to: &str) -> Response {
    (jar, Redirect::to(to)).into_response()
}

/// Render `body` inside the layout, draining any pending flashes.
fn render(jar: PrivateCookieJar, title: &str, active: &str, body: String) -> Response {
    let session = Session::load(&jar);
    let (jar, flashes) = take_flashes(jar);
    let html = pages::layout(
        title,
        active,
        session.as_ref().map(|s| &s.user),
        &flashes,
        &body,
    );
    (jar, Html(html)).into_response()
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() { None } else { Some(value) }
}

// ── Public pages ────────────────────────────────────────────────────────

pub async fn index(State(state): State<WebState>, jar: PrivateCookieJar) -> Response {
    let (jar, posts) = match state.api.list_posts().await {
        Ok(posts) => (jar, posts),
        Err(e) => {
            warn!("Listing posts failed: {}", e);
            (flash(jar, Level::Danger, e.notice()), Vec::new())
        }
    };
    render(jar, "Home", "home", pages::index(&posts))
}

pub async fn about(jar: PrivateCookieJar) -> Response {
    render(jar, "About", "about", pages::about())
}

pub async fn contact(jar: PrivateCookieJar) -> Response {
    render(jar, "Contact", "contact", pages::contact())
}

pub async fn post_detail(
    State(state): State<WebState>,
    jar: PrivateCookieJar,
    Path(post_id): Path<i64>,
) -> Response {
    match state.api.get_post(post_id).await {
        Ok(detail) => {
            let session = Session::load(&jar);
            let body = pages::post_detail(&detail, session.as_ref().map(|s| &s.user));
            let title = detail.post.title.clone();
            render(jar, &title, "", body)
        }
        Err(e) if e.status() == Some(StatusCode::NOT_FOUND) => {
            redirect(flash(jar, Level::Warning, "Post not found"), "/")
        }
        Err(e) => {
            warn!("Loading post {} failed: {}", post_id, e);
            redirect(flash(jar, Level::Danger, "Error loading post"), "/")
        }
    }
}

// ── Registration & login ────────────────────────────────────────────────

pub async fn register_page(jar: PrivateCookieJar) -> Response {
    render(jar, "Register", "register", pages::register_form())
}

pub async fn register(
    State(state): State<WebState>,
    jar: PrivateCookieJar,
    Form(form): Form<RegisterForm>,
) -> Response {
    let req = RegisterRequest {
        username: form.username,
        email: form.email,
        password: form.password,
    };

    match state.api.register(&req).await {
        Ok(_) => {
            info!("Registered {}", req.username);
            let jar = flash(jar, Level::Success, "Registration successful! Please login.");
            redirect(jar, "/login")
        }
        Err(e) => {
            let jar = flash(jar, Level::Danger, e.notice());
            render(jar, "Register", "register", pages::register_form())
        }
    }
}

pub async fn login_page(jar: PrivateCookieJar) -> Response {
    render(jar, "Log in", "login", pages::login_form())
}

pub async fn login(
    State(state): State<WebState>,
    jar: PrivateCookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let req = LoginRequest {
        email: form.email,
        password: form.password,
    };

    match state.api.login(&req).await {
        Ok(resp) => {
            let session = Session {
                token: resp.access_token,
                user: resp.user.into(),
            };
            let jar = session.store(jar);
            let jar = flash(jar, Level::Success, "Logged in successfully!");
            redirect(jar, "/")
        }
        Err(e) => {
            warn!("Login failed: {}", e);
            let jar = flash(jar, Level::Danger, "Invalid credentials");
            render(jar, "Log in", "login", pages::login_form())
        }
    }
}

pub async fn logout(jar: PrivateCookieJar) -> Response {
    let jar = Session::clear(jar);
    redirect(flash(jar, Level::Info, "Logged out"), "/")
}

// ── Posts ───────────────────────────────────────────────────────────────

pub async fn create_post_page(jar: PrivateCookieJar) -> Response {
    if Session::load(&jar).is_none() {
        return redirect(jar, "/login");
    }
    render(jar, "New post", "create", pages::create_post_form())
}

pub async fn create_post(
    State(state): State<WebState>,
    jar: PrivateCookieJar,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let Some(session) = Session::load(&jar) else {
        return redirect(jar, "/login");
    };

    let form = match multipart {
        Ok(multipart) => UploadForm::read(multipart).await,
        Err(rejection) => {
            warn!("Create post without a multipart body: {}", rejection);
            let jar = flash(jar, Level::Danger, "Error creating post");
            return render(jar, "New post", "create", pages::create_post_form());
        }
    };
    let form = match form {
        Ok(form) => form,
        Err(e) => {
            warn!("Reading post upload failed: {}", e);
            let jar = flash(jar, Level::Danger, "Error creating post");
            return render(jar, "New post", "create", pages::create_post_form());
        }
    };

    let req = CreatePostRequest {
        title: form.text("title"),
        content: form.text("content"),
        image: form.file_base64("image"),
    };

    match state.api.create_post(&session.token, &req).await {
        Ok(post) => {
            info!("{} created post {}", session.user.username, post.id);
            redirect(flash(jar, Level::Success, "Post created!"), "/")
        }
        Err(e) => {
            warn!("Creating post failed: {}", e);
            let jar = flash(jar, Level::Danger, "Error creating post");
            render(jar, "New post", "create", pages::create_post_form())
        }
    }
}

pub async fn edit_post_page(
    State(state): State<WebState>,
    jar: PrivateCookieJar,
    Path(post_id): Path<i64>,
) -> Response {
    if Session::load(&jar).is_none() {
        return redirect(jar, "/login");
    }

    match state.api.get_post(post_id).await {
        Ok(detail) => render(jar, "Edit post", "", pages::edit_post_form(&detail.post)),
        Err(e) => redirect(flash(jar, Level::Warning, e.notice()), "/"),
    }
}

pub async fn edit_post(
    State(state): State<WebState>,
    jar: PrivateCookieJar,
    Path(post_id): Path<i64>,
    Form(form): Form<EditPostForm>,
) -> Response {
    let Some(session) = Session::load(&jar) else {
        return redirect(jar, "/login");
    };

    let req = UpdatePostRequest {
        title: non_empty(form.title),
        content: non_empty(form.content),
    };

    let jar = match state.api.update_post(&session.token, post_id, &req).await {
        Ok(_) => flash(jar, Level::Success, "Post updated!"),
        Err(e) => flash(jar, Level::Danger, e.notice()),
    };
    redirect(jar, &format!("/post/{post_id}"))
}

pub async fn delete_post(
    State(state): State<WebState>,
    jar: PrivateCookieJar,
    Path(post_id): Path<i64>,
) -> Response {
    let Some(session) = Session::load(&jar) else {
        return redirect(jar, "/login");
    };

    let jar = match state.api.delete_post(&session.token, post_id).await {
        Ok(_) => flash(jar, Level::Info, "Post deleted"),
        Err(e) => flash(jar, Level::Danger, e.notice()),
    };
    redirect(jar, "/")
}

// ── Comments ────────────────────────────────────────────────────────────

pub async fn add_comment(
    State(state): State<WebState>,
    jar: PrivateCookieJar,
    Path(post_id): Path<i64>,
    Form(form): Form<CommentForm>,
) -> Response {
    let Some(session) = Session::load(&jar) else {
        let jar = flash(jar, Level::Warning, "You must be logged in to comment");
        return redirect(jar, "/login");
    };

    let req = CreateCommentRequest {
        content: form.message,
    };
    let jar = match state.api.add_comment(&session.token, post_id, &req).await {
        Ok(_) => jar,
        Err(e) => flash(jar, Level::Danger, e.notice()),
    };
    redirect(jar, &format!("/post/{post_id}"))
}

pub async fn delete_comment(
    State(state): State<WebState>,
    jar: PrivateCookieJar,
    Path(comment_id): Path<i64>,
    Form(form): Form<DeleteCommentForm>,
) -> Response {
    let Some(session) = Session::load(&jar) else {
        return redirect(jar, "/login");
    };

    let jar = match state.api.delete_comment(&session.token, comment_id).await {
        Ok(_) => flash(jar, Level::Info, "Comment deleted"),
        Err(e) => flash(jar, Level::Danger, e.notice()),
    };
    let back = form
        .post_id
        .map_or_else(|| "/".to_string(), |id| format!("/post/{id}"));
    redirect(jar, &back)
}

// ── Profile & account ───────────────────────────────────────────────────

pub async fn profile(State(state): State<WebState>, jar: PrivateCookieJar) -> Response {
    let Some(session) = Session::load(&jar) else {
        return redirect(jar, "/login");
    };

    let body = match state.api.profile(&session.token).await {
        Ok(profile) => pages::profile(&ProfileView {
            username: &profile.user.username,
            email: &profile.user.email,
            avatar: profile.user.avatar.as_deref(),
            posts: &profile.posts,
        }),
        Err(e) => {
            warn!("Loading profile failed, using session copy: {}", e);
            pages::profile(&ProfileView {
                username: &session.user.username,
                email: &session.user.email,
                avatar: None,
                posts: &[],
            })
        }
    };
    render(jar, "Profile", "profile", body)
}

pub async fn update_avatar(
    State(state): State<WebState>,
    jar: PrivateCookieJar,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let Some(session) = Session::load(&jar) else {
        return redirect(jar, "/login");
    };

    let avatar = match multipart {
        Ok(multipart) => UploadForm::read(multipart)
            .await
            .map_err(|e| warn!("Reading avatar upload failed: {}", e))
            .ok()
            .and_then(|form| form.file_base64("avatar")),
        Err(rejection) => {
            warn!("Avatar update without a multipart body: {}", rejection);
            None
        }
    };

    // Nothing picked: nothing to do.
    let Some(avatar) = avatar else {
        return redirect(jar, "/profile");
    };

    let req = AvatarRequest {
        avatar: Some(avatar),
    };
    let jar = match state.api.update_avatar(&session.token, &req).await {
        Ok(_) => flash(jar, Level::Success, "Avatar updated!"),
        Err(e) => {
            warn!("Updating avatar failed: {}", e);
            flash(jar, Level::Danger, "Error updating avatar")
        }
    };
    redirect(jar, "/profile")
}

pub async fn change_password(
    State(state): State<WebState>,
    jar: PrivateCookieJar,
    Form(form): Form<ChangePasswordForm>,
) -> Response {
    let Some(session) = Session::load(&jar) else {
        return redirect(jar, "/login");
    };

    if form.new_password != form.confirm_password {
        let jar = flash(jar, Level::Danger, "New passwords do not match!");
        return redirect(jar, "/profile");
    }

    let req = ChangePasswordRequest {
        current_password: Some(form.current_password),
        new_password: Some(form.new_password),
    };
    let jar = match state.api.change_password(&session.token, &req).await {
        Ok(_) => flash(jar, Level::Success, "Password updated successfully"),
        Err(e) if e.status() == Some(StatusCode::UNAUTHORIZED) => {
            flash(jar, Level::Danger, "Incorrect current password!")
        }
        Err(e) => flash(jar, Level::Danger, format!("Error: {}", e.notice())),
    };
    redirect(jar, "/profile")
}

pub async fn delete_account(State(state): State<WebState>, jar: PrivateCookieJar) -> Response {
    let Some(session) = Session::load(&jar) else {
        return redirect(jar, "/login");
    };

    match state.api.delete_account(&session.token).await {
        Ok(_) => {
            info!("{} deleted their account", session.user.username);
            let jar = Session::clear(jar);
            redirect(flash(jar, Level::Info, "Account deleted"), "/")
        }
        Err(e) => {
            warn!("Deleting account failed: {}", e);
            redirect(flash(jar, Level::Danger, e.notice()), "/profile")
        }
    }
}
