use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{debug, info};

use quill_db::is_constraint_violation;
use quill_types::api::{CreatePostRequest, MessageResponse, PostDetailResponse, UpdatePostRequest};

use crate::auth::{AppState, with_db};
use crate::convert::{comment_response, post_response};
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::middleware::AuthUser;
use crate::validate::{MAX_TITLE_CHARS, max_chars};

/// GET /posts: every post, newest first.
pub async fn list_posts(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rows = with_db(&state, |db| Ok(db.list_posts()?)).await?;
    Ok(Json(rows.into_iter().map(post_response).collect::<Vec<_>>()))
}

/// GET /posts/{post_id}: the post with its comments, newest first.
pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let (post, comments) = with_db(&state, move |db| {
        let post = db
            .get_post(post_id)?
            .ok_or_else(|| ApiError::not_found("Post not found"))?;
        let comments = db.list_comments_for_post(post_id)?;
        Ok((post, comments))
    })
    .await?;

    Ok(Json(PostDetailResponse {
        post: post_response(post),
        comments: comments.into_iter().map(comment_response).collect(),
    }))
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(req): ApiJson<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.title.trim().is_empty() || req.content.trim().is_empty() {
        return Err(ApiError::bad_request("Title and content are required"));
    }
    max_chars("Title", &req.title, MAX_TITLE_CHARS)?;

    debug!("Creating post for user {}: {:?}", auth.id, req.title);

    let row = with_db(&state, move |db| {
        db.create_post(auth.id, &req.title, &req.content, req.image.as_deref())
            .map_err(|e| {
                // Only the owner reference can violate a constraint here.
                if is_constraint_violation(&e) {
                    ApiError::not_found("User not found")
                } else {
                    ApiError::from(e)
                }
            })
    })
    .await?;

    info!("Post {} created by user {}", row.id, auth.id);

    Ok((StatusCode::CREATED, Json(post_response(row))))
}

/// PUT /posts/{post_id}: owner only; absent fields are left untouched.
pub async fn update_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(post_id): Path<i64>,
    ApiJson(req): ApiJson<UpdatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let blank = |field: &Option<String>| field.as_deref().is_some_and(|v| v.trim().is_empty());
    if blank(&req.title) || blank(&req.content) {
        return Err(ApiError::bad_request("Title and content are required"));
    }
    if let Some(title) = &req.title {
        max_chars("Title", title, MAX_TITLE_CHARS)?;
    }

    let row = with_db(&state, move |db| {
        let post = db
            .get_post(post_id)?
            .ok_or_else(|| ApiError::not_found("Post not found"))?;
        if post.user_id != auth.id {
            return Err(ApiError::forbidden());
        }

        db.update_post(post_id, req.title.as_deref(), req.content.as_deref())?
            .ok_or_else(|| ApiError::not_found("Post not found"))
    })
    .await?;

    Ok(Json(post_response(row)))
}

/// DELETE /posts/{post_id}: owner only; comments go with the post.
pub async fn delete_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    with_db(&state, move |db| {
        let post = db
            .get_post(post_id)?
            .ok_or_else(|| ApiError::not_found("Post not found"))?;
        if post.user_id != auth.id {
            return Err(ApiError::forbidden());
        }
        db.delete_post(post_id)?;
        Ok(())
    })
    .await?;

    info!("Post {} deleted by user {}", post_id, auth.id);

    Ok(Json(MessageResponse::new("Post deleted")))
}
