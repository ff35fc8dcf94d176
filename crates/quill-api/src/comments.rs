use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use quill_db::is_constraint_violation;
use quill_types::api::{CreateCommentRequest, MessageResponse};

use crate::auth::{AppState, with_db};
use crate::convert::comment_response;
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::middleware::AuthUser;

pub async fn add_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(post_id): Path<i64>,
    ApiJson(req): ApiJson<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.content.trim().is_empty() {
        return Err(ApiError::bad_request("Comment content is required"));
    }

    let row = with_db(&state, move |db| {
        if db.get_post(post_id)?.is_none() {
            return Err(ApiError::not_found("Post not found"));
        }
        db.create_comment(post_id, auth.id, &req.content).map_err(|e| {
            // The post can disappear between the check and the insert.
            if is_constraint_violation(&e) {
                ApiError::not_found("Post not found")
            } else {
                ApiError::from(e)
            }
        })
    })
    .await?;

    Ok((StatusCode::CREATED, Json(comment_response(row))))
}

/// DELETE /comments/{comment_id}: allowed to the comment's author and to the
/// owner of the post it sits under.
pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(comment_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    with_db(&state, move |db| {
        let comment = db
            .get_comment(comment_id)?
            .ok_or_else(|| ApiError::not_found("Comment not found"))?;

        let post_owner = db.get_post(comment.post_id)?.map(|p| p.user_id);
        if comment.user_id != auth.id && post_owner != Some(auth.id) {
            return Err(ApiError::forbidden());
        }

        db.delete_comment(comment_id)?;
        Ok(())
    })
    .await?;

    info!("Comment {} deleted by user {}", comment_id, auth.id);

    Ok(Json(MessageResponse::new("Comment deleted")))
}
