use axum::{Extension, Json, extract::State, response::IntoResponse};
use tracing::info;

use quill_types::api::{AvatarRequest, AvatarResponse, ChangePasswordRequest, MessageResponse, ProfileResponse};

use crate::auth::{AppState, hash_password, verify_password, with_db};
use crate::convert::{post_response, user_response};
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::middleware::AuthUser;

/// GET /user/profile: the caller's record plus their posts, newest first.
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, posts) = with_db(&state, move |db| {
        let user = db
            .get_user_by_id(auth.id)?
            .ok_or_else(|| ApiError::not_found("User not found"))?;
        let posts = db.list_posts_by_user(auth.id)?;
        Ok((user, posts))
    })
    .await?;

    Ok(Json(ProfileResponse {
        user: user_response(user),
        posts: posts.into_iter().map(post_response).collect(),
    }))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(current), Some(new)) = (
        req.current_password.filter(|p| !p.is_empty()),
        req.new_password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::bad_request("Both current and new passwords are required"));
    };

    with_db(&state, move |db| {
        let user = db
            .get_user_by_id(auth.id)?
            .ok_or_else(|| ApiError::not_found("User not found"))?;

        if !verify_password(&user.password_hash, &current)? {
            return Err(ApiError::Unauthorized("Incorrect current password".into()));
        }

        db.update_password(auth.id, &hash_password(&new)?)?;
        Ok(())
    })
    .await?;

    info!("User {} changed their password", auth.id);

    Ok(Json(MessageResponse::new("Password updated successfully")))
}

/// DELETE /user/delete: removes the account and, by cascade, everything it owns.
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = with_db(&state, move |db| Ok(db.delete_user(auth.id)?)).await?;
    if !deleted {
        return Err(ApiError::not_found("User not found"));
    }

    info!("User {} deleted their account", auth.id);

    Ok(Json(MessageResponse::new("Account deleted")))
}

pub async fn update_avatar(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(req): ApiJson<AvatarRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let avatar = req.avatar;
    let stored = avatar.clone();
    let updated = with_db(&state, move |db| Ok(db.update_avatar(auth.id, stored.as_deref())?)).await?;
    if !updated {
        return Err(ApiError::not_found("User not found"));
    }

    Ok(Json(AvatarResponse {
        message: "Avatar updated".into(),
        avatar,
    }))
}
