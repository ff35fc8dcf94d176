use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use tracing::debug;

use quill_types::api::Claims;

use crate::auth::AppState;
use crate::error::ApiError;

/// Identity of the caller, inserted into request extensions by [`require_auth`].
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: i64,
}

/// Extract and validate the bearer token from the Authorization header.
///
/// A missing header answers 401; a token that fails verification answers 422
/// so clients can tell "not logged in" from "broken token". Expired tokens
/// are the exception and answer 401.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ApiError::Unauthorized("Missing token: Missing Authorization Header".into()))?;

    let token = auth_header
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| {
            ApiError::Unauthorized(
                "Missing token: Missing 'Bearer' type in 'Authorization' header".into(),
            )
        })?;

    let user_id = verify_token(&state.jwt_secret, token)?;

    req.extensions_mut().insert(AuthUser { id: user_id });
    Ok(next.run(req).await)
}

/// Decode `token` and return the user id it was issued for.
pub fn verify_token(secret: &str, token: &str) -> Result<i64, ApiError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        debug!("Token rejected: {}", e);
        match e.kind() {
            ErrorKind::ExpiredSignature => ApiError::Unauthorized("Token has expired".into()),
            _ => ApiError::InvalidToken(format!("Invalid token: {}", e)),
        }
    })?;

    token_data
        .claims
        .sub
        .parse()
        .map_err(|_| ApiError::InvalidToken("Invalid token: subject is not a user id".into()))
}
