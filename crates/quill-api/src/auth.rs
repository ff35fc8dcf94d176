use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{error, info, warn};

use quill_db::{Database, is_constraint_violation};
use quill_types::api::{Claims, LoginRequest, LoginResponse, MessageResponse, RegisterRequest};

use crate::convert::user_response;
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::validate::{MAX_EMAIL_CHARS, MAX_USERNAME_CHARS, max_chars};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
}

/// Run blocking DB work off the async runtime.
pub(crate) async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })?
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.trim().to_string();
    let email = req.email.trim().to_string();
    if username.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request("Username, email and password are required"));
    }
    max_chars("Username", &username, MAX_USERNAME_CHARS)?;
    max_chars("Email", &email, MAX_EMAIL_CHARS)?;

    let password = req.password;
    let name = username.clone();
    with_db(&state, move |db| {
        if let Some(conflict) = registration_conflict(db, &name, &email)? {
            return Err(conflict);
        }

        let password_hash = hash_password(&password)?;

        // A concurrent registration can slip past the check above.
        match db.create_user(&name, &email, &password_hash) {
            Err(e) if is_constraint_violation(&e) => {
                Err(registration_conflict(db, &name, &email)?.unwrap_or_else(|| ApiError::from(e)))
            }
            other => Ok(other?),
        }
    })
    .await?;

    info!("Registered user {}", username);

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("User created successfully")),
    ))
}

/// The 400 for a username or email that is already taken, if either is.
fn registration_conflict(
    db: &Database,
    username: &str,
    email: &str,
) -> anyhow::Result<Option<ApiError>> {
    if db.get_user_by_username(username)?.is_some() {
        return Ok(Some(ApiError::bad_request("User already exists")));
    }
    if db.get_user_by_email(email)?.is_some() {
        return Ok(Some(ApiError::bad_request("Email already exists")));
    }
    Ok(None)
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = with_db(&state, move |db| {
        let Some(user) = db.get_user_by_email(&req.email)? else {
            return Ok(None);
        };
        if verify_password(&user.password_hash, &req.password)? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    })
    .await?
    .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".into()))?;

    let access_token = create_token(&state.jwt_secret, user.id, state.token_ttl)?;

    info!("User {} logged in", user.username);

    Ok(Json(LoginResponse {
        access_token,
        user: user_response(user),
    }))
}

/// Hash a password with Argon2id and a fresh random salt.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

/// Check `password` against a stored PHC hash string.
pub fn verify_password(password_hash: &str, password: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(password_hash)
        .map_err(|e| anyhow::anyhow!("Stored password hash is corrupt: {}", e))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => {
            warn!("Password verification error: {}", e);
            Ok(false)
        }
    }
}

/// Sign an HS256 token for `user_id`, valid for `ttl` from now.
pub fn create_token(secret: &str, user_id: i64, ttl: chrono::Duration) -> anyhow::Result<String> {
    let now = chrono::Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp() as usize,
        exp: (now + ttl).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
