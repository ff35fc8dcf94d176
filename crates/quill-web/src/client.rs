use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::warn;

use quill_types::api::{
    AvatarRequest, AvatarResponse, ChangePasswordRequest, CommentResponse, CreateCommentRequest,
    CreatePostRequest, LoginRequest, LoginResponse, MessageResponse, PostDetailResponse,
    PostResponse, ProfileResponse, RegisterRequest, UpdatePostRequest,
};

#[derive(Debug, Error)]
pub enum ClientError {
    /// The API could not be reached or sent back something unreadable.
    #[error("Error connecting to API: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("{message}")]
    Api { status: StatusCode, message: String },
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Transport(_) => None,
        }
    }

    /// One-line text that is safe to show to the user.
    pub fn notice(&self) -> String {
        match self {
            Self::Api { message, .. } => message.clone(),
            Self::Transport(_) => "Error connecting to API".into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Thin typed wrapper over the JSON API.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let resp = req.send().await.map_err(|e| {
            warn!("API request failed: {}", e);
            e
        })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json::<T>().await?);
        }

        let message = resp
            .json::<MessageResponse>()
            .await
            .map(|m| m.message)
            .unwrap_or_else(|_| "Unknown error".into());
        Err(ClientError::Api { status, message })
    }

    // -- Public --

    pub async fn list_posts(&self) -> Result<Vec<PostResponse>> {
        self.send(self.http.get(self.url("/posts"))).await
    }

    pub async fn get_post(&self, post_id: i64) -> Result<PostDetailResponse> {
        self.send(self.http.get(self.url(&format!("/posts/{post_id}")))).await
    }

    pub async fn register(&self, req: &RegisterRequest) -> Result<MessageResponse> {
        self.send(self.http.post(self.url("/register")).json(req)).await
    }

    pub async fn login(&self, req: &LoginRequest) -> Result<LoginResponse> {
        self.send(self.http.post(self.url("/login")).json(req)).await
    }

    // -- Authenticated --

    pub async fn profile(&self, token: &str) -> Result<ProfileResponse> {
        self.send(self.http.get(self.url("/user/profile")).bearer_auth(token))
            .await
    }

    pub async fn change_password(
        &self,
        token: &str,
        req: &ChangePasswordRequest,
    ) -> Result<MessageResponse> {
        self.send(
            self.http
                .put(self.url("/user/change-password"))
                .bearer_auth(token)
                .json(req),
        )
        .await
    }

    pub async fn update_avatar(&self, token: &str, req: &AvatarRequest) -> Result<AvatarResponse> {
        self.send(
            self.http
                .put(self.url("/user/avatar"))
                .bearer_auth(token)
                .json(req),
        )
        .await
    }

    pub async fn delete_account(&self, token: &str) -> Result<MessageResponse> {
        self.send(self.http.delete(self.url("/user/delete")).bearer_auth(token))
            .await
    }

    pub async fn create_post(&self, token: &str, req: &CreatePostRequest) -> Result<PostResponse> {
        self.send(
            self.http
                .post(self.url("/posts"))
                .bearer_auth(token)
                .json(req),
        )
        .await
    }

    pub async fn update_post(
        &self,
        token: &str,
        post_id: i64,
        req: &UpdatePostRequest,
    ) -> Result<PostResponse> {
        self.send(
            self.http
                .put(self.url(&format!("/posts/{post_id}")))
                .bearer_auth(token)
                .json(req),
        )
        .await
    }

    pub async fn delete_post(&self, token: &str, post_id: i64) -> Result<MessageResponse> {
        self.send(
            self.http
                .delete(self.url(&format!("/posts/{post_id}")))
                .bearer_auth(token),
        )
        .await
    }

    pub async fn add_comment(
        &self,
        token: &str,
        post_id: i64,
        req: &CreateCommentRequest,
    ) -> Result<CommentResponse> {
        self.send(
            self.http
                .post(self.url(&format!("/posts/{post_id}/comments")))
                .bearer_auth(token)
                .json(req),
        )
        .await
    }

    pub async fn delete_comment(&self, token: &str, comment_id: i64) -> Result<MessageResponse> {
        self.send(
            self.http
                .delete(self.url(&format!("/comments/{comment_id}")))
                .bearer_auth(token),
        )
        .await
    }
}
