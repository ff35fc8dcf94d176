//! End-to-end tests of the API router against an in-memory database.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use quill_api::auth::{AppState, AppStateInner, create_token};
use quill_db::Database;

const SECRET: &str = "test-secret";

struct TestApp {
    router: Router,
    state: AppState,
}

impl TestApp {
    fn new() -> Self {
        let state: AppState = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            jwt_secret: SECRET.into(),
            token_ttl: chrono::Duration::minutes(15),
        });
        Self {
            router: quill_api::router(state.clone()),
            state,
        }
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    async fn register(&self, username: &str) -> StatusCode {
        let (status, _) = self
            .send(
                "POST",
                "/register",
                None,
                Some(json!({
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "password": "password123",
                })),
            )
            .await;
        status
    }

    /// Registers `username` and returns a bearer token for them.
    async fn user(&self, username: &str) -> String {
        assert_eq!(self.register(username).await, StatusCode::CREATED);
        let (status, body) = self
            .send(
                "POST",
                "/login",
                None,
                Some(json!({
                    "email": format!("{username}@example.com"),
                    "password": "password123",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["access_token"].as_str().unwrap().to_string()
    }

    async fn create_post(&self, token: &str, title: &str, content: &str) -> Value {
        let (status, body) = self
            .send(
                "POST",
                "/posts",
                Some(token),
                Some(json!({ "title": title, "content": content })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body
    }

    fn count(&self, table: &str) -> i64 {
        self.state
            .db
            .with_conn(|conn| {
                Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?)
            })
            .unwrap()
    }
}

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new();
    let (status, body) = app.send("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn duplicate_username_is_rejected_once() {
    let app = TestApp::new();
    assert_eq!(app.register("ada").await, StatusCode::CREATED);

    let (status, body) = app
        .send(
            "POST",
            "/register",
            None,
            Some(json!({ "username": "ada", "email": "other@example.com", "password": "pw" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "User already exists");
    assert_eq!(app.count("users"), 1);
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let app = TestApp::new();
    assert_eq!(app.register("ada").await, StatusCode::CREATED);

    let (status, body) = app
        .send(
            "POST",
            "/register",
            None,
            Some(json!({ "username": "grace", "email": "ada@example.com", "password": "pw" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Email already exists");
}

#[tokio::test]
async fn register_requires_every_field() {
    let app = TestApp::new();

    let (status, _) = app
        .send("POST", "/register", None, Some(json!({ "username": "ada" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            "POST",
            "/register",
            None,
            Some(json!({ "username": "  ", "email": "a@example.com", "password": "pw" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.send("POST", "/register", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.count("users"), 0);
}

#[tokio::test]
async fn login_token_authorizes_profile() {
    let app = TestApp::new();
    assert_eq!(app.register("ada").await, StatusCode::CREATED);

    let (status, body) = app
        .send(
            "POST",
            "/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "password123" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "ada");
    assert!(body["user"].get("password_hash").is_none());

    let token = body["access_token"].as_str().unwrap();
    let (status, profile) = app.send("GET", "/user/profile", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["email"], "ada@example.com");
    assert!(profile["posts"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn wrong_password_never_issues_a_token() {
    let app = TestApp::new();
    assert_eq!(app.register("ada").await, StatusCode::CREATED);

    for (email, password) in [("ada@example.com", "nope"), ("nobody@example.com", "password123")] {
        let (status, body) = app
            .send("POST", "/login", None, Some(json!({ "email": email, "password": password })))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid credentials");
        assert!(body.get("access_token").is_none());
    }
}

#[tokio::test]
async fn missing_and_invalid_tokens_are_distinguished() {
    let app = TestApp::new();

    let (status, body) = app.send("GET", "/user/profile", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["message"].as_str().unwrap().starts_with("Missing token"));

    let (status, body) = app.send("GET", "/user/profile", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["message"].as_str().unwrap().starts_with("Invalid token"));

    let req = Request::builder()
        .uri("/user/profile")
        .header(header::AUTHORIZATION, "Token abc")
        .body(Body::empty())
        .unwrap();
    let resp = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_token_is_unauthorized() {
    let app = TestApp::new();
    app.user("ada").await;

    let expired = create_token(SECRET, 1, chrono::Duration::hours(-2)).unwrap();
    let (status, body) = app.send("GET", "/user/profile", Some(&expired), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Token has expired");
}

#[tokio::test]
async fn profile_of_vanished_user_is_not_found() {
    let app = TestApp::new();
    let token = create_token(SECRET, 999, chrono::Duration::minutes(5)).unwrap();
    let (status, body) = app.send("GET", "/user/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User not found");
}

#[tokio::test]
async fn post_round_trip() {
    let app = TestApp::new();
    let token = app.user("ada").await;

    let created = app.create_post(&token, "Hello", "First post").await;
    let id = created["id"].as_i64().unwrap();

    let (status, post) = app.send("GET", &format!("/posts/{id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(post["title"], "Hello");
    assert_eq!(post["content"], "First post");
    assert_eq!(post["author"], "ada");
    assert!(post["image"].is_null());
    assert!(post["comments"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn create_post_keeps_image_and_validates_input() {
    let app = TestApp::new();
    let token = app.user("ada").await;

    let (status, body) = app
        .send(
            "POST",
            "/posts",
            Some(&token),
            Some(json!({ "title": "pic", "content": "see", "image": "iVBORw0KGgo=" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["image"], "iVBORw0KGgo=");

    let (status, _) = app
        .send("POST", "/posts", Some(&token), Some(json!({ "title": "no body" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send("POST", "/posts", Some(&token), Some(json!({ "title": "", "content": "x" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_post_is_not_found() {
    let app = TestApp::new();
    let token = app.user("ada").await;

    let (status, body) = app.send("GET", "/posts/404", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Post not found");

    let (status, _) = app
        .send("PUT", "/posts/404", Some(&token), Some(json!({ "title": "x" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.send("DELETE", "/posts/404", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send("POST", "/posts/404/comments", Some(&token), Some(json!({ "content": "hi" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn posts_are_listed_newest_first() {
    let app = TestApp::new();
    let token = app.user("ada").await;
    for i in 0..5 {
        app.create_post(&token, &format!("post {i}"), "body").await;
    }

    let (status, body) = app.send("GET", "/posts", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let posts = body.as_array().unwrap();
    assert_eq!(posts.len(), 5);
    assert_eq!(posts[0]["title"], "post 4");

    let stamps: Vec<chrono::DateTime<chrono::Utc>> = posts
        .iter()
        .map(|p| serde_json::from_value(p["created_at"].clone()).unwrap())
        .collect();
    assert!(stamps.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
async fn overlong_fields_are_rejected() {
    let app = TestApp::new();

    let (status, body) = app
        .send(
            "POST",
            "/register",
            None,
            Some(json!({
                "username": "a".repeat(81),
                "email": "long@example.com",
                "password": "pw",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Username must be at most 80 characters");

    let (status, body) = app
        .send(
            "POST",
            "/register",
            None,
            Some(json!({
                "username": "long",
                "email": format!("{}@example.com", "a".repeat(120)),
                "password": "pw",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Email must be at most 120 characters");
    assert_eq!(app.count("users"), 0);

    // exactly at the limit is fine
    let token = app.user(&"a".repeat(80)).await;

    let (status, body) = app
        .send(
            "POST",
            "/posts",
            Some(&token),
            Some(json!({ "title": "t".repeat(201), "content": "body" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Title must be at most 200 characters");

    let post = app.create_post(&token, &"t".repeat(200), "body").await;
    let (status, _) = app
        .send(
            "PUT",
            &format!("/posts/{}", post["id"]),
            Some(&token),
            Some(json!({ "title": "t".repeat(201) })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_cannot_blank_a_post() {
    let app = TestApp::new();
    let token = app.user("ada").await;
    let post = app.create_post(&token, "Title", "body").await;
    let uri = format!("/posts/{}", post["id"]);

    for patch in [
        json!({ "title": "   " }),
        json!({ "content": "" }),
        json!({ "title": "ok", "content": " \n" }),
    ] {
        let (status, body) = app.send("PUT", &uri, Some(&token), Some(patch)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Title and content are required");
    }

    let (_, stored) = app.send("GET", &uri, None, None).await;
    assert_eq!(stored["title"], "Title");
    assert_eq!(stored["content"], "body");
}

#[tokio::test]
async fn owner_can_update_and_delete_post() {
    let app = TestApp::new();
    let token = app.user("ada").await;
    let post = app.create_post(&token, "Draft", "body").await;
    let uri = format!("/posts/{}", post["id"]);

    let (status, updated) = app
        .send("PUT", &uri, Some(&token), Some(json!({ "title": "Final" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Final");
    assert_eq!(updated["content"], "body");

    let (status, body) = app.send("DELETE", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Post deleted");

    let (status, _) = app.send("GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_owner_cannot_touch_post() {
    let app = TestApp::new();
    let ada = app.user("ada").await;
    let grace = app.user("grace").await;
    let post = app.create_post(&ada, "Mine", "hands off").await;
    let uri = format!("/posts/{}", post["id"]);

    let (status, body) = app
        .send("PUT", &uri, Some(&grace), Some(json!({ "title": "Yours now" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Permission denied");

    let (status, _) = app.send("DELETE", &uri, Some(&grace), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, post) = app.send("GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(post["title"], "Mine");
    assert_eq!(post["content"], "hands off");
}

#[tokio::test]
async fn comments_are_listed_newest_first() {
    let app = TestApp::new();
    let token = app.user("ada").await;
    let post = app.create_post(&token, "t", "c").await;
    let id = post["id"].as_i64().unwrap();

    for content in ["first", "second"] {
        let (status, comment) = app
            .send(
                "POST",
                &format!("/posts/{id}/comments"),
                Some(&token),
                Some(json!({ "content": content })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(comment["author"], "ada");
        assert_eq!(comment["post_id"], id);
    }

    let (_, detail) = app.send("GET", &format!("/posts/{id}"), None, None).await;
    let comments = detail["comments"].as_array().unwrap();
    assert_eq!(comments[0]["content"], "second");
    assert_eq!(comments[1]["content"], "first");
}

#[tokio::test]
async fn comment_deletion_permissions() {
    let app = TestApp::new();
    let owner = app.user("owner").await;
    let author = app.user("author").await;
    let stranger = app.user("stranger").await;

    let post = app.create_post(&owner, "t", "c").await;
    let comments_uri = format!("/posts/{}/comments", post["id"]);

    let mut ids = Vec::new();
    for _ in 0..2 {
        let (_, comment) = app
            .send("POST", &comments_uri, Some(&author), Some(json!({ "content": "hi" })))
            .await;
        ids.push(comment["id"].as_i64().unwrap());
    }

    // a third party may not
    let (status, _) = app
        .send("DELETE", &format!("/comments/{}", ids[0]), Some(&stranger), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(app.count("comments"), 2);

    // the author may
    let (status, _) = app
        .send("DELETE", &format!("/comments/{}", ids[0]), Some(&author), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    // the post owner may moderate
    let (status, body) = app
        .send("DELETE", &format!("/comments/{}", ids[1]), Some(&owner), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Comment deleted");
    assert_eq!(app.count("comments"), 0);

    let (status, _) = app
        .send("DELETE", &format!("/comments/{}", ids[1]), Some(&owner), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn change_password_flow() {
    let app = TestApp::new();
    let token = app.user("ada").await;

    let (status, _) = app
        .send(
            "PUT",
            "/user/change-password",
            Some(&token),
            Some(json!({ "current_password": "password123" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .send(
            "PUT",
            "/user/change-password",
            Some(&token),
            Some(json!({ "current_password": "wrong", "new_password": "newpass" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Incorrect current password");

    let (status, _) = app
        .send(
            "PUT",
            "/user/change-password",
            Some(&token),
            Some(json!({ "current_password": "password123", "new_password": "newpass" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(
            "POST",
            "/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "newpass" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn avatar_is_stored_on_the_profile() {
    let app = TestApp::new();
    let token = app.user("ada").await;

    let (status, body) = app
        .send("PUT", "/user/avatar", Some(&token), Some(json!({ "avatar": "R0lGODlh" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["avatar"], "R0lGODlh");

    let (_, profile) = app.send("GET", "/user/profile", Some(&token), None).await;
    assert_eq!(profile["avatar"], "R0lGODlh");
}

#[tokio::test]
async fn deleting_account_cascades() {
    let app = TestApp::new();
    let ada = app.user("ada").await;
    let grace = app.user("grace").await;

    let ada_post = app.create_post(&ada, "ada", "post").await;
    let grace_post = app.create_post(&grace, "grace", "post").await;

    app.send(
        "POST",
        &format!("/posts/{}/comments", ada_post["id"]),
        Some(&grace),
        Some(json!({ "content": "on ada's post" })),
    )
    .await;
    app.send(
        "POST",
        &format!("/posts/{}/comments", grace_post["id"]),
        Some(&ada),
        Some(json!({ "content": "ada elsewhere" })),
    )
    .await;

    let (status, body) = app.send("DELETE", "/user/delete", Some(&ada), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Account deleted");

    assert_eq!(app.count("users"), 1);
    assert_eq!(app.count("posts"), 1);
    assert_eq!(app.count("comments"), 0);

    let (_, posts) = app.send("GET", "/posts", None, None).await;
    assert_eq!(posts.as_array().unwrap().len(), 1);
    assert_eq!(posts[0]["author"], "grace");

    // the token outlives the account
    let (status, _) = app.send("DELETE", "/user/delete", Some(&ada), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
