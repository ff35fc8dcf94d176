//! Rows as stored in SQLite. Post and comment rows carry the author's
//! username from a join; `created_at` stays as stored text.

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub avatar: Option<String>,
}

/// A post joined with its owner's username.
pub struct PostRow {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    pub created_at: String,
    pub user_id: i64,
    pub author: String,
}

/// A comment joined with its author's username.
#[derive(Debug)]
pub struct CommentRow {
    pub id: i64,
    pub content: String,
    pub created_at: String,
    pub user_id: i64,
    pub post_id: i64,
    pub author: String,
}
