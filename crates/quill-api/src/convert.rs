//! Row-to-wire conversions.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

use quill_db::models::{CommentRow, PostRow, UserRow};
use quill_types::api::{CommentResponse, PostResponse, UserResponse};

pub fn user_response(row: UserRow) -> UserResponse {
    UserResponse {
        id: row.id,
        username: row.username,
        email: row.email,
        avatar: row.avatar,
    }
}

pub fn post_response(row: PostRow) -> PostResponse {
    PostResponse {
        created_at: parse_timestamp(&row.created_at, "post", row.id),
        id: row.id,
        title: row.title,
        content: row.content,
        image: row.image,
        author: row.author,
        user_id: row.user_id,
    }
}

pub fn comment_response(row: CommentRow) -> CommentResponse {
    CommentResponse {
        created_at: parse_timestamp(&row.created_at, "comment", row.id),
        id: row.id,
        content: row.content,
        author: row.author,
        user_id: row.user_id,
        post_id: row.post_id,
    }
}

fn parse_timestamp(raw: &str, kind: &str, id: i64) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Rows written by hand through sqlite3 use datetime('now'): no zone, no fraction.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on {} {}: {}", raw, kind, id, e);
            DateTime::default()
        })
}
