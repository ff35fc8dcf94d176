use crate::models::{CommentRow, PostRow, UserRow};
use crate::Database;
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};

const USER_COLUMNS: &str = "SELECT id, username, email, password_hash, avatar FROM users";

// JOIN users so every row carries its author's username (no N+1).
const POST_COLUMNS: &str = "SELECT p.id, p.title, p.content, p.image, p.created_at, p.user_id, u.username
     FROM posts p
     JOIN users u ON u.id = p.user_id";

const COMMENT_COLUMNS: &str = "SELECT c.id, c.content, c.created_at, c.user_id, c.post_id, u.username
     FROM comments c
     JOIN users u ON u.id = c.user_id";

impl Database {
    // -- Users --

    /// Returns the new user's id.
    pub fn create_user(&self, username: &str, email: &str, password_hash: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, email, password_hash) VALUES (?1, ?2, ?3)",
                (username, email, password_hash),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("{USER_COLUMNS} WHERE id = ?1");
            Ok(conn.query_row(&sql, [id], user_from_row).optional()?)
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("{USER_COLUMNS} WHERE username = ?1");
            Ok(conn.query_row(&sql, [username], user_from_row).optional()?)
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("{USER_COLUMNS} WHERE email = ?1");
            Ok(conn.query_row(&sql, [email], user_from_row).optional()?)
        })
    }

    /// Returns false if the user does not exist.
    pub fn update_password(&self, id: i64, password_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users SET password_hash = ?2 WHERE id = ?1",
                (id, password_hash),
            )?;
            Ok(n > 0)
        })
    }

    /// Returns false if the user does not exist.
    pub fn update_avatar(&self, id: i64, avatar: Option<&str>) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("UPDATE users SET avatar = ?2 WHERE id = ?1", (id, avatar))?;
            Ok(n > 0)
        })
    }

    /// Deletes the user; posts, comments on those posts and the user's own
    /// comments go with it via `ON DELETE CASCADE`.
    pub fn delete_user(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }

    // -- Posts --

    pub fn create_post(
        &self,
        user_id: i64,
        title: &str,
        content: &str,
        image: Option<&str>,
    ) -> Result<PostRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO posts (title, content, image, user_id) VALUES (?1, ?2, ?3, ?4)",
                (title, content, image, user_id),
            )?;
            let id = conn.last_insert_rowid();
            let sql = format!("{POST_COLUMNS} WHERE p.id = ?1");
            Ok(conn.query_row(&sql, [id], post_from_row)?)
        })
    }

    pub fn get_post(&self, id: i64) -> Result<Option<PostRow>> {
        self.with_conn(|conn| query_post(conn, id))
    }

    /// All posts, newest first.
    pub fn list_posts(&self) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!("{POST_COLUMNS} ORDER BY p.created_at DESC, p.id DESC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], post_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Posts owned by `user_id`, newest first.
    pub fn list_posts_by_user(&self, user_id: i64) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{POST_COLUMNS} WHERE p.user_id = ?1 ORDER BY p.created_at DESC, p.id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], post_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// `None` fields keep their stored value. Returns the post as stored
    /// afterwards, or `None` if it does not exist.
    pub fn update_post(
        &self,
        id: i64,
        title: Option<&str>,
        content: Option<&str>,
    ) -> Result<Option<PostRow>> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE posts SET title = COALESCE(?2, title), content = COALESCE(?3, content) WHERE id = ?1",
                (id, title, content),
            )?;
            query_post(conn, id)
        })
    }

    /// Comments on the post are removed by cascade.
    pub fn delete_post(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM posts WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }

    // -- Comments --

    pub fn create_comment(&self, post_id: i64, user_id: i64, content: &str) -> Result<CommentRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (content, user_id, post_id) VALUES (?1, ?2, ?3)",
                (content, user_id, post_id),
            )?;
            let id = conn.last_insert_rowid();
            let sql = format!("{COMMENT_COLUMNS} WHERE c.id = ?1");
            Ok(conn.query_row(&sql, [id], comment_from_row)?)
        })
    }

    pub fn get_comment(&self, id: i64) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| {
            let sql = format!("{COMMENT_COLUMNS} WHERE c.id = ?1");
            Ok(conn.query_row(&sql, [id], comment_from_row).optional()?)
        })
    }

    /// Comments on `post_id`, newest first.
    pub fn list_comments_for_post(&self, post_id: i64) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{COMMENT_COLUMNS} WHERE c.post_id = ?1 ORDER BY c.created_at DESC, c.id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([post_id], comment_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn delete_comment(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM comments WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }
}

fn query_post(conn: &Connection, id: i64) -> Result<Option<PostRow>> {
    let sql = format!("{POST_COLUMNS} WHERE p.id = ?1");
    Ok(conn.query_row(&sql, [id], post_from_row).optional()?)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        avatar: row.get(4)?,
    })
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        image: row.get(3)?,
        created_at: row.get(4)?,
        user_id: row.get(5)?,
        author: row.get(6)?,
    })
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        content: row.get(1)?,
        created_at: row.get(2)?,
        user_id: row.get(3)?,
        post_id: row.get(4)?,
        author: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::is_constraint_violation;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn count(db: &Database, table: &str) -> i64 {
        db.with_conn(|conn| {
            Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?)
        })
        .unwrap()
    }

    #[test]
    fn duplicate_username_and_email_are_rejected() {
        let db = db();
        db.create_user("ada", "ada@example.com", "hash").unwrap();

        let err = db.create_user("ada", "other@example.com", "hash").unwrap_err();
        assert!(is_constraint_violation(&err));

        let err = db.create_user("grace", "ada@example.com", "hash").unwrap_err();
        assert!(is_constraint_violation(&err));

        assert_eq!(count(&db, "users"), 1);
    }

    #[test]
    fn user_lookups() {
        let db = db();
        let id = db.create_user("ada", "ada@example.com", "hash").unwrap();

        assert_eq!(db.get_user_by_id(id).unwrap().unwrap().username, "ada");
        assert_eq!(db.get_user_by_email("ada@example.com").unwrap().unwrap().id, id);
        assert_eq!(db.get_user_by_username("ada").unwrap().unwrap().email, "ada@example.com");
        assert!(db.get_user_by_id(id + 1).unwrap().is_none());
    }

    #[test]
    fn avatar_and_password_updates() {
        let db = db();
        let id = db.create_user("ada", "ada@example.com", "hash").unwrap();

        assert!(db.update_avatar(id, Some("aGVsbG8=")).unwrap());
        assert!(db.update_password(id, "new-hash").unwrap());

        let user = db.get_user_by_id(id).unwrap().unwrap();
        assert_eq!(user.avatar.as_deref(), Some("aGVsbG8="));
        assert_eq!(user.password_hash, "new-hash");

        assert!(!db.update_avatar(id + 1, None).unwrap());
        assert!(!db.update_password(id + 1, "x").unwrap());
    }

    #[test]
    fn posts_list_newest_first() {
        let db = db();
        let uid = db.create_user("ada", "ada@example.com", "hash").unwrap();
        let first = db.create_post(uid, "one", "1", None).unwrap();
        let second = db.create_post(uid, "two", "2", None).unwrap();
        let third = db.create_post(uid, "three", "3", Some("aW1n")).unwrap();

        let ids: Vec<i64> = db.list_posts().unwrap().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);

        let posts = db.list_posts().unwrap();
        assert!(posts.windows(2).all(|w| w[0].created_at >= w[1].created_at));
        assert_eq!(posts[0].author, "ada");
        assert_eq!(posts[0].image.as_deref(), Some("aW1n"));
    }

    #[test]
    fn list_posts_by_user_filters_owner() {
        let db = db();
        let ada = db.create_user("ada", "ada@example.com", "hash").unwrap();
        let grace = db.create_user("grace", "grace@example.com", "hash").unwrap();
        db.create_post(ada, "a", "a", None).unwrap();
        db.create_post(grace, "g", "g", None).unwrap();

        let posts = db.list_posts_by_user(grace).unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].title, "g");
    }

    #[test]
    fn update_post_keeps_absent_fields() {
        let db = db();
        let uid = db.create_user("ada", "ada@example.com", "hash").unwrap();
        let post = db.create_post(uid, "title", "body", None).unwrap();

        let updated = db.update_post(post.id, Some("renamed"), None).unwrap().unwrap();
        assert_eq!(updated.title, "renamed");
        assert_eq!(updated.content, "body");
        assert_eq!(updated.created_at, post.created_at);

        assert!(db.update_post(post.id + 1, Some("x"), None).unwrap().is_none());
    }

    #[test]
    fn comments_list_newest_first() {
        let db = db();
        let uid = db.create_user("ada", "ada@example.com", "hash").unwrap();
        let post = db.create_post(uid, "t", "c", None).unwrap();
        let c1 = db.create_comment(post.id, uid, "first").unwrap();
        let c2 = db.create_comment(post.id, uid, "second").unwrap();

        let ids: Vec<i64> = db
            .list_comments_for_post(post.id)
            .unwrap()
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![c2.id, c1.id]);
        assert_eq!(db.get_comment(c1.id).unwrap().unwrap().author, "ada");
    }

    #[test]
    fn comment_on_missing_post_violates_foreign_key() {
        let db = db();
        let uid = db.create_user("ada", "ada@example.com", "hash").unwrap();
        let err = db.create_comment(999, uid, "orphan").unwrap_err();
        assert!(is_constraint_violation(&err));
    }

    #[test]
    fn deleting_post_removes_its_comments() {
        let db = db();
        let uid = db.create_user("ada", "ada@example.com", "hash").unwrap();
        let post = db.create_post(uid, "t", "c", None).unwrap();
        db.create_comment(post.id, uid, "hi").unwrap();

        assert!(db.delete_post(post.id).unwrap());
        assert!(!db.delete_post(post.id).unwrap());
        assert_eq!(count(&db, "comments"), 0);
    }

    #[test]
    fn deleting_user_cascades_everywhere() {
        let db = db();
        let ada = db.create_user("ada", "ada@example.com", "hash").unwrap();
        let grace = db.create_user("grace", "grace@example.com", "hash").unwrap();

        let ada_post = db.create_post(ada, "ada's", "post", None).unwrap();
        let grace_post = db.create_post(grace, "grace's", "post", None).unwrap();

        // grace comments on ada's post; ada comments on grace's post
        db.create_comment(ada_post.id, grace, "from grace").unwrap();
        db.create_comment(grace_post.id, ada, "from ada").unwrap();
        let kept = db.create_comment(grace_post.id, grace, "own").unwrap();

        assert!(db.delete_user(ada).unwrap());

        assert!(db.get_post(ada_post.id).unwrap().is_none());
        assert!(db.get_post(grace_post.id).unwrap().is_some());

        let remaining = db.list_comments_for_post(grace_post.id).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, kept.id);
        assert_eq!(count(&db, "comments"), 1);
    }
}
