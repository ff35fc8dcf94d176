//! HTML rendering. Every dynamic value goes through [`escape`].

use std::fmt::Write;

use chrono::{DateTime, Utc};

use quill_types::api::{CommentResponse, PostDetailResponse, PostResponse};

use crate::session::{Flash, SessionUser};
use crate::upload::image_mime;

const STYLE: &str = "
body { font-family: system-ui, sans-serif; max-width: 48rem; margin: 0 auto; padding: 0 1rem; color: #222; }
nav { display: flex; gap: 1rem; padding: 1rem 0; border-bottom: 1px solid #ddd; }
nav a { text-decoration: none; color: #555; }
nav a.active { color: #000; font-weight: bold; }
nav .spacer { flex: 1; }
.flash { padding: .5rem 1rem; margin: 1rem 0; border-radius: 4px; }
.flash.success { background: #e6f4ea; }
.flash.info { background: #e8f0fe; }
.flash.warning { background: #fef7e0; }
.flash.danger { background: #fce8e6; }
article { border-bottom: 1px solid #eee; padding: 1rem 0; }
.meta { color: #777; font-size: .9rem; }
img.post, img.avatar { max-width: 100%; border-radius: 4px; }
img.avatar { width: 8rem; height: 8rem; object-fit: cover; }
form.inline { display: inline; }
label { display: block; margin-top: .75rem; }
input[type=text], input[type=email], input[type=password], textarea { width: 100%; padding: .4rem; }
textarea { min-height: 8rem; }
";

/// Escape text for use in element content and double-quoted attributes.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Wrap a page body in the shared chrome: navigation and flashed notices.
pub fn layout(
    title: &str,
    active: &str,
    user: Option<&SessionUser>,
    flashes: &[Flash],
    body: &str,
) -> String {
    let link = |href: &str, key: &str, label: &str| {
        let class = if key == active { " class=\"active\"" } else { "" };
        format!("<a href=\"{href}\"{class}>{label}</a>")
    };

    let mut nav = String::new();
    nav.push_str(&link("/", "home", "Home"));
    nav.push_str(&link("/about", "about", "About"));
    nav.push_str(&link("/contact", "contact", "Contact"));
    nav.push_str("<span class=\"spacer\"></span>");
    match user {
        Some(user) => {
            nav.push_str(&link("/create_post", "create", "New post"));
            nav.push_str(&link("/profile", "profile", &escape(&user.username)));
            nav.push_str(&link("/logout", "logout", "Log out"));
        }
        None => {
            nav.push_str(&link("/login", "login", "Log in"));
            nav.push_str(&link("/register", "register", "Register"));
        }
    }

    let mut notices = String::new();
    for f in flashes {
        let _ = write!(
            notices,
            "<div class=\"flash {}\">{}</div>",
            f.level.as_str(),
            escape(&f.message)
        );
    }

    format!(
        "<!doctype html>
<html lang=\"en\">
<head>
<meta charset=\"utf-8\">
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">
<title>{title} · Quill</title>
<style>{STYLE}</style>
</head>
<body>
<nav>{nav}</nav>
{notices}
<main>
{body}
</main>
</body>
</html>",
        title = escape(title),
    )
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

fn image_tag(encoded: &str, class: &str, alt: &str) -> String {
    format!(
        "<img class=\"{class}\" alt=\"{}\" src=\"data:{};base64,{}\">",
        escape(alt),
        image_mime(encoded),
        escape(encoded)
    )
}

/// Renders newlines in user text as line breaks.
fn paragraphs(text: &str) -> String {
    escape(text).replace('\n', "<br>")
}

fn post_summary(post: &PostResponse) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "<article>
<h2><a href=\"/post/{id}\">{title}</a></h2>
<p class=\"meta\">by {author} on {at}</p>",
        id = post.id,
        title = escape(&post.title),
        author = escape(&post.author),
        at = timestamp(&post.created_at),
    );
    if let Some(image) = &post.image {
        out.push_str(&image_tag(image, "post", &post.title));
    }
    let _ = write!(out, "<p>{}</p></article>", paragraphs(&post.content));
    out
}

pub fn index(posts: &[PostResponse]) -> String {
    if posts.is_empty() {
        return "<h1>Latest posts</h1><p>No posts yet.</p>".into();
    }

    let mut out = String::from("<h1>Latest posts</h1>");
    for post in posts {
        out.push_str(&post_summary(post));
    }
    out
}

pub fn about() -> String {
    "<h1>About</h1>
<p>Quill is a small blog. Register an account to write posts and join the discussion in the comments.</p>"
        .into()
}

pub fn contact() -> String {
    "<h1>Contact</h1>
<p>Questions or problems? Leave a comment on any post and an author will get back to you.</p>"
        .into()
}

fn comment_item(comment: &CommentResponse, post_owner: i64, viewer: Option<&SessionUser>) -> String {
    let can_delete =
        viewer.is_some_and(|v| v.id == comment.user_id || v.id == post_owner);

    let mut out = format!(
        "<li><p class=\"meta\">{author} on {at}</p><p>{content}</p>",
        author = escape(&comment.author),
        at = timestamp(&comment.created_at),
        content = paragraphs(&comment.content),
    );
    if can_delete {
        let _ = write!(
            out,
            "<form class=\"inline\" method=\"post\" action=\"/delete_comment/{}\">
<input type=\"hidden\" name=\"post_id\" value=\"{}\">
<button type=\"submit\">Delete comment</button>
</form>",
            comment.id, comment.post_id
        );
    }
    out.push_str("</li>");
    out
}

pub fn post_detail(detail: &PostDetailResponse, viewer: Option<&SessionUser>) -> String {
    let post = &detail.post;
    let mut out = format!(
        "<article>
<h1>{title}</h1>
<p class=\"meta\">by {author} on {at}</p>",
        title = escape(&post.title),
        author = escape(&post.author),
        at = timestamp(&post.created_at),
    );
    if let Some(image) = &post.image {
        out.push_str(&image_tag(image, "post", &post.title));
    }
    let _ = write!(out, "<p>{}</p>", paragraphs(&post.content));

    if viewer.is_some_and(|v| v.id == post.user_id) {
        let _ = write!(
            out,
            "<p><a href=\"/edit_post/{id}\">Edit</a>
<form class=\"inline\" method=\"post\" action=\"/delete_post/{id}\">
<button type=\"submit\">Delete post</button>
</form></p>",
            id = post.id
        );
    }
    out.push_str("</article>");

    let _ = write!(out, "<h2>Comments ({})</h2>", detail.comments.len());
    if viewer.is_some() {
        let _ = write!(
            out,
            "<form method=\"post\" action=\"/post/{}/comment\">
<label>Your comment<textarea name=\"message\" required></textarea></label>
<button type=\"submit\">Comment</button>
</form>",
            post.id
        );
    } else {
        out.push_str("<p><a href=\"/login\">Log in</a> to comment.</p>");
    }

    out.push_str("<ul>");
    for comment in &detail.comments {
        out.push_str(&comment_item(comment, post.user_id, viewer));
    }
    out.push_str("</ul>");
    out
}

pub fn register_form() -> String {
    "<h1>Register</h1>
<form method=\"post\" action=\"/register\">
<label>Username<input type=\"text\" name=\"username\" required></label>
<label>Email<input type=\"email\" name=\"email\" required></label>
<label>Password<input type=\"password\" name=\"password\" required></label>
<button type=\"submit\">Register</button>
</form>"
        .into()
}

pub fn login_form() -> String {
    "<h1>Log in</h1>
<form method=\"post\" action=\"/login\">
<label>Email<input type=\"email\" name=\"email\" required></label>
<label>Password<input type=\"password\" name=\"password\" required></label>
<button type=\"submit\">Log in</button>
</form>"
        .into()
}

pub fn create_post_form() -> String {
    "<h1>New post</h1>
<form method=\"post\" action=\"/create_post\" enctype=\"multipart/form-data\">
<label>Title<input type=\"text\" name=\"title\" required></label>
<label>Content<textarea name=\"content\" required></textarea></label>
<label>Image<input type=\"file\" name=\"image\" accept=\"image/*\"></label>
<button type=\"submit\">Publish</button>
</form>"
        .into()
}

pub fn edit_post_form(post: &PostResponse) -> String {
    format!(
        "<h1>Edit post</h1>
<form method=\"post\" action=\"/edit_post/{id}\">
<label>Title<input type=\"text\" name=\"title\" value=\"{title}\" required></label>
<label>Content<textarea name=\"content\" required>{content}</textarea></label>
<button type=\"submit\">Save</button>
</form>",
        id = post.id,
        title = escape(&post.title),
        content = escape(&post.content),
    )
}

/// What the profile page shows. Built from the API profile, or from the
/// session's cached user when the API is unavailable.
pub struct ProfileView<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub avatar: Option<&'a str>,
    pub posts: &'a [PostResponse],
}

pub fn profile(view: &ProfileView<'_>) -> String {
    let mut out = format!(
        "<h1>{username}</h1><p class=\"meta\">{email}</p>",
        username = escape(view.username),
        email = escape(view.email),
    );

    if let Some(avatar) = view.avatar {
        out.push_str(&image_tag(avatar, "avatar", "avatar"));
    }

    out.push_str(
        "<h2>Avatar</h2>
<form method=\"post\" action=\"/update_avatar\" enctype=\"multipart/form-data\">
<input type=\"file\" name=\"avatar\" accept=\"image/*\" required>
<button type=\"submit\">Upload</button>
</form>
<h2>Change password</h2>
<form method=\"post\" action=\"/change_password\">
<label>Current password<input type=\"password\" name=\"current_password\" required></label>
<label>New password<input type=\"password\" name=\"new_password\" required></label>
<label>Confirm new password<input type=\"password\" name=\"confirm_password\" required></label>
<button type=\"submit\">Change password</button>
</form>",
    );

    let _ = write!(out, "<h2>Your posts ({})</h2>", view.posts.len());
    for post in view.posts {
        out.push_str(&post_summary(post));
    }

    out.push_str(
        "<h2>Danger zone</h2>
<form method=\"post\" action=\"/delete_account\">
<button type=\"submit\">Delete my account</button>
</form>",
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Level;

    fn post(title: &str, image: Option<&str>) -> PostResponse {
        PostResponse {
            id: 1,
            title: title.into(),
            content: "line one\nline two".into(),
            image: image.map(Into::into),
            created_at: DateTime::default(),
            author: "ada".into(),
            user_id: 1,
        }
    }

    fn ada() -> SessionUser {
        SessionUser {
            id: 1,
            username: "ada".into(),
            email: "ada@example.com".into(),
        }
    }

    #[test]
    fn escape_neutralises_markup() {
        assert_eq!(
            escape(r#"<script>alert("x&y")</script>"#),
            "&lt;script&gt;alert(&quot;x&amp;y&quot;)&lt;/script&gt;"
        );
    }

    #[test]
    fn layout_shows_flashes_and_user_nav() {
        let flashes = vec![Flash {
            level: Level::Success,
            message: "Logged in <now>".into(),
        }];
        let html = layout("Home", "home", Some(&ada()), &flashes, "<p>hi</p>");
        assert!(html.contains("<div class=\"flash success\">Logged in &lt;now&gt;</div>"));
        assert!(html.contains("href=\"/logout\""));
        assert!(!html.contains("href=\"/register\""));
    }

    #[test]
    fn anonymous_layout_offers_login() {
        let html = layout("Home", "home", None, &[], "");
        assert!(html.contains("href=\"/login\""));
        assert!(!html.contains("href=\"/profile\""));
    }

    #[test]
    fn post_titles_are_escaped() {
        let html = index(&[post("<b>bold</b>", None)]);
        assert!(html.contains("&lt;b&gt;bold&lt;/b&gt;"));
        assert!(html.contains("line one<br>line two"));
    }

    #[test]
    fn images_render_as_data_uris() {
        let html = index(&[post("pic", Some("iVBORw0KGgoAAAA"))]);
        assert!(html.contains("src=\"data:image/png;base64,iVBORw0KGgoAAAA\""));
    }

    #[test]
    fn owner_controls_only_for_owner() {
        let detail = PostDetailResponse {
            post: post("t", None),
            comments: vec![],
        };
        assert!(post_detail(&detail, Some(&ada())).contains("/delete_post/1"));

        let grace = SessionUser {
            id: 2,
            username: "grace".into(),
            email: "grace@example.com".into(),
        };
        let html = post_detail(&detail, Some(&grace));
        assert!(!html.contains("/delete_post/1"));
        assert!(html.contains("/post/1/comment"));

        assert!(post_detail(&detail, None).contains("to comment"));
    }

    #[test]
    fn post_owner_can_delete_any_comment() {
        let comment = CommentResponse {
            id: 9,
            content: "nice".into(),
            created_at: DateTime::default(),
            author: "grace".into(),
            user_id: 2,
            post_id: 1,
        };
        assert!(comment_item(&comment, 1, Some(&ada())).contains("/delete_comment/9"));
        assert!(!comment_item(&comment, 1, None).contains("/delete_comment/9"));
    }
}
