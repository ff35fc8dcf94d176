//! Length limits on user-supplied fields.
//!
//! Usernames and emails end up in the frontend's session cookie, which
//! browsers cap at roughly 4 KB.

use crate::error::ApiError;

pub const MAX_USERNAME_CHARS: usize = 80;
pub const MAX_EMAIL_CHARS: usize = 120;
pub const MAX_TITLE_CHARS: usize = 200;

/// 400 when `value` is longer than `max` characters.
pub fn max_chars(field: &str, value: &str, max: usize) -> Result<(), ApiError> {
    if value.chars().count() > max {
        return Err(ApiError::bad_request(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}
