//! Small helpers for auth input handling.

use once_cell::sync::Lazy;
use regex::Regex;

const DEFAULT_RETURN_PATH: &str = "/main";
pub(super) const MIN_PASSWORD_LEN: usize = 6;

static EMAIL_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

/// Normalize an email for lookup/uniqueness checks.
pub(super) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(super) fn valid_email(email_normalized: &str) -> bool {
    EMAIL_RE
        .as_ref()
        .is_some_and(|regex| regex.is_match(email_normalized))
}

pub(super) fn valid_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LEN
}

/// Only local absolute paths are honoured; anything that could leave the site
/// (`//host`, `/\host`, `https://...`) is rejected.
pub(super) fn is_safe_return_path(path: &str) -> bool {
    path.starts_with('/')
        && !path.starts_with("//")
        && !path.contains('\\')
        && !path.chars().any(char::is_control)
}

/// Where to send the client after login; unsafe targets fall back to the
/// dashboard.
pub(super) fn safe_return_path(from: Option<&str>) -> &str {
    from.map(str::trim)
        .filter(|path| is_safe_return_path(path))
        .unwrap_or(DEFAULT_RETURN_PATH)
}

pub(super) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@example.com"));
        assert!(valid_email("name.surname@example.co"));
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-at.example.com"));
        assert!(!valid_email("missing-domain@"));
        assert!(!valid_email(""));
    }

    #[test]
    fn password_needs_six_characters() {
        assert!(!valid_password("12345"));
        assert!(valid_password("123456"));
        assert!(valid_password("ñññññó"));
    }

    #[test]
    fn safe_return_path_keeps_local_paths() {
        assert_eq!(safe_return_path(Some("/rooms")), "/rooms");
        assert_eq!(safe_return_path(Some("/rent?month=2024-05")), "/rent?month=2024-05");
    }

    #[test]
    fn safe_return_path_rejects_external_targets() {
        assert_eq!(safe_return_path(None), "/main");
        assert_eq!(safe_return_path(Some("")), "/main");
        assert_eq!(safe_return_path(Some("//evil.example")), "/main");
        assert_eq!(safe_return_path(Some("/\\evil.example")), "/main");
        assert_eq!(safe_return_path(Some("https://evil.example")), "/main");
        assert_eq!(safe_return_path(Some("/rooms\r\nSet-Cookie: x")), "/main");
    }
}
