//! # Hostelry
//!
//! `hostelry` manages paying-guest houses and hostels: each account owns a
//! building layout (floors and rooms), its occupants, the monthly rent status of
//! every occupant, advance bookings and an activity log of what changed.
//!
//! ## Sessions
//!
//! Sessions are stateless. The cookie value is `base64url(user_id).hex(hmac)`
//! where the HMAC-SHA256 key is the server secret supplied at startup. The token
//! is signed, not encrypted: the user id is readable by whoever holds the cookie.
//! Rotating the secret logs every user out.
//!
//! ## Tenancy
//!
//! Every row is owned by a user id and every query filters on it. Handlers only
//! learn the user id through the access guard (`Identity`), never from input.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }
}
