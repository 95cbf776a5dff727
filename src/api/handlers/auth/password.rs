//! Password digests (bcrypt).
//!
//! Digests are self-describing (`$2b$<cost>$<salt><hash>`), so verification
//! needs nothing but the stored string. Both functions are CPU-bound; handlers
//! call them from `spawn_blocking`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

/// Hash a password with a fresh random salt.
///
/// # Errors
/// Returns an error only if the cost is out of range or the system RNG fails.
pub fn hash_password(password: &str, cost: u32) -> Result<String, PasswordError> {
    Ok(bcrypt::hash(password, cost)?)
}

/// Check a password against a stored digest.
///
/// A malformed digest is a failed check, not an error, so a corrupted record
/// denies the login instead of failing the request.
#[must_use]
pub fn verify_password(password: &str, digest: &str) -> bool {
    bcrypt::verify(password, digest).unwrap_or(false)
}
