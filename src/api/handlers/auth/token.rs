//! Signed session tokens.
//!
//! Format: `base64url_nopad(user_id) "." hex(hmac_sha256(secret, payload))`.
//! The user id is only signed, not hidden.

use base64::{
    alphabet,
    engine::{general_purpose::URL_SAFE_NO_PAD, DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::fmt;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

// Tokens are issued without padding; padded payloads are accepted too.
const PAYLOAD_DECODER: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("missing payload/signature separator")]
    MissingSeparator,
    #[error("empty payload or signature")]
    EmptyPart,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid base64url payload")]
    Base64,
    #[error("payload is not valid UTF-8")]
    Utf8,
}

/// HMAC key used to sign and verify session tokens.
pub struct SessionKeys {
    secret: SecretString,
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeys").field("secret", &"***").finish()
    }
}

impl SessionKeys {
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Mint a token for `user_id`.
    #[must_use]
    pub fn encode(&self, user_id: &str) -> String {
        let payload = URL_SAFE_NO_PAD.encode(user_id.as_bytes());
        let signature = self.sign(&payload);
        format!("{payload}.{signature}")
    }

    /// Recover the user id from a token.
    ///
    /// # Errors
    /// Returns a [`TokenError`] when the token is malformed, the signature does
    /// not match, or the payload is not base64url-encoded UTF-8.
    pub fn decode(&self, token: &str) -> Result<String, TokenError> {
        let (payload, signature) = token.rsplit_once('.').ok_or(TokenError::MissingSeparator)?;
        if payload.is_empty() || signature.is_empty() {
            return Err(TokenError::EmptyPart);
        }

        // Only the lower-case hex form issued by `encode` is an exact match.
        if !signature.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(TokenError::InvalidSignature);
        }
        let signature = hex::decode(signature).map_err(|_| TokenError::InvalidSignature)?;
        let mac = self.mac(payload).ok_or(TokenError::InvalidSignature)?;
        // Constant-time comparison
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let bytes = PAYLOAD_DECODER
            .decode(payload)
            .map_err(|_| TokenError::Base64)?;
        String::from_utf8(bytes).map_err(|_| TokenError::Utf8)
    }

    fn mac(&self, payload: &str) -> Option<HmacSha256> {
        // HMAC takes keys of any length, so this only fails in theory.
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes()).ok()?;
        mac.update(payload.as_bytes());
        Some(mac)
    }

    // An empty signature never verifies.
    fn sign(&self, payload: &str) -> String {
        self.mac(payload)
            .map(|mac| hex::encode(mac.finalize().into_bytes()))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> SessionKeys {
        SessionKeys::new(SecretString::from("test-secret-0123456789abcdef0123"))
    }

    #[test]
    fn decode_reverses_encode() {
        let keys = keys();
        for user_id in [
            "507f1f77bcf86cd799439011",
            "a",
            "ab",
            "abc",
            "0b6f7a3c-59f5-4c8e-9d3e-7d8f6a1b2c3d",
            "ünïcødé ✓",
            "with.dots.inside",
        ] {
            assert_eq!(keys.decode(&keys.encode(user_id)).as_deref(), Ok(user_id));
        }
    }

    #[test]
    fn token_shape() {
        let token = keys().encode("507f1f77bcf86cd799439011");
        let (payload, signature) = token.rsplit_once('.').unwrap_or_default();
        assert!(!payload.contains('='));
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn any_flipped_signature_character_is_rejected() {
        let keys = keys();
        let token = keys.encode("507f1f77bcf86cd799439011");
        let split = token.rfind('.').unwrap_or_default() + 1;
        for index in split..token.len() {
            let mut bytes = token.clone().into_bytes();
            bytes[index] = if bytes[index] == b'0' { b'1' } else { b'0' };
            let tampered = String::from_utf8(bytes).unwrap_or_default();
            assert_eq!(
                keys.decode(&tampered),
                Err(TokenError::InvalidSignature),
                "flipped index {index}"
            );
        }
    }

    #[test]
    fn uppercase_signature_is_not_an_exact_match() {
        let keys = keys();
        let token = keys.encode("user");
        assert_eq!(
            keys.decode(&token.to_uppercase()),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn missing_separator_is_rejected() {
        let keys = keys();
        let token = keys.encode("507f1f77bcf86cd799439011").replace('.', "");
        assert_eq!(keys.decode(&token), Err(TokenError::MissingSeparator));
        assert_eq!(keys.decode(""), Err(TokenError::MissingSeparator));
    }

    #[test]
    fn empty_halves_are_rejected() {
        let keys = keys();
        assert_eq!(keys.decode("."), Err(TokenError::EmptyPart));
        assert_eq!(keys.decode("cGF5bG9hZA."), Err(TokenError::EmptyPart));
        let signature = keys.sign("");
        assert_eq!(keys.decode(&format!(".{signature}")), Err(TokenError::EmptyPart));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let keys = keys();
        let token = keys.encode("alice");
        let (_, signature) = token.rsplit_once('.').unwrap_or_default();
        let forged = format!("{}.{signature}", URL_SAFE_NO_PAD.encode("mallory"));
        assert_eq!(keys.decode(&forged), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn token_from_another_secret_is_rejected() {
        let other = SessionKeys::new(SecretString::from("another-secret"));
        let token = other.encode("alice");
        assert_eq!(keys().decode(&token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn signed_garbage_payload_is_rejected() {
        let keys = keys();
        // Correctly signed, but not base64url.
        let payload = "not*base64";
        let token = format!("{payload}.{}", keys.sign(payload));
        assert_eq!(keys.decode(&token), Err(TokenError::Base64));

        // Correctly signed base64url, but not UTF-8.
        let payload = URL_SAFE_NO_PAD.encode([0xff, 0xfe, 0xfd]);
        let token = format!("{payload}.{}", keys.sign(&payload));
        assert_eq!(keys.decode(&token), Err(TokenError::Utf8));
    }

    #[test]
    fn padded_payload_is_accepted() {
        let keys = keys();
        let payload = base64::engine::general_purpose::URL_SAFE.encode("ab");
        assert!(payload.ends_with('='));
        let token = format!("{payload}.{}", keys.sign(&payload));
        assert_eq!(keys.decode(&token).as_deref(), Ok("ab"));
    }

    #[test]
    fn debug_does_not_leak_secret() {
        assert!(!format!("{:?}", keys()).contains("test-secret"));
    }
}
