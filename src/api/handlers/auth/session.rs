//! Session cookie issuing, clearing and extraction.

use axum::{
    http::{
        header::{InvalidHeaderValue, COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue,
    },
    response::Response,
};
use tracing::debug;

use super::state::{AuthConfig, AuthState};

/// Build the `Set-Cookie` value carrying a freshly signed token for `user_id`.
///
/// `Max-Age` is absolute: the cookie expires `ttl` seconds after issuance no
/// matter how active the session is.
///
/// # Errors
///
/// Fails if the configured cookie name cannot be carried in a header value.
pub fn session_cookie(auth_state: &AuthState, user_id: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    let config = auth_state.config();
    let token = auth_state.keys().encode(user_id);
    let name = config.session_cookie_name();
    let ttl_seconds = config.session_ttl_seconds();
    let mut cookie = format!("{name}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Build the `Set-Cookie` value that makes the browser drop the session cookie.
///
/// # Errors
///
/// Fails if the configured cookie name cannot be carried in a header value.
pub fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let name = config.session_cookie_name();
    let mut cookie = format!("{name}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Attach a new session cookie to `response`.
///
/// # Errors
/// Fails only if the configured cookie name cannot be used in a header.
pub fn issue(response: &mut Response, auth_state: &AuthState, user_id: &str) -> Result<(), InvalidHeaderValue> {
    let cookie = session_cookie(auth_state, user_id)?;
    response.headers_mut().append(SET_COOKIE, cookie);
    Ok(())
}

/// Attach a deletion instruction for the session cookie to `response`.
///
/// # Errors
/// Fails only if the configured cookie name cannot be used in a header.
pub fn clear(response: &mut Response, config: &AuthConfig) -> Result<(), InvalidHeaderValue> {
    let cookie = clear_session_cookie(config)?;
    response.headers_mut().append(SET_COOKIE, cookie);
    Ok(())
}

/// Find the session cookie value in the request `Cookie` header(s).
pub(crate) fn extract_session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            (key.trim() == cookie_name).then(|| val.trim().to_string())
        })
        .find(|val| !val.is_empty())
}

/// Resolve the session cookie into a user id, if it is present and valid.
///
/// Every failure collapses to `None`; the reason is only logged.
pub(crate) fn session_user_id(headers: &HeaderMap, auth_state: &AuthState) -> Option<String> {
    let token = extract_session_token(headers, auth_state.config().session_cookie_name())?;
    match auth_state.keys().decode(&token) {
        Ok(user_id) => Some(user_id),
        Err(err) => {
            debug!("Rejected session cookie: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::HeaderValue};
    use secrecy::SecretString;

    fn state(secure: bool) -> AuthState {
        AuthState::new(
            AuthConfig::new()
                .with_session_ttl_seconds(3600)
                .with_session_cookie_secure(secure),
            SecretString::from("cookie-test-secret"),
        )
    }

    fn header_str(value: &HeaderValue) -> &str {
        value.to_str().unwrap_or_default()
    }

    #[test]
    fn session_cookie_has_expected_attributes() {
        let state = state(true);
        let cookie = session_cookie(&state, "alice").ok();
        let cookie = cookie.as_ref().map(header_str).unwrap_or_default();
        let token = state.keys().encode("alice");
        assert!(cookie.starts_with(&format!("hostelry_session={token};")));
        assert!(cookie.contains("; Path=/"));
        assert!(cookie.contains("; HttpOnly"));
        assert!(cookie.contains("; SameSite=Lax"));
        assert!(cookie.contains("; Max-Age=3600"));
        assert!(cookie.ends_with("; Secure"));
    }

    #[test]
    fn insecure_cookie_omits_secure() {
        let cookie = session_cookie(&state(false), "alice").ok();
        let cookie = cookie.as_ref().map(header_str).unwrap_or_default();
        assert!(!cookie.contains("Secure"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let state = state(true);
        let cookie = clear_session_cookie(state.config()).ok();
        let cookie = cookie.as_ref().map(header_str).unwrap_or_default();
        assert!(cookie.starts_with("hostelry_session=;"));
        assert!(cookie.contains("; Path=/"));
        assert!(cookie.contains("; Max-Age=0"));
    }

    #[test]
    fn issue_and_clear_append_set_cookie() {
        let state = state(true);
        let mut response = Response::new(Body::empty());
        assert!(issue(&mut response, &state, "alice").is_ok());
        assert!(clear(&mut response, state.config()).is_ok());
        assert_eq!(response.headers().get_all(SET_COOKIE).iter().count(), 2);
    }

    #[test]
    fn extract_finds_named_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; hostelry_session=abc.def ; lang=en"),
        );
        assert_eq!(
            extract_session_token(&headers, "hostelry_session").as_deref(),
            Some("abc.def")
        );
        assert_eq!(extract_session_token(&headers, "missing"), None);
    }

    #[test]
    fn extract_ignores_empty_value_and_prefix_names() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("hostelry_session=; xhostelry_session=nope"),
        );
        assert_eq!(extract_session_token(&headers, "hostelry_session"), None);
    }

    #[test]
    fn session_user_id_requires_valid_signature() {
        let state = state(true);
        let token = state.keys().encode("alice");
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("hostelry_session={token}")).unwrap_or(HeaderValue::from_static("")),
        );
        assert_eq!(session_user_id(&headers, &state).as_deref(), Some("alice"));

        headers.insert(COOKIE, HeaderValue::from_static("hostelry_session=YWxpY2U.deadbeef"));
        assert_eq!(session_user_id(&headers, &state), None);
    }
}
