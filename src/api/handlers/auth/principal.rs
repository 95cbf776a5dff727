//! Access guard.
//!
//! Flow Overview: read the session cookie, verify its signature, and hand the
//! resolved user id to the handler as an [`Identity`] argument. Anything else
//! (no cookie, malformed token, bad signature, bad payload) is a redirect to the
//! login page that remembers where the client was going.

use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::{request::Parts, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::{debug, error};
use url::form_urlencoded;
use uuid::Uuid;

use super::{session::session_user_id, state::AuthState};

/// Authenticated user resolved from the session cookie.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    user_id: String,
}

impl Identity {
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

/// Authenticated account id for handlers that read or write owned rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Owner(pub Uuid);

/// Resolve the session cookie into an identity, or build the login redirect.
///
/// # Errors
/// Returns the redirect response when the request is unauthenticated.
pub fn require_user(headers: &HeaderMap, uri: &Uri, auth_state: &AuthState) -> Result<Identity, Response> {
    session_user_id(headers, auth_state)
        .map(|user_id| Identity { user_id })
        .ok_or_else(|| login_redirect(auth_state.config().login_path(), uri))
}

/// Redirect to `login_path`, carrying the requested path and query as `from`.
pub fn login_redirect(login_path: &str, uri: &Uri) -> Response {
    let from = uri.path_and_query().map_or("/", |pq| pq.as_str());
    let from: String = form_urlencoded::byte_serialize(from.as_bytes()).collect();
    Redirect::to(&format!("{login_path}?from={from}")).into_response()
}

fn auth_state(parts: &Parts) -> Result<Arc<AuthState>, Response> {
    parts.extensions.get::<Arc<AuthState>>().cloned().ok_or_else(|| {
        error!("AuthState extension is not installed on the router");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })
}

// Nested routers strip their prefix from `parts.uri`; the original URI is what
// the client asked for.
fn requested_uri(parts: &Parts) -> Uri {
    parts
        .extensions
        .get::<OriginalUri>()
        .map_or_else(|| parts.uri.clone(), |original| original.0.clone())
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = auth_state(parts)?;
        require_user(&parts.headers, &requested_uri(parts), &auth_state)
    }
}

/// Account id of a valid session, or `None`.
///
/// Sessions whose identity is not an account id count as signed out, both for
/// the data routes and for the "already signed in" check of the auth pages.
pub(crate) fn session_account_id(headers: &HeaderMap, auth_state: &AuthState) -> Option<Uuid> {
    let user_id = session_user_id(headers, auth_state)?;
    Uuid::parse_str(&user_id)
        .map_err(|_| debug!("Session identity is not an account id"))
        .ok()
}

impl<S> FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = auth_state(parts)?;
        session_account_id(&parts.headers, &auth_state)
            .map(Self)
            .ok_or_else(|| login_redirect(auth_state.config().login_path(), &requested_uri(parts)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::LOCATION;

    fn location(response: &Response) -> &str {
        response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
    }

    #[test]
    fn login_redirect_preserves_path_and_query() {
        let uri: Uri = "/rent?month=2024-05".parse().unwrap_or_default();
        let response = login_redirect("/login", &uri);
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login?from=%2Frent%3Fmonth%3D2024-05");
    }

    #[test]
    fn login_redirect_for_root() {
        let uri: Uri = "/".parse().unwrap_or_default();
        let response = login_redirect("/login", &uri);
        assert_eq!(location(&response), "/login?from=%2F");
    }
}
