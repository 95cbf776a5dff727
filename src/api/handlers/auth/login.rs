//! Login page, login action and logout.

use axum::{
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Redirect, Response},
    Form,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::{fmt, sync::Arc};
use tokio::task;
use tracing::{error, info, instrument};
use url::form_urlencoded;
use utoipa::ToSchema;

use super::{
    password::verify_password,
    principal::session_account_id,
    session,
    state::AuthState,
    storage::lookup_credential,
    utils::{is_safe_return_path, normalize_email, safe_return_path},
};
use crate::api::handlers::redirect_with;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Deserialize, Debug)]
pub struct FormErrorQuery {
    pub error: Option<String>,
    pub from: Option<String>,
}

/// View model for the login and registration pages.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AuthPage {
    pub error: Option<String>,
    /// Where to go after signing in; sent back as the `from` form field.
    pub from: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct LoginForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    from: Option<String>,
}

impl fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginForm")
            .field("email", &self.email)
            .field("password", &"***")
            .field("from", &self.from)
            .finish()
    }
}

#[utoipa::path(
    get,
    path = "/login",
    params(
        ("error" = Option<String>, Query, description = "Error from a failed login"),
        ("from" = Option<String>, Query, description = "Page that required signing in")
    ),
    responses(
        (status = 200, description = "Login page", body = AuthPage),
        (status = 303, description = "Already signed in, redirect to /main")
    ),
    tag = "auth"
)]
pub async fn login_page(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    Query(query): Query<FormErrorQuery>,
) -> Response {
    if session_account_id(&headers, &auth_state).is_some() {
        return Redirect::to("/main").into_response();
    }
    Json(AuthPage {
        error: query.error,
        from: query.from.filter(|from| is_safe_return_path(from)),
    })
    .into_response()
}

/// Back to the login page with an error, keeping a safe `from`.
fn login_failed(from: Option<&str>) -> Response {
    let path = match from.filter(|from| is_safe_return_path(from)) {
        Some(from) => {
            let from: String = form_urlencoded::byte_serialize(from.as_bytes()).collect();
            format!("/login?from={from}")
        }
        None => "/login".to_string(),
    };
    redirect_with(&path, "error", INVALID_CREDENTIALS)
}

#[instrument(skip_all)]
pub async fn login(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Form(form): Form<LoginForm>,
) -> Response {
    let email = normalize_email(&form.email);

    let record = match lookup_credential(&pool, &email).await {
        Ok(Some(record)) => record,
        Ok(None) => return login_failed(form.from.as_deref()),
        Err(err) => {
            error!("Failed to lookup credential: {err:#}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let password = form.password;
    let digest = record.password_hash;
    let verified = match task::spawn_blocking(move || verify_password(&password, &digest)).await {
        Ok(verified) => verified,
        Err(err) => {
            error!("Password verification task failed: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    if !verified {
        return login_failed(form.from.as_deref());
    }

    let target = safe_return_path(form.from.as_deref());
    let mut response = Redirect::to(target).into_response();
    if let Err(err) = session::issue(&mut response, &auth_state, &record.user_id.to_string()) {
        error!("Failed to build session cookie: {err}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    info!(user_id = %record.user_id, "User signed in");
    response
}

#[utoipa::path(
    post,
    path = "/logout",
    responses((status = 303, description = "Session cleared, redirect to /login")),
    tag = "auth"
)]
pub async fn logout(auth_state: Extension<Arc<AuthState>>) -> Response {
    let mut response = Redirect::to("/login").into_response();
    // Always clear the cookie, even when the request carried none.
    if let Err(err) = session::clear(&mut response, auth_state.config()) {
        error!("Failed to build session clearing cookie: {err}");
    }
    response
}
