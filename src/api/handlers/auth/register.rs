//! Registration page and action.

use axum::{
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Redirect, Response},
    Form,
};
use serde::Deserialize;
use sqlx::PgPool;
use std::{fmt, sync::Arc};
use tokio::task;
use tracing::{error, info, instrument};

use super::{
    login::{AuthPage, FormErrorQuery},
    password::hash_password,
    principal::session_account_id,
    session,
    state::AuthState,
    storage::{insert_user, SignupOutcome},
    utils::{normalize_email, valid_email, valid_password},
};
use crate::api::handlers::redirect_with;

#[derive(Deserialize, Default)]
pub struct RegisterForm {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

impl fmt::Debug for RegisterForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterForm")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

#[utoipa::path(
    get,
    path = "/register",
    params(("error" = Option<String>, Query, description = "Error from a failed registration")),
    responses(
        (status = 200, description = "Registration page", body = AuthPage),
        (status = 303, description = "Already signed in, redirect to /main")
    ),
    tag = "auth"
)]
pub async fn register_page(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    Query(query): Query<FormErrorQuery>,
) -> Response {
    if session_account_id(&headers, &auth_state).is_some() {
        return Redirect::to("/main").into_response();
    }
    Json(AuthPage {
        error: query.error,
        from: None,
    })
    .into_response()
}

#[instrument(skip_all)]
pub async fn register(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Form(form): Form<RegisterForm>,
) -> Response {
    let email = normalize_email(&form.email);
    if !valid_email(&email) {
        return redirect_with("/register", "error", "Invalid email");
    }
    if !valid_password(&form.password) {
        return redirect_with(
            "/register",
            "error",
            "Password must be at least 6 characters",
        );
    }

    let cost = auth_state.config().bcrypt_cost();
    let password = form.password;
    let digest = match task::spawn_blocking(move || hash_password(&password, cost)).await {
        Ok(Ok(digest)) => digest,
        Ok(Err(err)) => {
            error!("{err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        Err(err) => {
            error!("Password hashing task failed: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let user_id = match insert_user(&pool, &email, form.name.trim(), &digest).await {
        Ok(SignupOutcome::Created(user_id)) => user_id,
        Ok(SignupOutcome::Conflict) => {
            return redirect_with("/register", "error", "Email already registered");
        }
        Err(err) => {
            error!("Failed to register user: {err:#}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut response = Redirect::to("/config").into_response();
    if let Err(err) = session::issue(&mut response, &auth_state, &user_id.to_string()) {
        error!("Failed to build session cookie: {err}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    info!(user_id = %user_id, "User registered");
    response
}
