use crate::api::handlers::{
    auth::{self, AuthConfig, AuthState},
    bookings, building, favicon, occupants, rent,
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    routing::{get, post},
    Extension, Router,
};
use secrecy::SecretString;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, warn, Instrument, Span};
use ulid::Ulid;

pub mod handlers;
mod openapi;

pub use openapi::openapi;

const SCHEMA: &str = include_str!("../../sql/schema.sql");

/// Build the application router: documented views plus the form actions.
///
/// The pool and the auth state travel as request extensions.
#[must_use]
pub fn router(pool: PgPool, auth_state: Arc<AuthState>) -> Router {
    let (router, _openapi) = openapi::api_router().split_for_parts();
    router
        .route("/", get(building::main_page))
        .route("/favicon.ico", get(favicon))
        .route("/login", post(auth::login::login))
        .route("/register", post(auth::register::register))
        .route("/config/save", post(building::config_save))
        .route("/occupants/add", post(occupants::add))
        .route("/occupants/remove", post(occupants::remove))
        .route("/rent/toggle", get(rent::rent_toggle))
        .route("/advance-booking/add", post(bookings::add))
        .route("/advance-booking/remove", post(bookings::remove))
        .layer(Extension(auth_state))
        .layer(Extension(pool))
}

/// Start the server
/// # Errors
/// Return error if failed to connect to the database or to start the server
pub async fn new(port: u16, dsn: &str, secret: SecretString, auth_config: AuthConfig) -> Result<()> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(dsn)
        .await
        .context("Failed to connect to database")?;

    apply_schema(&pool).await;

    let auth_state = Arc::new(AuthState::new(auth_config, secret));

    let app = router(pool, auth_state).layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span)),
    );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

/// Create tables and indexes. Every statement is idempotent; a failure (for
/// example a role without DDL rights on an already migrated database) is only
/// logged.
async fn apply_schema(pool: &PgPool) {
    let span = info_span!("db.query", db.system = "postgresql", db.operation = "DDL");
    if let Err(err) = sqlx::raw_sql(SCHEMA).execute(pool).instrument(span).await {
        warn!("Failed to apply schema: {err}");
    }
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
