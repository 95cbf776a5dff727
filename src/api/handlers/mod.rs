//! Route handlers and helpers shared between them.
//!
//! Pages answer with JSON view models. Actions take urlencoded forms and
//! answer with `303 See Other`, passing feedback through `error` or `toast`
//! query parameters.

pub mod activity;
pub mod auth;
pub mod bookings;
pub mod building;
pub mod health;
pub mod history;
pub mod occupants;
pub mod rent;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::error;
use url::form_urlencoded;
use uuid::Uuid;

/// Feedback carried back to a page by the redirect of an action.
#[derive(Deserialize, Debug, Default)]
pub struct FeedbackQuery {
    pub error: Option<String>,
    pub toast: Option<String>,
}

/// Redirect to `path` with `key=message` appended to its query string.
pub(crate) fn redirect_with(path: &str, key: &str, message: &str) -> Response {
    let separator = if path.contains('?') { '&' } else { '?' };
    let query: String = form_urlencoded::Serializer::new(String::new())
        .append_pair(key, message)
        .finish();
    Redirect::to(&format!("{path}{separator}{query}")).into_response()
}

/// Log a storage failure and turn it into a bare 500.
pub(crate) fn internal_error(what: &str, err: &anyhow::Error) -> Response {
    error!("{what}: {err:#}");
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

#[must_use]
pub fn floor_label(floor: i32) -> String {
    if floor == 0 {
        "Ground Floor".to_string()
    } else {
        format!("Floor {floor}")
    }
}

/// Parse a form id; malformed ids are handled like unknown ones.
pub(crate) fn parse_id(value: &str) -> Option<Uuid> {
    Uuid::parse_str(value.trim()).ok()
}

/// Outcome of reading an optional `YYYY-MM-DD` form field.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum DateField {
    Missing,
    Valid(NaiveDate),
    Invalid,
}

/// Read a date form field; only the first ten characters are considered so
/// full ISO timestamps are accepted as well.
pub(crate) fn parse_date_field(value: Option<&str>) -> DateField {
    let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) else {
        return DateField::Missing;
    };
    value
        .get(..10)
        .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
        .map_or(DateField::Invalid, DateField::Valid)
}

/// Browsers ask for it on every page; answer without a 404.
pub async fn favicon() -> StatusCode {
    StatusCode::NO_CONTENT
}
