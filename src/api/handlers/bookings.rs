//! Advance bookings: people expected to move in later.

use anyhow::{Context, Result};
use axum::{
    extract::{Extension, Query},
    response::{IntoResponse, Json, Response},
    Form,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{PgPool, Row};
use tracing::{info, instrument, Instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    activity::{self, ActivityKind},
    auth::Owner,
    internal_error, parse_date_field, parse_id, redirect_with, DateField, FeedbackQuery,
};

/// Shown in place of empty notes.
pub const NO_NOTES: &str = "—";

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BookingView {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub expected_join_date: NaiveDate,
    pub notes: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct BookingsPage {
    pub bookings: Vec<BookingView>,
    pub error: Option<String>,
    pub toast: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct AddBookingForm {
    #[serde(default)]
    name: String,
    #[serde(default)]
    phone: String,
    expected_join_date: Option<String>,
    notes: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct RemoveBookingForm {
    #[serde(default)]
    id: String,
}

struct BookingRecord {
    name: String,
    phone: String,
}

fn display_notes(notes: Option<String>) -> String {
    notes
        .filter(|notes| !notes.trim().is_empty())
        .unwrap_or_else(|| NO_NOTES.to_string())
}

fn stored_notes(notes: Option<&str>) -> Option<&str> {
    notes.map(str::trim).filter(|notes| !notes.is_empty())
}

#[utoipa::path(
    get,
    path = "/advance-booking",
    params(
        ("error" = Option<String>, Query, description = "Error from a rejected action"),
        ("toast" = Option<String>, Query, description = "Result of the last action")
    ),
    responses((status = 200, description = "Bookings by expected join date", body = BookingsPage)),
    tag = "bookings"
)]
pub async fn bookings_page(
    Owner(owner): Owner,
    pool: Extension<PgPool>,
    Query(query): Query<FeedbackQuery>,
) -> Response {
    match list_bookings(&pool, owner).await {
        Ok(bookings) => Json(BookingsPage {
            bookings,
            error: query.error,
            toast: query.toast,
        })
        .into_response(),
        Err(err) => internal_error("Failed to list bookings", &err),
    }
}

#[instrument(skip_all)]
pub async fn add(
    Owner(owner): Owner,
    pool: Extension<PgPool>,
    Form(form): Form<AddBookingForm>,
) -> Response {
    let expected_join_date = match parse_date_field(form.expected_join_date.as_deref()) {
        DateField::Valid(date) => date,
        DateField::Missing => Utc::now().date_naive(),
        DateField::Invalid => return redirect_with("/advance-booking", "error", "Invalid date"),
    };
    let name = form.name.trim();
    let phone = form.phone.trim();
    let notes = stored_notes(form.notes.as_deref());

    let query = r"
        INSERT INTO advance_bookings
            (user_id, name, phone, expected_join_date, notes)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let booking_id: Uuid = match sqlx::query(query)
        .bind(owner)
        .bind(name)
        .bind(phone)
        .bind(expected_join_date)
        .bind(notes)
        .fetch_one(&*pool)
        .instrument(span)
        .await
        .context("failed to insert booking")
    {
        Ok(row) => row.get("id"),
        Err(err) => return internal_error("Failed to add booking", &err),
    };

    activity::record(
        &pool,
        owner,
        ActivityKind::AdvanceBookingAdded,
        name,
        &format!("Advance booking added: {name} ({phone})"),
        json!({ "booking_id": booking_id }),
    )
    .await;

    info!(%booking_id, "Advance booking added");
    redirect_with("/advance-booking", "toast", "Booking added")
}

#[instrument(skip_all)]
pub async fn remove(
    Owner(owner): Owner,
    pool: Extension<PgPool>,
    Form(form): Form<RemoveBookingForm>,
) -> Response {
    let Some(booking_id) = parse_id(&form.id) else {
        return redirect_with("/advance-booking", "toast", "Booking not found");
    };

    let booking = match delete_booking(&pool, owner, booking_id).await {
        Ok(Some(booking)) => booking,
        Ok(None) => return redirect_with("/advance-booking", "toast", "Booking not found"),
        Err(err) => return internal_error("Failed to remove booking", &err),
    };

    activity::record(
        &pool,
        owner,
        ActivityKind::AdvanceBookingRemoved,
        &booking.name,
        &format!("Advance booking removed: {} ({})", booking.name, booking.phone),
        json!({ "booking_id": booking_id }),
    )
    .await;

    info!(%booking_id, "Advance booking removed");
    redirect_with("/advance-booking", "toast", "Booking removed")
}

async fn list_bookings(pool: &PgPool, owner: Uuid) -> Result<Vec<BookingView>> {
    let query = r"
        SELECT id, name, phone, expected_join_date, notes
        FROM advance_bookings
        WHERE user_id = $1
        ORDER BY expected_join_date, created_at
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(owner)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list bookings")?;

    Ok(rows
        .into_iter()
        .map(|row| BookingView {
            id: row.get("id"),
            name: row.get("name"),
            phone: row.get("phone"),
            expected_join_date: row.get("expected_join_date"),
            notes: display_notes(row.get("notes")),
        })
        .collect())
}

async fn delete_booking(pool: &PgPool, owner: Uuid, booking_id: Uuid) -> Result<Option<BookingRecord>> {
    let query = "DELETE FROM advance_bookings WHERE id = $1 AND user_id = $2 RETURNING name, phone";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(booking_id)
        .bind(owner)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to delete booking")?;

    Ok(row.map(|row| BookingRecord {
        name: row.get("name"),
        phone: row.get("phone"),
    }))
}
