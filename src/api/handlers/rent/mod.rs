//! Monthly rent status per occupant.

mod month;

pub use month::{MonthKey, MonthKeyError, MonthOption};

use anyhow::{Context, Result};
use axum::{
    extract::{Extension, Query},
    response::{IntoResponse, Json, Response},
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{PgPool, Row};
use tracing::{debug, info, instrument, Instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    activity::{self, ActivityKind},
    auth::Owner,
    floor_label, internal_error,
    occupants::find_occupant,
    parse_id, redirect_with,
};

#[derive(Deserialize, Debug, Default)]
pub struct RentQuery {
    pub month: Option<String>,
    pub toast: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct ToggleQuery {
    #[serde(default)]
    pub occupant_id: String,
    #[serde(default)]
    pub month: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RentRow {
    pub occupant_id: Uuid,
    pub room_id: Uuid,
    pub room_label: String,
    pub name: String,
    pub phone: String,
    pub date_of_join: NaiveDate,
    pub paid: bool,
    pub due_amount: i64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RentPage {
    pub month: String,
    pub month_label: String,
    pub rows: Vec<RentRow>,
    pub month_options: Vec<MonthOption>,
    pub toast: Option<String>,
}

#[must_use]
pub fn room_label(floor: i32, room_number: i32) -> String {
    format!("{} - Room {room_number}", floor_label(floor))
}

/// Month asked for, or the current month when absent or malformed.
fn requested_month(value: Option<&str>) -> MonthKey {
    value
        .filter(|value| !value.trim().is_empty())
        .and_then(|value| {
            value
                .parse()
                .map_err(|err| debug!("Ignoring month {value:?}: {err}"))
                .ok()
        })
        .unwrap_or_else(MonthKey::current)
}

#[utoipa::path(
    get,
    path = "/rent",
    params(
        ("month" = Option<String>, Query, description = "Month as YYYY-MM, defaults to the current month"),
        ("toast" = Option<String>, Query, description = "Result of the last action")
    ),
    responses((status = 200, description = "Rent status of the month", body = RentPage)),
    tag = "rent"
)]
pub async fn rent_page(
    Owner(owner): Owner,
    pool: Extension<PgPool>,
    Query(query): Query<RentQuery>,
) -> Response {
    let month = requested_month(query.month.as_deref());

    if let Err(err) = ensure_records(&pool, owner, month).await {
        return internal_error("Failed to create rent records", &err);
    }
    let rows = match list_rows(&pool, owner, month).await {
        Ok(rows) => rows,
        Err(err) => return internal_error("Failed to list rent records", &err),
    };

    Json(RentPage {
        month: month.to_string(),
        month_label: month.label(),
        rows,
        month_options: MonthKey::options(Utc::now().date_naive()),
        toast: query.toast,
    })
    .into_response()
}

#[instrument(skip_all)]
pub async fn rent_toggle(
    Owner(owner): Owner,
    pool: Extension<PgPool>,
    Query(query): Query<ToggleQuery>,
) -> Response {
    let Some(occupant_id) = parse_id(&query.occupant_id) else {
        return redirect_with("/rent", "toast", "Not found");
    };
    let Ok(month) = query.month.parse::<MonthKey>() else {
        return redirect_with("/rent", "toast", "Invalid month");
    };

    let occupant = match find_occupant(&pool, owner, occupant_id).await {
        Ok(Some(occupant)) => occupant,
        Ok(None) => return redirect_with("/rent", "toast", "Not found"),
        Err(err) => return internal_error("Failed to load occupant", &err),
    };

    let paid = match toggle_paid(&pool, owner, occupant_id, occupant.room_id, month).await {
        Ok(paid) => paid,
        Err(err) => return internal_error("Failed to toggle rent", &err),
    };

    let (kind, state) = if paid {
        (ActivityKind::RentPaid, "paid")
    } else {
        (ActivityKind::RentUnpaid, "unpaid")
    };
    activity::record(
        &pool,
        owner,
        kind,
        &occupant.name,
        &format!("Rent marked {state} for {} ({month})", occupant.name),
        json!({ "occupant_id": occupant_id, "month": month.to_string() }),
    )
    .await;

    info!(%occupant_id, %month, paid, "Rent toggled");
    redirect_with(
        &format!("/rent?month={month}"),
        "toast",
        &format!("Marked as {state}"),
    )
}

/// Create the missing unpaid records of every occupant living there that month.
async fn ensure_records(pool: &PgPool, owner: Uuid, month: MonthKey) -> Result<()> {
    let query = r"
        INSERT INTO rent_records
            (user_id, occupant_id, room_id, month, paid, due_amount)
        SELECT o.user_id, o.id, o.room_id, $2, FALSE, 0
        FROM occupants o
        WHERE o.user_id = $1 AND o.date_of_join <= $3
        ON CONFLICT (user_id, occupant_id, month) DO NOTHING
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(owner)
        .bind(month.to_string())
        .bind(month.last_day())
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to ensure rent records")?;
    Ok(())
}

async fn list_rows(pool: &PgPool, owner: Uuid, month: MonthKey) -> Result<Vec<RentRow>> {
    let query = r"
        SELECT
            o.id AS occupant_id,
            o.room_id,
            r.floor,
            r.room_number,
            o.name,
            o.phone,
            o.date_of_join,
            COALESCE(rr.paid, FALSE) AS paid,
            COALESCE(rr.due_amount, 0) AS due_amount
        FROM occupants o
        JOIN rooms r ON r.id = o.room_id
        LEFT JOIN rent_records rr
            ON rr.user_id = o.user_id AND rr.occupant_id = o.id AND rr.month = $2
        WHERE o.user_id = $1 AND o.date_of_join <= $3
        ORDER BY r.floor, r.room_number, o.name
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(owner)
        .bind(month.to_string())
        .bind(month.last_day())
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list rent rows")?;

    Ok(rows
        .into_iter()
        .map(|row| RentRow {
            occupant_id: row.get("occupant_id"),
            room_id: row.get("room_id"),
            room_label: room_label(row.get("floor"), row.get("room_number")),
            name: row.get("name"),
            phone: row.get("phone"),
            date_of_join: row.get("date_of_join"),
            paid: row.get("paid"),
            due_amount: row.get("due_amount"),
        })
        .collect())
}

/// Flip the paid flag; a month without a record becomes paid.
async fn toggle_paid(
    pool: &PgPool,
    owner: Uuid,
    occupant_id: Uuid,
    room_id: Uuid,
    month: MonthKey,
) -> Result<bool> {
    let query = r"
        INSERT INTO rent_records
            (user_id, occupant_id, room_id, month, paid, due_amount)
        VALUES ($1, $2, $3, $4, TRUE, 0)
        ON CONFLICT (user_id, occupant_id, month) DO UPDATE SET
            paid = NOT rent_records.paid
        RETURNING paid
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(owner)
        .bind(occupant_id)
        .bind(room_id)
        .bind(month.to_string())
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to toggle rent record")?;
    Ok(row.get("paid"))
}
