//! Occupants: move-in and move-out.

use anyhow::{Context, Result};
use axum::{
    extract::Extension,
    response::Response,
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
    internal_error, parse_date_field, parse_id, redirect_with,
    rent::MonthKey,
    DateField,
};

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OccupantView {
    pub id: Uuid,
    pub room_id: Uuid,
    pub name: String,
    pub phone: String,
    pub date_of_join: NaiveDate,
}

#[derive(Deserialize, Debug, Default)]
pub struct AddOccupantForm {
    #[serde(default)]
    room_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    phone: String,
    date_of_join: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct RemoveOccupantForm {
    #[serde(default)]
    occupant_id: String,
}

#[derive(Debug, PartialEq, Eq)]
enum AddOutcome {
    Added(Uuid),
    RoomNotFound,
    RoomFull,
}

struct NewOccupant<'a> {
    room_id: Uuid,
    name: &'a str,
    phone: &'a str,
    date_of_join: NaiveDate,
}

#[instrument(skip_all)]
pub async fn add(
    Owner(owner): Owner,
    pool: Extension<PgPool>,
    Form(form): Form<AddOccupantForm>,
) -> Response {
    let Some(room_id) = parse_id(&form.room_id) else {
        return redirect_with("/rooms", "toast", "Room not found");
    };
    let date_of_join = match parse_date_field(form.date_of_join.as_deref()) {
        DateField::Valid(date) => date,
        DateField::Missing => Utc::now().date_naive(),
        DateField::Invalid => return redirect_with("/rooms", "toast", "Invalid date"),
    };
    let occupant = NewOccupant {
        room_id,
        name: form.name.trim(),
        phone: form.phone.trim(),
        date_of_join,
    };

    let occupant_id = match insert_occupant(&pool, owner, &occupant).await {
        Ok(AddOutcome::Added(id)) => id,
        Ok(AddOutcome::RoomNotFound) => return redirect_with("/rooms", "toast", "Room not found"),
        Ok(AddOutcome::RoomFull) => return redirect_with("/rooms", "toast", "Room is full"),
        Err(err) => return internal_error("Failed to add occupant", &err),
    };

    activity::record(
        &pool,
        owner,
        ActivityKind::PersonCreated,
        occupant.name,
        &format!("Person added: {} ({})", occupant.name, occupant.phone),
        json!({ "occupant_id": occupant_id, "room_id": room_id }),
    )
    .await;

    info!(%occupant_id, %room_id, "Occupant added");
    redirect_with("/rooms", "toast", "Person added")
}

#[instrument(skip_all)]
pub async fn remove(
    Owner(owner): Owner,
    pool: Extension<PgPool>,
    Form(form): Form<RemoveOccupantForm>,
) -> Response {
    let Some(occupant_id) = parse_id(&form.occupant_id) else {
        return redirect_with("/rooms", "toast", "Occupant not found");
    };

    let occupant = match find_occupant(&pool, owner, occupant_id).await {
        Ok(Some(occupant)) => occupant,
        Ok(None) => return redirect_with("/rooms", "toast", "Occupant not found"),
        Err(err) => return internal_error("Failed to load occupant", &err),
    };

    activity::record(
        &pool,
        owner,
        ActivityKind::PersonRemoved,
        &occupant.name,
        &format!("Person removed: {} ({})", occupant.name, occupant.phone),
        json!({ "occupant_id": occupant_id }),
    )
    .await;

    if let Err(err) = delete_occupant(&pool, owner, occupant_id).await {
        return internal_error("Failed to remove occupant", &err);
    }

    info!(%occupant_id, "Occupant removed");
    redirect_with("/rooms", "toast", "Person removed")
}

/// Occupants of the owner, newest join first.
pub(crate) async fn list_occupants(pool: &PgPool, owner: Uuid) -> Result<Vec<OccupantView>> {
    let query = r"
        SELECT id, room_id, name, phone, date_of_join
        FROM occupants
        WHERE user_id = $1
        ORDER BY date_of_join DESC, created_at DESC
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
        .context("failed to list occupants")?;

    Ok(rows.iter().map(occupant_from_row).collect())
}

fn occupant_from_row(row: &sqlx::postgres::PgRow) -> OccupantView {
    OccupantView {
        id: row.get("id"),
        room_id: row.get("room_id"),
        name: row.get("name"),
        phone: row.get("phone"),
        date_of_join: row.get("date_of_join"),
    }
}

pub(crate) async fn find_occupant(
    pool: &PgPool,
    owner: Uuid,
    occupant_id: Uuid,
) -> Result<Option<OccupantView>> {
    let query = r"
        SELECT id, room_id, name, phone, date_of_join
        FROM occupants
        WHERE id = $1 AND user_id = $2
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(occupant_id)
        .bind(owner)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to load occupant")?;

    Ok(row.as_ref().map(occupant_from_row))
}

/// Insert an occupant if the room has space, together with the unpaid rent
/// record of the join month.
///
/// The room row stays locked until commit so two concurrent move-ins cannot
/// both take the last bed.
async fn insert_occupant(pool: &PgPool, owner: Uuid, occupant: &NewOccupant<'_>) -> Result<AddOutcome> {
    let mut tx = pool.begin().await.context("begin occupant transaction")?;

    let query = "SELECT max_people FROM rooms WHERE id = $1 AND user_id = $2 FOR UPDATE";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let Some(room) = sqlx::query(query)
        .bind(occupant.room_id)
        .bind(owner)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to lock room")?
    else {
        return Ok(AddOutcome::RoomNotFound);
    };
    let max_people: i32 = room.get("max_people");

    let query = "SELECT COUNT(*) AS occupied FROM occupants WHERE room_id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let occupied: i64 = sqlx::query(query)
        .bind(occupant.room_id)
        .fetch_one(&mut *tx)
        .instrument(span)
        .await
        .context("failed to count occupants")?
        .get("occupied");
    if occupied >= i64::from(max_people) {
        return Ok(AddOutcome::RoomFull);
    }

    let query = r"
        INSERT INTO occupants
            (user_id, room_id, name, phone, date_of_join)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let occupant_id: Uuid = sqlx::query(query)
        .bind(owner)
        .bind(occupant.room_id)
        .bind(occupant.name)
        .bind(occupant.phone)
        .bind(occupant.date_of_join)
        .fetch_one(&mut *tx)
        .instrument(span)
        .await
        .context("failed to insert occupant")?
        .get("id");

    let query = r"
        INSERT INTO rent_records
            (user_id, occupant_id, room_id, month, paid, due_amount)
        VALUES ($1, $2, $3, $4, FALSE, 0)
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
        .bind(occupant_id)
        .bind(occupant.room_id)
        .bind(MonthKey::from_date(occupant.date_of_join).to_string())
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to create rent record")?;

    tx.commit().await.context("commit occupant transaction")?;

    Ok(AddOutcome::Added(occupant_id))
}

// Rent records follow through ON DELETE CASCADE.
async fn delete_occupant(pool: &PgPool, owner: Uuid, occupant_id: Uuid) -> Result<()> {
    let query = "DELETE FROM occupants WHERE id = $1 AND user_id = $2";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(occupant_id)
        .bind(owner)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete occupant")?;
    Ok(())
}
