//! Database helpers for the building layout and its rooms.

use anyhow::{Context, Result};
use sqlx::{types::Json, PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::layout::{BuildingConfig, FloorConfig};

/// A stored room with the ids of its current occupants.
#[derive(Debug, Clone)]
pub(crate) struct RoomRecord {
    pub(crate) id: Uuid,
    pub(crate) floor: i32,
    pub(crate) room_number: i32,
    pub(crate) max_people: i32,
    pub(crate) occupant_ids: Vec<Uuid>,
}

pub(crate) async fn load_config(pool: &PgPool, owner: Uuid) -> Result<Option<BuildingConfig>> {
    let query = "SELECT has_ground_floor, floor_configs FROM building_configs WHERE user_id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(owner)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to load building config")?;

    row.map(|row| -> Result<BuildingConfig> {
        let floors: Json<Vec<FloorConfig>> = row
            .try_get("floor_configs")
            .context("failed to decode floor configs")?;
        Ok(BuildingConfig {
            has_ground_floor: row.get("has_ground_floor"),
            floor_configs: floors.0,
        })
    })
    .transpose()
}

/// `true` once the owner saved a layout with at least one floor.
pub(crate) async fn is_configured(pool: &PgPool, owner: Uuid) -> Result<bool> {
    Ok(load_config(pool, owner)
        .await?
        .is_some_and(|config| !config.floor_configs.is_empty()))
}

/// Store the layout and bring the rooms table in line with it.
///
/// Existing rooms keep their id (and occupants) and get the new capacity; new
/// slots are inserted; rooms that disappeared are deleted together with their
/// occupants. Runs in one transaction.
pub(crate) async fn save_config(pool: &PgPool, owner: Uuid, config: &BuildingConfig) -> Result<usize> {
    let mut tx = pool.begin().await.context("begin config transaction")?;

    let query = r"
        INSERT INTO building_configs
            (user_id, floors, has_ground_floor, floor_configs, updated_at)
        VALUES ($1, $2, $3, $4, NOW())
        ON CONFLICT (user_id) DO UPDATE SET
            floors = EXCLUDED.floors,
            has_ground_floor = EXCLUDED.has_ground_floor,
            floor_configs = EXCLUDED.floor_configs,
            updated_at = EXCLUDED.updated_at
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(owner)
        .bind(i32::try_from(config.floor_configs.len()).context("too many floors")?)
        .bind(config.has_ground_floor)
        .bind(Json(&config.floor_configs))
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to store building config")?;

    let slots = config.room_slots();
    let floors: Vec<i32> = slots.iter().map(|slot| slot.floor).collect();
    let numbers: Vec<i32> = slots.iter().map(|slot| slot.room_number).collect();
    let capacities: Vec<i32> = slots.iter().map(|slot| slot.max_people).collect();

    let query = r"
        INSERT INTO rooms
            (user_id, floor, room_number, max_people)
        SELECT $1, slot.floor, slot.room_number, slot.max_people
        FROM UNNEST($2::int[], $3::int[], $4::int[]) AS slot(floor, room_number, max_people)
        ON CONFLICT (user_id, floor, room_number) DO UPDATE SET
            max_people = EXCLUDED.max_people
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(owner)
        .bind(&floors)
        .bind(&numbers)
        .bind(&capacities)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to sync rooms")?;

    // Occupants (and their rent records) go with the room through ON DELETE CASCADE.
    let query = r"
        DELETE FROM rooms
        WHERE user_id = $1
          AND NOT EXISTS (
              SELECT 1
              FROM UNNEST($2::int[], $3::int[]) AS keep(floor, room_number)
              WHERE keep.floor = rooms.floor AND keep.room_number = rooms.room_number
          )
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(owner)
        .bind(&floors)
        .bind(&numbers)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to remove stale rooms")?;

    tx.commit().await.context("commit config transaction")?;

    Ok(slots.len())
}

pub(crate) async fn list_rooms(pool: &PgPool, owner: Uuid) -> Result<Vec<RoomRecord>> {
    let query = r"
        SELECT
            r.id,
            r.floor,
            r.room_number,
            r.max_people,
            COALESCE(
                ARRAY_AGG(o.id ORDER BY o.date_of_join, o.created_at) FILTER (WHERE o.id IS NOT NULL),
                '{}'
            ) AS occupant_ids
        FROM rooms r
        LEFT JOIN occupants o ON o.room_id = r.id AND o.user_id = r.user_id
        WHERE r.user_id = $1
        GROUP BY r.id
        ORDER BY r.floor, r.room_number
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
        .context("failed to list rooms")?;

    Ok(rows
        .into_iter()
        .map(|row| RoomRecord {
            id: row.get("id"),
            floor: row.get("floor"),
            room_number: row.get("room_number"),
            max_people: row.get("max_people"),
            occupant_ids: row.get("occupant_ids"),
        })
        .collect())
}
