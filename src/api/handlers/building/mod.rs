//! Building configuration, dashboard and rooms overview.

pub mod layout;
pub(crate) mod storage;

use axum::{
    extract::{Extension, Query},
    response::{IntoResponse, Json, Redirect, Response},
    Form,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use self::{layout::BuildingConfig, storage::RoomRecord};
use super::{
    activity::{self, ActivityKind},
    auth::Owner,
    floor_label, internal_error,
    occupants::{list_occupants, OccupantView},
    redirect_with, FeedbackQuery,
};

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RoomView {
    pub id: Uuid,
    pub room_number: i32,
    pub max_people: i32,
    pub fill_count: i32,
    pub empty_count: i32,
    pub occupant_ids: Vec<Uuid>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FloorView {
    pub floor: i32,
    pub label: String,
    pub rooms: Vec<RoomView>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct DashboardPage {
    pub floors: Vec<FloorView>,
    pub total_rooms: usize,
    pub total_capacity: i64,
    pub total_occupants: i64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RoomsPage {
    pub floors: Vec<FloorView>,
    pub occupants: Vec<OccupantView>,
    pub toast: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ConfigPage {
    pub config: BuildingConfig,
    pub error: Option<String>,
}

impl From<RoomRecord> for RoomView {
    fn from(room: RoomRecord) -> Self {
        let fill_count = i32::try_from(room.occupant_ids.len()).unwrap_or(i32::MAX);
        Self {
            id: room.id,
            room_number: room.room_number,
            max_people: room.max_people,
            fill_count,
            // A capacity lowered below the current occupancy never shows negative space.
            empty_count: room.max_people.saturating_sub(fill_count).max(0),
            occupant_ids: room.occupant_ids,
        }
    }
}

/// Group rooms (sorted by floor, then room number) into floors.
#[must_use]
pub(crate) fn group_by_floor(rooms: Vec<RoomRecord>) -> Vec<FloorView> {
    let mut floors: Vec<FloorView> = Vec::new();
    for room in rooms {
        let floor = room.floor;
        match floors.last_mut() {
            Some(current) if current.floor == floor => current.rooms.push(room.into()),
            _ => floors.push(FloorView {
                floor,
                label: floor_label(floor),
                rooms: vec![room.into()],
            }),
        }
    }
    floors
}

#[utoipa::path(
    get,
    path = "/main",
    responses(
        (status = 200, description = "Rooms grouped by floor", body = DashboardPage),
        (status = 303, description = "Not configured yet, redirect to /config")
    ),
    tag = "building"
)]
pub async fn main_page(Owner(owner): Owner, pool: Extension<PgPool>) -> Response {
    match storage::is_configured(&pool, owner).await {
        Ok(true) => {}
        Ok(false) => return Redirect::to("/config").into_response(),
        Err(err) => return internal_error("Failed to load building config", &err),
    }

    let rooms = match storage::list_rooms(&pool, owner).await {
        Ok(rooms) => rooms,
        Err(err) => return internal_error("Failed to list rooms", &err),
    };

    let floors = group_by_floor(rooms);
    let all_rooms = || floors.iter().flat_map(|floor| floor.rooms.iter());
    let page = DashboardPage {
        total_rooms: all_rooms().count(),
        total_capacity: all_rooms().map(|room| i64::from(room.max_people)).sum(),
        total_occupants: all_rooms().map(|room| i64::from(room.fill_count)).sum(),
        floors,
    };
    Json(page).into_response()
}

#[utoipa::path(
    get,
    path = "/config",
    params(("error" = Option<String>, Query, description = "Error from a rejected save")),
    responses((status = 200, description = "Layout editor", body = ConfigPage)),
    tag = "building"
)]
pub async fn config_page(
    Owner(owner): Owner,
    pool: Extension<PgPool>,
    Query(query): Query<FeedbackQuery>,
) -> Response {
    let config = match storage::load_config(&pool, owner).await {
        Ok(config) => config.map_or_else(BuildingConfig::starter, BuildingConfig::for_editing),
        Err(err) => return internal_error("Failed to load building config", &err),
    };
    Json(ConfigPage {
        config,
        error: query.error,
    })
    .into_response()
}

#[instrument(skip_all)]
pub async fn config_save(
    Owner(owner): Owner,
    pool: Extension<PgPool>,
    Form(fields): Form<HashMap<String, String>>,
) -> Response {
    let config = match BuildingConfig::from_form(&fields) {
        Ok(config) => config,
        Err(err) => return redirect_with("/config", "error", &err.to_string()),
    };

    let rooms = match storage::save_config(&pool, owner, &config).await {
        Ok(rooms) => rooms,
        Err(err) => return internal_error("Failed to save building config", &err),
    };

    let floors = config.floor_configs.len();
    activity::record(
        &pool,
        owner,
        ActivityKind::ConfigUpdated,
        "Building",
        &format!("Building configuration updated: {floors} floor(s), {rooms} room(s)"),
        json!({ "floors": floors, "rooms": rooms }),
    )
    .await;

    info!(floors, rooms, "Building config saved");
    Redirect::to("/main").into_response()
}

#[utoipa::path(
    get,
    path = "/rooms",
    params(("toast" = Option<String>, Query, description = "Result of the last action")),
    responses(
        (status = 200, description = "Rooms and occupants", body = RoomsPage),
        (status = 303, description = "Not configured yet, redirect to /config")
    ),
    tag = "building"
)]
pub async fn rooms_page(
    Owner(owner): Owner,
    pool: Extension<PgPool>,
    Query(query): Query<FeedbackQuery>,
) -> Response {
    match storage::is_configured(&pool, owner).await {
        Ok(true) => {}
        Ok(false) => return Redirect::to("/config").into_response(),
        Err(err) => return internal_error("Failed to load building config", &err),
    }

    let rooms = match storage::list_rooms(&pool, owner).await {
        Ok(rooms) => rooms,
        Err(err) => return internal_error("Failed to list rooms", &err),
    };
    let occupants = match list_occupants(&pool, owner).await {
        Ok(occupants) => occupants,
        Err(err) => return internal_error("Failed to list occupants", &err),
    };

    Json(RoomsPage {
        floors: group_by_floor(rooms),
        occupants,
        toast: query.toast,
    })
    .into_response()
}
