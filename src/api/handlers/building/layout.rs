//! Building layout: floors, rooms per floor and room capacity.
//!
//! Floors are numbered from 0 when the building has a ground floor and from 1
//! otherwise; rooms are numbered from 1 on every floor.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use utoipa::ToSchema;

pub const DEFAULT_MAX_PEOPLE: i32 = 2;
pub const MIN_MAX_PEOPLE: i32 = 1;
pub const MAX_MAX_PEOPLE: i32 = 20;
pub const MAX_FLOORS: usize = 100;
pub const MAX_ROOMS_PER_FLOOR: usize = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid config")]
    InvalidJson,
    #[error("At least one floor with one room required")]
    Empty,
    #[error("Too many floors or rooms")]
    TooLarge,
}

const fn default_max_people() -> i32 {
    DEFAULT_MAX_PEOPLE
}

#[derive(ToSchema, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoomConfig {
    #[serde(alias = "maxPeople", default = "default_max_people")]
    pub max_people: i32,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_people: DEFAULT_MAX_PEOPLE,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct FloorConfig {
    #[serde(default)]
    pub rooms: Vec<RoomConfig>,
}

#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildingConfig {
    #[serde(default)]
    pub has_ground_floor: bool,
    #[serde(default)]
    pub floor_configs: Vec<FloorConfig>,
}

/// One room the stored layout must contain after a save.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoomSlot {
    pub floor: i32,
    pub room_number: i32,
    pub max_people: i32,
}

impl BuildingConfig {
    /// Layout shown to a user that has not configured anything yet.
    #[must_use]
    pub fn starter() -> Self {
        Self {
            has_ground_floor: false,
            floor_configs: vec![FloorConfig {
                rooms: vec![RoomConfig::default()],
            }],
        }
    }

    /// Read a submitted layout, either from the `config_json` field or from the
    /// discrete `floor_count` / `floor_{i}_rooms` / `floor_{i}_room_{j}_max` fields.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] when the JSON is malformed, the layout has no
    /// room at all, or it exceeds the size limits.
    pub fn from_form(fields: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let config = match fields.get("config_json").map(|json| json.trim()) {
            Some(json) if !json.is_empty() => Self::from_json(json)?,
            _ => Self::from_fields(fields)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn from_json(json: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_json::from_str(json).map_err(|_| ConfigError::InvalidJson)?;
        for room in config.floor_configs.iter_mut().flat_map(|floor| floor.rooms.iter_mut()) {
            room.max_people = clamp_max_people(room.max_people);
        }
        Ok(config)
    }

    fn from_fields(fields: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let number = |key: &str, default: i64| -> i64 {
            fields
                .get(key)
                .and_then(|value| value.trim().parse::<i64>().ok())
                .unwrap_or(default)
        };

        let floor_count = bounded_count(number("floor_count", 1), MAX_FLOORS)?;
        let mut floor_configs = Vec::with_capacity(floor_count);
        for floor in 0..floor_count {
            let room_count =
                bounded_count(number(&format!("floor_{floor}_rooms"), 1), MAX_ROOMS_PER_FLOOR)?;
            let rooms = (0..room_count)
                .map(|room| {
                    let max = number(
                        &format!("floor_{floor}_room_{room}_max"),
                        i64::from(DEFAULT_MAX_PEOPLE),
                    );
                    let max = max.clamp(i64::from(MIN_MAX_PEOPLE), i64::from(MAX_MAX_PEOPLE));
                    RoomConfig {
                        max_people: i32::try_from(max).unwrap_or(DEFAULT_MAX_PEOPLE),
                    }
                })
                .collect();
            floor_configs.push(FloorConfig { rooms });
        }

        Ok(Self {
            has_ground_floor: fields.get("has_ground_floor").map(String::as_str) == Some("on"),
            floor_configs,
        })
    }

    /// # Errors
    /// Returns [`ConfigError::Empty`] when no floor has a room and
    /// [`ConfigError::TooLarge`] when the limits are exceeded.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.floor_configs.len() > MAX_FLOORS
            || self
                .floor_configs
                .iter()
                .any(|floor| floor.rooms.len() > MAX_ROOMS_PER_FLOOR)
        {
            return Err(ConfigError::TooLarge);
        }
        if !self.floor_configs.iter().any(|floor| !floor.rooms.is_empty()) {
            return Err(ConfigError::Empty);
        }
        Ok(())
    }

    /// Floor number of the floor at `index` in `floor_configs`.
    #[must_use]
    pub fn floor_number(&self, index: usize) -> i32 {
        let index = i32::try_from(index).unwrap_or(i32::MAX - 1);
        if self.has_ground_floor {
            index
        } else {
            index + 1
        }
    }

    /// Every room of the layout with its floor and room number.
    #[must_use]
    pub fn room_slots(&self) -> Vec<RoomSlot> {
        self.floor_configs
            .iter()
            .enumerate()
            .flat_map(|(index, floor)| {
                let floor_number = self.floor_number(index);
                floor.rooms.iter().zip(1..).map(move |(room, room_number)| RoomSlot {
                    floor: floor_number,
                    room_number,
                    max_people: room.max_people,
                })
            })
            .collect()
    }

    /// Copy prepared for the edit form: capacities at least 1 and no floor
    /// without a room.
    #[must_use]
    pub fn for_editing(mut self) -> Self {
        for floor in &mut self.floor_configs {
            if floor.rooms.is_empty() {
                floor.rooms.push(RoomConfig::default());
            }
            for room in &mut floor.rooms {
                room.max_people = room.max_people.max(MIN_MAX_PEOPLE);
            }
        }
        if self.floor_configs.is_empty() {
            return Self::starter();
        }
        self
    }
}

fn clamp_max_people(value: i32) -> i32 {
    value.clamp(MIN_MAX_PEOPLE, MAX_MAX_PEOPLE)
}

fn bounded_count(value: i64, max: usize) -> Result<usize, ConfigError> {
    let value = usize::try_from(value.max(0)).map_err(|_| ConfigError::TooLarge)?;
    if value > max {
        return Err(ConfigError::TooLarge);
    }
    Ok(value)
}
