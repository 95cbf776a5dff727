//! Activity log writes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{types::Json, PgPool};
use tracing::{warn, Instrument};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(ToSchema, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    PersonCreated,
    PersonRemoved,
    AdvanceBookingAdded,
    AdvanceBookingRemoved,
    RentPaid,
    RentUnpaid,
    ConfigUpdated,
}

impl ActivityKind {
    pub const ALL: [Self; 7] = [
        Self::PersonCreated,
        Self::PersonRemoved,
        Self::AdvanceBookingAdded,
        Self::AdvanceBookingRemoved,
        Self::RentPaid,
        Self::RentUnpaid,
        Self::ConfigUpdated,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PersonCreated => "person_created",
            Self::PersonRemoved => "person_removed",
            Self::AdvanceBookingAdded => "advance_booking_added",
            Self::AdvanceBookingRemoved => "advance_booking_removed",
            Self::RentPaid => "rent_paid",
            Self::RentUnpaid => "rent_unpaid",
            Self::ConfigUpdated => "config_updated",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::PersonCreated => "Person added",
            Self::PersonRemoved => "Person removed",
            Self::AdvanceBookingAdded => "Advance booking added",
            Self::AdvanceBookingRemoved => "Advance booking removed",
            Self::RentPaid => "Rent paid",
            Self::RentUnpaid => "Rent unpaid",
            Self::ConfigUpdated => "Config updated",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

/// Append an entry to the owner's activity log.
///
/// Best effort: the action being logged has already happened, so a failed
/// write is logged with `warn!` and the caller carries on.
pub(crate) async fn record(
    pool: &PgPool,
    owner: Uuid,
    kind: ActivityKind,
    name: &str,
    description: &str,
    metadata: Value,
) {
    let query = r"
        INSERT INTO activity_logs
            (user_id, kind, name, description, metadata)
        VALUES ($1, $2, $3, $4, $5)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(owner)
        .bind(kind.as_str())
        .bind(name)
        .bind(description)
        .bind(Json(metadata))
        .execute(pool)
        .instrument(span)
        .await;

    if let Err(err) = result {
        warn!(kind = kind.as_str(), "Failed to write activity log: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_every_kind() {
        for kind in ActivityKind::ALL {
            assert_eq!(ActivityKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn parse_rejects_unknown() {
        assert_eq!(ActivityKind::parse("account_deleted"), None);
        assert_eq!(ActivityKind::parse(""), None);
        assert_eq!(ActivityKind::parse(" rent_paid "), Some(ActivityKind::RentPaid));
    }

    #[test]
    fn serde_uses_snake_case_names() -> Result<(), serde_json::Error> {
        assert_eq!(
            serde_json::to_string(&ActivityKind::AdvanceBookingAdded)?,
            "\"advance_booking_added\""
        );
        Ok(())
    }
}
