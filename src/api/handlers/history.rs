//! Activity history with filters.

use anyhow::{Context, Result};
use axum::{
    extract::{Extension, Query},
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{activity::ActivityKind, auth::Owner, internal_error, parse_date_field, DateField};

/// Most entries returned by one history request.
pub const HISTORY_LIMIT: i64 = 500;

#[derive(Deserialize, Debug, Default, Clone)]
pub struct HistoryQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Validated filters. Unparsable dates and unknown kinds are dropped.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    pub since: Option<DateTime<Utc>>,
    /// Exclusive: start of the day after the requested `to` date.
    pub until: Option<DateTime<Utc>>,
    pub name: Option<String>,
    pub kind: Option<ActivityKind>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub kind_label: String,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TypeLabel {
    pub value: String,
    pub label: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct HistoryPage {
    pub entries: Vec<HistoryEntry>,
    pub type_labels: Vec<TypeLabel>,
    pub from: String,
    pub to: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

fn day_start(value: Option<&str>) -> Option<NaiveDate> {
    match parse_date_field(value) {
        DateField::Valid(date) => Some(date),
        DateField::Missing | DateField::Invalid => None,
    }
}

/// `%`, `_` and `\` are literal in the name filter.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl HistoryFilter {
    #[must_use]
    pub fn from_query(query: &HistoryQuery) -> Self {
        Self {
            since: day_start(query.from.as_deref()).map(start_of_day),
            until: day_start(query.to.as_deref())
                .and_then(|date| date.checked_add_days(Days::new(1)))
                .map(start_of_day),
            name: query
                .name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(ToString::to_string),
            kind: query.kind.as_deref().and_then(ActivityKind::parse),
        }
    }

    /// `ILIKE` pattern for the name filter.
    fn name_pattern(&self) -> Option<String> {
        self.name.as_deref().map(|name| format!("%{}%", escape_like(name)))
    }
}

#[must_use]
pub fn type_labels() -> Vec<TypeLabel> {
    ActivityKind::ALL
        .into_iter()
        .map(|kind| TypeLabel {
            value: kind.as_str().to_string(),
            label: kind.label().to_string(),
        })
        .collect()
}

#[utoipa::path(
    get,
    path = "/history",
    params(
        ("from" = Option<String>, Query, description = "First day, YYYY-MM-DD"),
        ("to" = Option<String>, Query, description = "Last day, YYYY-MM-DD"),
        ("name" = Option<String>, Query, description = "Case-insensitive name substring"),
        ("type" = Option<String>, Query, description = "Activity type")
    ),
    responses((status = 200, description = "Activity log, newest first", body = HistoryPage)),
    tag = "history"
)]
pub async fn history_page(
    Owner(owner): Owner,
    pool: Extension<PgPool>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let filter = HistoryFilter::from_query(&query);
    let entries = match list_entries(&pool, owner, &filter).await {
        Ok(entries) => entries,
        Err(err) => return internal_error("Failed to load history", &err),
    };

    Json(HistoryPage {
        entries,
        type_labels: type_labels(),
        from: query.from.unwrap_or_default(),
        to: query.to.unwrap_or_default(),
        name: query.name.unwrap_or_default(),
        kind: query.kind.unwrap_or_default(),
    })
    .into_response()
}

async fn list_entries(pool: &PgPool, owner: Uuid, filter: &HistoryFilter) -> Result<Vec<HistoryEntry>> {
    let query = r"
        SELECT id, kind, name, description, created_at
        FROM activity_logs
        WHERE user_id = $1
          AND ($2::timestamptz IS NULL OR created_at >= $2)
          AND ($3::timestamptz IS NULL OR created_at < $3)
          AND ($4::text IS NULL OR name ILIKE $4 ESCAPE '\')
          AND ($5::text IS NULL OR kind = $5)
        ORDER BY created_at DESC
        LIMIT $6
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(owner)
        .bind(filter.since)
        .bind(filter.until)
        .bind(filter.name_pattern())
        .bind(filter.kind.map(ActivityKind::as_str))
        .bind(HISTORY_LIMIT)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to query activity logs")?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let kind: String = row.get("kind");
            let kind_label = ActivityKind::parse(&kind)
                .map_or_else(|| kind.clone(), |kind| kind.label().to_string());
            HistoryEntry {
                id: row.get("id"),
                kind,
                kind_label,
                name: row.get("name"),
                description: row.get("description"),
                created_at: row.get("created_at"),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(from: &str, to: &str, name: &str, kind: &str) -> HistoryQuery {
        let some = |value: &str| (!value.is_empty()).then(|| value.to_string());
        HistoryQuery {
            from: some(from),
            to: some(to),
            name: some(name),
            kind: some(kind),
        }
    }

    fn utc(value: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.with_timezone(&Utc))
    }

    #[test]
    fn empty_query_means_no_filter() {
        assert_eq!(HistoryFilter::from_query(&HistoryQuery::default()), HistoryFilter::default());
    }

    #[test]
    fn dates_cover_whole_days() {
        let filter = HistoryFilter::from_query(&query("2024-05-01", "2024-05-31", "", ""));
        assert_eq!(filter.since, utc("2024-05-01T00:00:00Z"));
        assert_eq!(filter.until, utc("2024-06-01T00:00:00Z"));
    }

    #[test]
    fn timestamps_are_truncated_to_their_day() {
        let filter = HistoryFilter::from_query(&query("", "2024-05-31T08:30:00Z", "", ""));
        assert_eq!(filter.until, utc("2024-06-01T00:00:00Z"));
    }

    #[test]
    fn bad_dates_and_unknown_types_are_ignored() {
        let filter = HistoryFilter::from_query(&query("last week", "2024-13-01", "  ", "deleted"));
        assert_eq!(filter, HistoryFilter::default());
    }

    #[test]
    fn name_and_type_are_kept() {
        let filter = HistoryFilter::from_query(&query("", "", " Asha ", "rent_paid"));
        assert_eq!(filter.name.as_deref(), Some("Asha"));
        assert_eq!(filter.kind, Some(ActivityKind::RentPaid));
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("Asha"), "Asha");
    }

    #[test]
    fn name_pattern_is_a_literal_substring() {
        let filter = HistoryFilter::from_query(&query("", "", "50%", ""));
        assert_eq!(filter.name_pattern().as_deref(), Some("%50\\%%"));
        assert_eq!(HistoryFilter::default().name_pattern(), None);
    }

    #[test]
    fn every_kind_has_a_label() {
        let labels = type_labels();
        assert_eq!(labels.len(), ActivityKind::ALL.len());
        assert!(labels.iter().any(|label| label.value == "rent_unpaid" && label.label == "Rent unpaid"));
    }
}
