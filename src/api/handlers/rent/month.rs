//! Calendar months as used by rent records (`YYYY-MM`).

use chrono::{Datelike, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MonthKeyError {
    #[error("month must be formatted as YYYY-MM")]
    Format,
    #[error("month {0} is out of range")]
    OutOfRange(u32),
}

/// A calendar month, stored as its first day.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey(NaiveDate);

/// Entry of the month picker.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MonthOption {
    pub value: String,
    pub label: String,
}

impl MonthKey {
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.with_day(1).unwrap_or(date))
    }

    #[must_use]
    pub fn current() -> Self {
        Self::from_date(Utc::now().date_naive())
    }

    #[must_use]
    pub fn first_day(self) -> NaiveDate {
        self.0
    }

    #[must_use]
    pub fn last_day(self) -> NaiveDate {
        self.next().0.pred_opt().unwrap_or(self.0)
    }

    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.checked_add_months(Months::new(1)).unwrap_or(self.0))
    }

    /// Human form, e.g. `May 2024`.
    #[must_use]
    pub fn label(self) -> String {
        self.0.format("%B %Y").to_string()
    }

    /// Months from January of the previous year through the month of `today`,
    /// newest first.
    #[must_use]
    pub fn options(today: NaiveDate) -> Vec<MonthOption> {
        let end = Self::from_date(today);
        let mut month = NaiveDate::from_ymd_opt(today.year() - 1, 1, 1).map_or(end, Self);
        let mut options = Vec::new();
        while month <= end {
            options.push(MonthOption {
                value: month.to_string(),
                label: month.label(),
            });
            let next = month.next();
            if next == month {
                break;
            }
            month = next;
        }
        options.reverse();
        options
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.0.year(), self.0.month())
    }
}

impl FromStr for MonthKey {
    type Err = MonthKeyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (year, month) = value.trim().split_once('-').ok_or(MonthKeyError::Format)?;
        let digits = |part: &str, len: usize| part.len() == len && part.bytes().all(|b| b.is_ascii_digit());
        if !digits(year, 4) || !digits(month, 2) {
            return Err(MonthKeyError::Format);
        }
        let year: i32 = year.parse().map_err(|_| MonthKeyError::Format)?;
        let month: u32 = month.parse().map_err(|_| MonthKeyError::Format)?;
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(Self)
            .ok_or(MonthKeyError::OutOfRange(month))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
    }

    #[test]
    fn parse_and_display() -> Result<(), MonthKeyError> {
        let key: MonthKey = "2024-05".parse()?;
        assert_eq!(key.to_string(), "2024-05");
        assert_eq!(key.first_day(), date(2024, 5, 1));
        Ok(())
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert_eq!("2024-5".parse::<MonthKey>(), Err(MonthKeyError::Format));
        assert_eq!("24-05".parse::<MonthKey>(), Err(MonthKeyError::Format));
        assert_eq!("2024/05".parse::<MonthKey>(), Err(MonthKeyError::Format));
        assert_eq!("2024-+5".parse::<MonthKey>(), Err(MonthKeyError::Format));
        assert_eq!("".parse::<MonthKey>(), Err(MonthKeyError::Format));
        assert_eq!("2024-13".parse::<MonthKey>(), Err(MonthKeyError::OutOfRange(13)));
        assert_eq!("2024-00".parse::<MonthKey>(), Err(MonthKeyError::OutOfRange(0)));
    }

    #[test]
    fn last_day_handles_short_months() -> Result<(), MonthKeyError> {
        assert_eq!("2024-02".parse::<MonthKey>()?.last_day(), date(2024, 2, 29));
        assert_eq!("2023-02".parse::<MonthKey>()?.last_day(), date(2023, 2, 28));
        assert_eq!("2024-12".parse::<MonthKey>()?.last_day(), date(2024, 12, 31));
        assert_eq!("2024-04".parse::<MonthKey>()?.last_day(), date(2024, 4, 30));
        Ok(())
    }

    #[test]
    fn label_uses_month_name() -> Result<(), MonthKeyError> {
        assert_eq!("2024-05".parse::<MonthKey>()?.label(), "May 2024");
        Ok(())
    }

    #[test]
    fn from_date_truncates_to_month() {
        assert_eq!(MonthKey::from_date(date(2024, 7, 19)).to_string(), "2024-07");
    }

    #[test]
    fn options_run_from_previous_january_newest_first() {
        let options = MonthKey::options(date(2024, 3, 15));
        assert_eq!(options.len(), 15);
        assert_eq!(options[0].value, "2024-03");
        assert_eq!(options[0].label, "March 2024");
        assert_eq!(options[14].value, "2023-01");
    }
}
