//! Sync windows and date conversion at the retailer boundary.
//!
//! Callers speak ISO-8601 (`YYYY-MM-DD`); the retailer speaks `MM/DD/YYYY`.

use chrono::{Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

const ISO_FORMAT: &str = "%Y-%m-%d";
const COUNTERPART_FORMAT: &str = "%m/%d/%Y";

/// Inclusive date window for one sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, SyncError> {
        if start > end {
            return Err(SyncError::Validation(format!(
                "start date {start} is after end date {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Window of `days` ending on `today`.
    pub fn trailing(days: u32, today: NaiveDate) -> Self {
        Self {
            start: today - Duration::days(i64::from(days)),
            end: today,
        }
    }

    /// Build a window from optional ISO dates; omitted bounds fall back to a
    /// trailing `window_days` window ending `today`.
    pub fn resolve_at(
        start: Option<&str>,
        end: Option<&str>,
        window_days: u32,
        today: NaiveDate,
    ) -> Result<Self, SyncError> {
        let end = match end {
            Some(raw) => parse_iso(raw)?,
            None => today,
        };
        let start = match start {
            Some(raw) => parse_iso(raw)?,
            None => end - Duration::days(i64::from(window_days)),
        };
        Self::new(start, end)
    }

    /// [`resolve_at`](Self::resolve_at) against the local calendar date.
    pub fn resolve(
        start: Option<&str>,
        end: Option<&str>,
        window_days: u32,
    ) -> Result<Self, SyncError> {
        Self::resolve_at(start, end, window_days, Local::now().date_naive())
    }

    pub fn counterpart_start(&self) -> String {
        to_counterpart(self.start)
    }

    pub fn counterpart_end(&self) -> String {
        to_counterpart(self.end)
    }
}

pub fn parse_iso(raw: &str) -> Result<NaiveDate, SyncError> {
    NaiveDate::parse_from_str(raw.trim(), ISO_FORMAT)
        .map_err(|e| SyncError::Validation(format!("invalid date '{raw}': {e}")))
}

pub fn to_counterpart(date: NaiveDate) -> String {
    date.format(COUNTERPART_FORMAT).to_string()
}
