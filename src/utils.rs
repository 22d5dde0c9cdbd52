use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, Utc};

use crate::models::DATE_FORMAT;

/// Environment variable carrying the deployment date (`yyyyMMdd`)
pub const DEPLOYMENT_DATE_VAR: &str = "QC_DATAFLEET_DEPLOYMENT_DATE";

/// Today's date in UTC
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

/// Yesterday's date in UTC, the default processing date
pub fn yesterday_utc() -> NaiveDate {
    today_utc() - Duration::days(1)
}

/// Parse a `yyyyMMdd` date
pub fn parse_compact_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .with_context(|| format!("Invalid date '{}', expected yyyyMMdd", value))
}

/// Pick the processing date: explicit override, then the deployment date
/// variable, then yesterday.
pub fn resolve_process_date(
    override_date: Option<NaiveDate>,
    deployment_date: Option<&str>,
) -> Result<NaiveDate> {
    if let Some(date) = override_date {
        return Ok(date);
    }
    match deployment_date.filter(|value| !value.trim().is_empty()) {
        Some(value) => parse_compact_date(value),
        None => Ok(yesterday_utc()),
    }
}

/// Only completed days can be processed; the zero date is a sentinel
pub fn is_valid_process_date(date: NaiveDate, today: NaiveDate) -> bool {
    let sentinel = NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or(NaiveDate::MIN);
    date < today && date > sentinel
}
