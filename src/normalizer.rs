//! Turns the vendor's JSON payload into per-ticker and universe lines.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{NormalizedRow, RawContractRecord};
use crate::security_id::SecurityIdResolver;

/// Why a single vendor record was left out of the batch
#[derive(Debug, Error)]
pub enum InvalidRecord {
    #[error("record does not match the vendor schema: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("record has no ticker")]
    MissingTicker,
    #[error("record has no agency")]
    MissingAgency,
    #[error("record has no amount")]
    MissingAmount,
}

/// Lines derived from one vendor response
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    /// Per-ticker lines in input order, keyed by uppercased ticker
    pub by_ticker: BTreeMap<String, Vec<String>>,
    /// Universe lines for the processing date
    pub universe: Vec<String>,
    /// Records that made it into the batch
    pub records: usize,
    /// Records skipped as malformed or unresolvable
    pub skipped: usize,
}

/// Split the response body into individual records.
///
/// Empty or whitespace-only bodies hold zero records. Anything other than a
/// JSON array is an error.
pub fn parse_records(body: &str) -> Result<Vec<Value>> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(body)?)
}

/// Make a description safe to embed in a comma separated line
pub fn sanitize_description(description: &str) -> String {
    description
        .replace(',', ";")
        .replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
}

/// Validate one raw record and normalize it for `process_date`
pub fn normalize_record(
    value: Value,
    process_date: NaiveDate,
) -> std::result::Result<NormalizedRow, InvalidRecord> {
    let raw: RawContractRecord = serde_json::from_value(value)?;

    let ticker = raw
        .ticker
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(InvalidRecord::MissingTicker)?
        .to_uppercase();
    let agency = raw
        .agency
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .ok_or(InvalidRecord::MissingAgency)?;
    let amount = raw.amount.ok_or(InvalidRecord::MissingAmount)?;

    if let Some(date) = raw.date.as_deref() {
        if NaiveDate::parse_from_str(date, "%Y-%m-%d").ok() != Some(process_date) {
            debug!("{} reported on {} while processing {}", ticker, date, process_date);
        }
    }

    Ok(NormalizedRow {
        process_date,
        ticker,
        description: raw.description.as_deref().map(sanitize_description),
        agency,
        amount: amount.to_string(),
    })
}

/// Normalize every record, resolving security identifiers for the universe lines.
///
/// Bad records are logged and counted instead of failing the batch.
pub fn normalize(
    records: Vec<Value>,
    process_date: NaiveDate,
    resolver: &dyn SecurityIdResolver,
) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();

    for (index, value) in records.into_iter().enumerate() {
        let row = match normalize_record(value, process_date) {
            Ok(row) => row,
            Err(e) => {
                warn!("⚠️ Skipping record #{}: {}", index, e);
                batch.skipped += 1;
                continue;
            }
        };

        let security_id = match resolver.resolve(&row.ticker, process_date) {
            Ok(id) => id,
            Err(e) => {
                warn!("⚠️ Skipping record #{} for {}: {}", index, row.ticker, e);
                batch.skipped += 1;
                continue;
            }
        };

        batch.universe.push(row.universe_line(&security_id));
        batch
            .by_ticker
            .entry(row.ticker.clone())
            .or_default()
            .push(row.ticker_line());
        batch.records += 1;
    }

    batch
}
