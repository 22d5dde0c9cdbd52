//! Typed records read back from persisted per-ticker and universe files.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::error::{DownloadError, Result};
use crate::models::DATE_FORMAT;

/// Why a persisted line could not be read back
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseLineError {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },
    #[error("invalid date {0:?}")]
    InvalidDate(String),
    #[error("invalid amount {0:?}")]
    InvalidAmount(String),
    #[error("empty {0} field")]
    EmptyField(&'static str),
}

/// Contract award from a per-ticker file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GovernmentContract {
    pub date: NaiveDate,
    pub description: Option<String>,
    pub agency: String,
    pub amount: Decimal,
}

/// Contract award from a universe file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GovernmentContractUniverse {
    pub security_id: String,
    pub symbol: String,
    pub description: Option<String>,
    pub agency: String,
    pub amount: Decimal,
}

fn split_fields<const N: usize>(line: &str) -> std::result::Result<[&str; N], ParseLineError> {
    let fields: Vec<&str> = line.trim_end().split(',').collect();
    let found = fields.len();
    fields
        .try_into()
        .map_err(|_| ParseLineError::FieldCount { expected: N, found })
}

fn optional(field: &str) -> Option<String> {
    (!field.is_empty()).then(|| field.to_string())
}

fn required(field: &str, name: &'static str) -> std::result::Result<String, ParseLineError> {
    optional(field).ok_or(ParseLineError::EmptyField(name))
}

/// Amounts keep the scale they were written with
fn parse_amount(field: &str) -> std::result::Result<Decimal, ParseLineError> {
    Decimal::from_str(field)
        .or_else(|_| Decimal::from_scientific(field))
        .map_err(|_| ParseLineError::InvalidAmount(field.to_string()))
}

impl FromStr for GovernmentContract {
    type Err = ParseLineError;

    /// Parse `yyyyMMdd,description,agency,amount`
    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let [date, description, agency, amount] = split_fields::<4>(line)?;

        Ok(Self {
            date: NaiveDate::parse_from_str(date, DATE_FORMAT)
                .map_err(|_| ParseLineError::InvalidDate(date.to_string()))?,
            description: optional(description),
            agency: required(agency, "agency")?,
            amount: parse_amount(amount)?,
        })
    }
}

impl FromStr for GovernmentContractUniverse {
    type Err = ParseLineError;

    /// Parse `securityId,ticker,description,agency,amount`
    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let [security_id, symbol, description, agency, amount] = split_fields::<5>(line)?;

        Ok(Self {
            security_id: required(security_id, "security id")?,
            symbol: required(symbol, "symbol")?,
            description: optional(description),
            agency: required(agency, "agency")?,
            amount: parse_amount(amount)?,
        })
    }
}

/// Read every non-blank line of a persisted file as `T`
pub fn read_records<T>(path: &Path) -> Result<Vec<T>>
where
    T: FromStr<Err = ParseLineError>,
{
    let content = fs::read_to_string(path).map_err(|e| DownloadError::io(path, e))?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            line.parse().map_err(|_| DownloadError::MalformedLine {
                path: path.to_path_buf(),
                line: line.to_string(),
            })
        })
        .collect()
}
