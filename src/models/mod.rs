use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;
use serde::Deserialize;

/// Vendor directory name under the output roots
pub const VENDOR_NAME: &str = "quiver";

/// Dataset directory name under the vendor directory
pub const DATASET_NAME: &str = "governmentcontracts";

/// Date format used in file names, line prefixes and vendor queries
pub const DATE_FORMAT: &str = "%Y%m%d";

/// Government contract award as returned by the vendor.
///
/// Every field is optional on the wire so that one bad element does not
/// reject the whole response; required fields are checked during
/// normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct RawContractRecord {
    #[serde(rename = "Date")]
    pub date: Option<String>,
    #[serde(rename = "Ticker")]
    pub ticker: Option<String>,
    #[serde(rename = "Description")]
    pub description: Option<String>,
    #[serde(rename = "Agency")]
    pub agency: Option<String>,
    #[serde(rename = "Amount")]
    pub amount: Option<serde_json::Number>,
}

/// Contract award ready to be written out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRow {
    pub process_date: NaiveDate,
    /// Uppercased ticker
    pub ticker: String,
    /// Delimiter-safe description
    pub description: Option<String>,
    pub agency: String,
    /// Amount exactly as the vendor formatted it
    pub amount: String,
}

impl NormalizedRow {
    fn row_tail(&self) -> String {
        format!(
            "{},{},{}",
            self.description.as_deref().unwrap_or_default(),
            self.agency,
            self.amount
        )
    }

    /// `yyyyMMdd,description,agency,amount`
    pub fn ticker_line(&self) -> String {
        format!("{},{}", self.process_date.format(DATE_FORMAT), self.row_tail())
    }

    /// `securityId,ticker,description,agency,amount`
    pub fn universe_line(&self, security_id: &str) -> String {
        format!("{},{},{}", security_id, self.ticker, self.row_tail())
    }
}

/// Which kind of CSV file is being persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// One file per ticker, sorted by date prefix
    PerTicker,
    /// One file per processing date, sorted by security identifier
    Universe,
}

impl FileKind {
    /// Directory of this kind of file relative to the dataset directory
    pub fn subdirectory(self) -> Option<&'static str> {
        match self {
            FileKind::PerTicker => None,
            FileKind::Universe => Some("universe"),
        }
    }
}

/// Configuration for the application
#[derive(Debug, Clone)]
pub struct Config {
    pub vendor_auth_token: String,
    pub vendor_base_url: String,
    /// Root that output files are written under
    pub output_directory: PathBuf,
    /// Root that previously finalized files are read from for merging
    pub processed_data_directory: PathBuf,
    /// LEAN data folder holding `equity/usa/map_files`
    pub data_folder: PathBuf,
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Config {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.quiverquant.com/beta/";

    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        Ok(Config {
            vendor_auth_token: std::env::var("VENDOR_AUTH_TOKEN")
                .map_err(|_| anyhow::anyhow!("VENDOR_AUTH_TOKEN environment variable required"))?,
            vendor_base_url: std::env::var("VENDOR_BASE_URL")
                .unwrap_or_else(|_| Self::DEFAULT_BASE_URL.to_string()),
            output_directory: Path::new(
                &std::env::var("TEMP_OUTPUT_DIRECTORY")
                    .unwrap_or_else(|_| "/temp-output-directory".to_string()),
            )
            .join("alternative"),
            processed_data_directory: Path::new(
                &std::env::var("PROCESSED_DATA_DIRECTORY").unwrap_or_else(|_| "/Data".to_string()),
            )
            .join("alternative"),
            data_folder: std::env::var("DATA_FOLDER")
                .unwrap_or_else(|_| "/Data".to_string())
                .into(),
            rate_limit_requests: env_or("RATE_LIMIT_REQUESTS", 100),
            rate_limit_window_secs: env_or("RATE_LIMIT_WINDOW_SECS", 60),
            max_retries: env_or("MAX_RETRIES", 5),
            retry_delay_ms: env_or("RETRY_DELAY_MS", 1000),
        })
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Directory of map files consumed by the security identifier resolver
    pub fn map_files_directory(&self) -> PathBuf {
        self.data_folder.join("equity").join("usa").join("map_files")
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}
