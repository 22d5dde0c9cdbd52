//! Single-date download run: validate, fetch, normalize, persist.

use std::fmt;
use std::time::Instant;

use chrono::NaiveDate;
use tracing::{error, info, warn};

use crate::api::{ContractDataProvider, QuiverClient};
use crate::error::Result;
use crate::models::{Config, FileKind, DATE_FORMAT};
use crate::normalizer::{normalize, parse_records};
use crate::security_id::{MapFileResolver, SecurityIdResolver};
use crate::storage::CsvStore;
use crate::utils::{is_valid_process_date, today_utc};

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    /// Processing date is today, in the future, or the sentinel date
    InvalidDate,
    /// Records arrived but security identifiers cannot be resolved
    UniversePrerequisiteMissing,
    Failed(String),
}

/// Outcome of one run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub process_date: NaiveDate,
    pub status: RunStatus,
    pub records_received: usize,
    pub records_skipped: usize,
    pub universe_rows: usize,
    pub tickers_written: usize,
    pub tickers_failed: usize,
}

impl RunSummary {
    fn new(process_date: NaiveDate) -> Self {
        Self {
            process_date,
            status: RunStatus::Completed,
            records_received: 0,
            records_skipped: 0,
            universe_rows: 0,
            tickers_written: 0,
            tickers_failed: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed && self.tickers_failed == 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {:?}, {} records received, {} skipped, {} universe rows, {} tickers written, {} failed",
            self.process_date,
            self.status,
            self.records_received,
            self.records_skipped,
            self.universe_rows,
            self.tickers_written,
            self.tickers_failed
        )
    }
}

/// Downloads government contract awards for one date at a time and merges
/// them into the per-ticker and universe files.
pub struct GovernmentContractDownloader<P> {
    provider: P,
    store: CsvStore,
    resolver: Box<dyn SecurityIdResolver>,
}

impl GovernmentContractDownloader<QuiverClient> {
    /// Wire the Quiver client, CSV store and map file resolver from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = QuiverClient::new(config)?;
        let store = CsvStore::new(&config.output_directory, &config.processed_data_directory);
        let resolver = MapFileResolver::new(config.map_files_directory());

        Ok(Self::new(client, store, Box::new(resolver)))
    }
}

impl<P: ContractDataProvider> GovernmentContractDownloader<P> {
    pub fn new(provider: P, store: CsvStore, resolver: Box<dyn SecurityIdResolver>) -> Self {
        Self {
            provider,
            store,
            resolver,
        }
    }

    /// Vendor path for the contracts reported on `date`
    pub fn data_path(date: NaiveDate) -> String {
        format!("live/govcontractsall?date={}", date.format(DATE_FORMAT))
    }

    /// Run the download for `process_date`. Never fails; the outcome is in
    /// the returned summary.
    pub async fn run(&self, process_date: NaiveDate) -> RunSummary {
        let started = Instant::now();
        info!("🚀 Start downloading/processing government contracts for {}", process_date);

        let mut summary = RunSummary::new(process_date);

        if !is_valid_process_date(process_date, today_utc()) {
            warn!("Encountered data from invalid date: {} - Skipping", process_date);
            summary.status = RunStatus::InvalidDate;
            return summary;
        }

        if let Err(e) = self.download(process_date, &mut summary).await {
            error!("❌ Government contracts run for {} failed: {}", process_date, e);
            summary.status = RunStatus::Failed(e.to_string());
        }

        info!("🏁 Finished in {:?} - {}", started.elapsed(), summary);
        summary
    }

    async fn download(&self, process_date: NaiveDate, summary: &mut RunSummary) -> Result<()> {
        let body = self.provider.fetch(&Self::data_path(process_date)).await?;
        let records = parse_records(&body)?;
        summary.records_received = records.len();

        if records.is_empty() {
            info!("📭 Received no data for {}", process_date);
            return Ok(());
        }
        info!("📥 Received {} records for {}", records.len(), process_date);

        // Universe lines are never written without real identifiers
        if !self.resolver.is_available() {
            error!("❌ Security identifier data unavailable, cannot create universe files");
            summary.status = RunStatus::UniversePrerequisiteMissing;
            return Ok(());
        }

        let batch = normalize(records, process_date, self.resolver.as_ref());
        summary.records_skipped = batch.skipped;

        if !batch.universe.is_empty() {
            let name = process_date.format(DATE_FORMAT).to_string();
            summary.universe_rows = self.store.persist(FileKind::Universe, &name, &batch.universe)?;
        }

        for (ticker, lines) in &batch.by_ticker {
            match self.store.persist(FileKind::PerTicker, ticker, lines) {
                Ok(_) => summary.tickers_written += 1,
                Err(e) => {
                    error!("❌ Failed to write {}: {}", ticker, e);
                    summary.tickers_failed += 1;
                }
            }
        }

        Ok(())
    }
}
