//! Security identifier resolution
//!
//! Resolves a ticker on a given date to a stable identifier that survives
//! renames. The identifier follows the LEAN equity format: the ticker the
//! security first listed under, followed by a base-36 encoding of its first
//! listing date, market and security type.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::NaiveDate;
use tracing::{debug, error, warn};

use crate::error::{DownloadError, Result};
use crate::models::DATE_FORMAT;

const SECURITY_TYPE_EQUITY: u64 = 1;
const MARKET_USA: u64 = 1;
const MARKET_OFFSET: u64 = 100;
const DAYS_OFFSET: u64 = 100_000_000_000_000;

/// Maps `(ticker, date)` to a security identifier
#[cfg_attr(test, mockall::automock)]
pub trait SecurityIdResolver: Send + Sync {
    /// Whether the data backing the resolver is present
    fn is_available(&self) -> bool;

    fn resolve(&self, ticker: &str, as_of: NaiveDate) -> Result<String>;
}

#[derive(Debug, Clone)]
struct MapFileRow {
    date: NaiveDate,
    ticker: String,
}

/// Ticker history of one security
#[derive(Debug, Clone)]
struct MapFile {
    permtick: String,
    /// Ascending by date; each row holds the ticker in effect up to its date
    rows: Vec<MapFileRow>,
}

impl MapFile {
    fn ticker_on(&self, date: NaiveDate) -> Option<&str> {
        self.rows
            .iter()
            .find(|row| row.date >= date)
            .map(|row| row.ticker.as_str())
    }
}

/// Resolver backed by a directory of LEAN map files.
///
/// The newest `map_files_yyyyMMdd.zip` archive in the directory is used when
/// there is one; otherwise the loose `{ticker}.csv` files are read.
pub struct MapFileResolver {
    directory: PathBuf,
    map_files: OnceLock<Vec<MapFile>>,
}

impl MapFileResolver {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            map_files: OnceLock::new(),
        }
    }

    /// First listing date assumed when no map file knows the ticker
    pub fn default_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(1998, 1, 2).unwrap_or(NaiveDate::MIN)
    }

    fn map_files(&self) -> Result<&[MapFile]> {
        if let Some(files) = self.map_files.get() {
            return Ok(files);
        }
        let loaded = load_map_files(&self.directory)?;
        debug!("Loaded {} map files from {}", loaded.len(), self.directory.display());
        Ok(self.map_files.get_or_init(|| loaded))
    }
}

impl SecurityIdResolver for MapFileResolver {
    fn is_available(&self) -> bool {
        match self.map_files() {
            Ok(files) if !files.is_empty() => true,
            Ok(_) => {
                warn!("No map files found in {}", self.directory.display());
                false
            }
            Err(e) => {
                error!("❌ Failed to load map files: {}", e);
                false
            }
        }
    }

    fn resolve(&self, ticker: &str, as_of: NaiveDate) -> Result<String> {
        let files = self.map_files()?;
        let permtick = ticker.to_lowercase();

        let map_file = files
            .iter()
            .find(|file| {
                file.ticker_on(as_of)
                    .is_some_and(|t| t.eq_ignore_ascii_case(ticker))
            })
            .or_else(|| files.iter().find(|file| file.permtick == permtick));

        let (symbol, first_date) = match map_file.and_then(|file| file.rows.first()) {
            Some(first) => (first.ticker.to_uppercase(), first.date),
            None => (ticker.to_uppercase(), Self::default_date()),
        };

        let properties = equity_properties(first_date).ok_or_else(|| DownloadError::SecurityId {
            ticker: ticker.to_string(),
            reason: format!("first date {} cannot be encoded", first_date),
        })?;

        Ok(format!("{} {}", symbol, encode_base36(properties)))
    }
}

fn load_map_files(directory: &Path) -> Result<Vec<MapFile>> {
    let entries = std::fs::read_dir(directory).map_err(|e| DownloadError::io(directory, e))?;

    let mut archives = Vec::new();
    let mut loose = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| DownloadError::io(directory, e))?.path();
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if name.starts_with("map_files_") && name.ends_with(".zip") {
            archives.push(path);
        } else if name.ends_with(".csv") {
            loose.push(path);
        }
    }

    // Archive names carry their date, so the greatest name is the newest
    let mut files = match archives.into_iter().max() {
        Some(archive) => {
            debug!("Reading map files from {}", archive.display());
            read_archive(&archive)?
        }
        None => read_loose_files(&loose),
    };

    // Deterministic pick when a ticker appears in more than one history
    files.sort_by(|a, b| a.permtick.cmp(&b.permtick));
    Ok(files)
}

fn read_archive(path: &Path) -> Result<Vec<MapFile>> {
    let archive_error = |source: zip::result::ZipError| DownloadError::Archive {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(|e| DownloadError::io(path, e))?;
    let mut archive = zip::ZipArchive::new(file).map_err(archive_error)?;

    let mut files = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(archive_error)?;
        let Some(permtick) = permtick_of(Path::new(entry.name())) else {
            continue;
        };

        let mut content = Vec::new();
        entry
            .read_to_end(&mut content)
            .map_err(|e| DownloadError::io(path, e))?;

        match parse_map_rows(content.as_slice()) {
            Ok(rows) if !rows.is_empty() => files.push(MapFile { permtick, rows }),
            Ok(_) => debug!("Skipping empty map file {} in {}", entry.name(), path.display()),
            Err(e) => warn!("Skipping unreadable map file {} in {}: {}", entry.name(), path.display(), e),
        }
    }
    Ok(files)
}

fn read_loose_files(paths: &[PathBuf]) -> Vec<MapFile> {
    let mut files = Vec::new();
    for path in paths {
        let Some(permtick) = permtick_of(path) else {
            continue;
        };

        let rows = File::open(path)
            .map_err(csv::Error::from)
            .and_then(parse_map_rows);
        match rows {
            Ok(rows) if !rows.is_empty() => files.push(MapFile { permtick, rows }),
            Ok(_) => debug!("Skipping empty map file {}", path.display()),
            Err(e) => warn!("Skipping unreadable map file {}: {}", path.display(), e),
        }
    }
    files
}

/// Lowercased ticker a `{ticker}.csv` map file is named after
fn permtick_of(path: &Path) -> Option<String> {
    if path.extension().and_then(|ext| ext.to_str()) != Some("csv") {
        return None;
    }
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_lowercase)
}

fn parse_map_rows<R: Read>(source: R) -> csv::Result<Vec<MapFileRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(source);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let (Some(date), Some(ticker)) = (record.get(0), record.get(1)) else {
            continue;
        };
        if let Ok(date) = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT) {
            rows.push(MapFileRow {
                date,
                ticker: ticker.trim().to_string(),
            });
        }
    }
    rows.sort_by_key(|row| row.date);
    Ok(rows)
}

fn equity_properties(first_date: NaiveDate) -> Option<u64> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let days = u64::try_from((first_date - epoch).num_days()).ok()?;
    days.checked_mul(DAYS_OFFSET)?
        .checked_add(MARKET_USA * MARKET_OFFSET + SECURITY_TYPE_EQUITY)
}

fn encode_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if value == 0 {
        return "0".to_string();
    }
    let mut encoded = Vec::new();
    while value > 0 {
        encoded.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    encoded.reverse();
    String::from_utf8_lossy(&encoded).into_owned()
}
