//! Flat-file persistence for government contract lines.
//!
//! Every write merges the new lines with the previously finalized file,
//! drops duplicates and re-sorts, so repeated runs converge on the same
//! content whatever order they happen in.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::debug;

use crate::error::{DownloadError, Result};
use crate::models::{FileKind, DATASET_NAME, DATE_FORMAT, VENDOR_NAME};

/// Merge-and-sort CSV store with separate write and merge-read roots
#[derive(Debug, Clone)]
pub struct CsvStore {
    output_root: PathBuf,
    processed_root: PathBuf,
}

impl CsvStore {
    /// `output_root` receives the written files; `processed_root` holds the
    /// previously finalized files that new lines are merged into.
    pub fn new(output_root: impl Into<PathBuf>, processed_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            processed_root: processed_root.into(),
        }
    }

    fn relative_path(kind: FileKind, name: &str) -> PathBuf {
        let mut path = PathBuf::from(VENDOR_NAME).join(DATASET_NAME);
        if let Some(subdirectory) = kind.subdirectory() {
            path.push(subdirectory);
        }
        path.join(format!("{}.csv", name.to_lowercase()))
    }

    /// Where `persist` writes the file
    pub fn output_path(&self, kind: FileKind, name: &str) -> PathBuf {
        self.output_root.join(Self::relative_path(kind, name))
    }

    /// Where `persist` looks for lines to merge with
    pub fn processed_path(&self, kind: FileKind, name: &str) -> PathBuf {
        self.processed_root.join(Self::relative_path(kind, name))
    }

    /// Merge `lines` into the file `name` of the given kind and rewrite it
    /// sorted. Returns the number of lines in the written file.
    pub fn persist(&self, kind: FileKind, name: &str, lines: &[String]) -> Result<usize> {
        let existing_path = self.processed_path(kind, name);
        let final_path = self.output_path(kind, name);

        let existing = read_existing_lines(&existing_path)?;
        if kind == FileKind::PerTicker {
            if let Some(line) = existing.iter().find(|line| date_key(line).is_none()) {
                return Err(DownloadError::MalformedLine {
                    path: existing_path,
                    line: line.clone(),
                });
            }
            if let Some(line) = lines.iter().find(|line| date_key(line).is_none()) {
                return Err(DownloadError::InvalidLine {
                    name: name.to_string(),
                    line: line.clone(),
                });
            }
        }

        let mut unique: BTreeSet<String> = existing.into_iter().collect();
        unique.extend(lines.iter().cloned());

        let sorted = sort_lines(kind, unique);
        write_lines(&final_path, &sorted)?;

        debug!("💾 Wrote {} lines to {}", sorted.len(), final_path.display());
        Ok(sorted.len())
    }
}

fn read_existing_lines(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path).map_err(|e| DownloadError::io(path, e))?;
    Ok(content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect())
}

fn sort_key(line: &str) -> &str {
    line.split(',').next().unwrap_or_default()
}

fn date_key(line: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(sort_key(line), DATE_FORMAT).ok()
}

/// Sort already-deduplicated lines by the key of `kind`.
/// `unique` iterates in line order, so the stable sort breaks ties by the full line.
fn sort_lines(kind: FileKind, unique: BTreeSet<String>) -> Vec<String> {
    let mut lines: Vec<String> = unique.into_iter().collect();
    match kind {
        FileKind::Universe => lines.sort_by(|a, b| sort_key(a).cmp(sort_key(b))),
        FileKind::PerTicker => lines.sort_by_cached_key(|line| date_key(line)),
    }
    lines
}

/// Replace `path` with `lines`, going through a sibling temp file
fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| DownloadError::io(parent, e))?;
    }

    let mut content = lines.join("\n");
    content.push('\n');

    let temp_path = path.with_extension("csv.tmp");
    fs::write(&temp_path, content).map_err(|e| DownloadError::io(&temp_path, e))?;
    fs::rename(&temp_path, path).map_err(|e| DownloadError::io(path, e))?;
    Ok(())
}
