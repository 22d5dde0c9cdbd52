pub mod api;
pub mod downloader;
pub mod error;
pub mod models;
pub mod normalizer;
pub mod records;
pub mod security_id;
pub mod storage;
pub mod utils;

pub use downloader::{GovernmentContractDownloader, RunStatus, RunSummary};
pub use error::DownloadError;
