use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use govcontracts_downloader::models::Config;
use govcontracts_downloader::utils::{parse_compact_date, resolve_process_date, DEPLOYMENT_DATE_VAR};
use govcontracts_downloader::GovernmentContractDownloader;

/// Download Quiver government contract awards for one date and merge them
/// into the per-ticker and universe CSV files.
#[derive(Parser, Debug)]
#[command(name = "govcontracts-downloader", version)]
struct Cli {
    /// Processing date (yyyyMMdd); defaults to the deployment date or yesterday (UTC)
    #[arg(long, value_parser = parse_date_arg)]
    date: Option<NaiveDate>,

    /// Override the output root (files land under <dir>/quiver/governmentcontracts)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Override the root previously processed files are merged from
    #[arg(long)]
    processed_dir: Option<PathBuf>,
}

fn parse_date_arg(value: &str) -> Result<NaiveDate, String> {
    parse_compact_date(value).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("govcontracts_downloader=info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => std::process::exit(0),
        Ok(false) => {
            error!("❌ Failed to download/process quiver governmentcontracts data");
            std::process::exit(1);
        }
        Err(e) => {
            error!("❌ The downloader for quiver governmentcontracts data failed to start: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<bool> {
    let mut config = Config::from_env()?;
    if let Some(dir) = cli.output_dir {
        config.output_directory = dir;
    }
    if let Some(dir) = cli.processed_dir {
        config.processed_data_directory = dir;
    }

    let deployment_date = std::env::var(DEPLOYMENT_DATE_VAR).ok();
    let process_date = resolve_process_date(cli.date, deployment_date.as_deref())?;
    info!("📋 Processing {} into {}", process_date, config.output_directory.display());

    let downloader = GovernmentContractDownloader::from_config(&config)?;
    let summary = downloader.run(process_date).await;
    Ok(summary.is_success())
}
