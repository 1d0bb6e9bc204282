use std::process::ExitCode;

use chrono::Local;
use clap::Parser as _;
use sds_scrap::cli::{Cli, Command};
use sds_scrap::config::{ScrapeConfig, VerifyConfig};
use sds_scrap::{info_time, logging, process::process_site, verify::verify_dir, Result};

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> Result<()> {
    logging::init()?;
    let start_time = Local::now();

    let cli = Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        Command::Scrape(args) => {
            let config = ScrapeConfig::from_args(args)?;
            process_site(&config).await?;
        }
        Command::Verify(args) => {
            let config = VerifyConfig::from_args(args)?;
            verify_dir(&config).await?;
        }
    }
    info_time!(start_time, "Full program time:");

    Ok(())
}
