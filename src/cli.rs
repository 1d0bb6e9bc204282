use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{
    BASE_URL, CACHE_FILE_PATH, DOWNLOAD_CONCURRENCY, END_PAGE, LISTING_CONCURRENCY,
    LISTING_URL_TEMPLATE, OUTPUT_DIR, REQUEST_DELAY_MS, REQUEST_TIMEOUT_SECS, START_PAGE,
    VERIFY_CONCURRENCY,
};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Walk the listing pages and download every linked PDF.
    Scrape(ScrapeArgs),
    /// Check downloaded PDFs and remove the broken ones.
    Verify(VerifyArgs),
}

#[derive(Debug, Args)]
pub struct ScrapeArgs {
    /// Site root that relative links are resolved against.
    #[arg(long, default_value = BASE_URL)]
    pub base_url: String,

    /// Listing page URL; `{page}` is replaced with the page number.
    #[arg(long, default_value = LISTING_URL_TEMPLATE)]
    pub listing_url: String,

    /// First listing page (inclusive).
    #[arg(long, default_value_t = START_PAGE)]
    pub start_page: usize,

    /// Last listing page (inclusive).
    #[arg(long, default_value_t = END_PAGE)]
    pub end_page: usize,

    /// Output directory for downloaded PDFs.
    #[arg(long, default_value = OUTPUT_DIR)]
    pub out: PathBuf,

    /// File the raw listing HTML is appended to.
    #[arg(long, default_value = CACHE_FILE_PATH)]
    pub cache: PathBuf,

    /// Don't write fetched listing pages to the cache file.
    #[arg(long, conflicts_with = "from_cache")]
    pub no_cache: bool,

    /// Parse the cache file instead of fetching listing pages.
    #[arg(long)]
    pub from_cache: bool,

    /// Maximum concurrent PDF downloads.
    #[arg(long, default_value_t = DOWNLOAD_CONCURRENCY)]
    pub concurrency: usize,

    /// Maximum concurrent listing page requests.
    #[arg(long, default_value_t = LISTING_CONCURRENCY)]
    pub listing_concurrency: usize,

    /// Minimum delay between request starts (politeness). 0 disables it.
    #[arg(long, default_value_t = REQUEST_DELAY_MS)]
    pub delay_ms: u64,

    /// Per-request HTTP timeout.
    #[arg(long, default_value_t = REQUEST_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Save responses regardless of their `Content-Type`.
    #[arg(long)]
    pub allow_any_content_type: bool,
}

#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// Directory searched recursively for PDFs.
    #[arg(long, default_value = OUTPUT_DIR)]
    pub dir: PathBuf,

    /// Report broken files without deleting them.
    #[arg(long)]
    pub keep_invalid: bool,

    /// Maximum files checked at once.
    #[arg(long, default_value_t = VERIFY_CONCURRENCY)]
    pub concurrency: usize,
}
