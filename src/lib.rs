//! SDS SCRAPER
//! Walks the paginated safety-data-sheet listing, collects every `.pdf` link
//! and downloads the documents into a flat output directory.

mod error;
mod macros;

pub mod cli;
pub mod config;
pub mod download;
pub mod limit;
pub mod logging;
pub mod parse;
pub mod process;
pub mod request;
pub mod sanitize;
pub mod verify;

pub use error::{Error, Result};

/// Site root that relative listing links are resolved against.
pub const BASE_URL: &str = "https://www.avient.com";
/// `{page}` is replaced with the page number.
pub const LISTING_URL_TEMPLATE: &str =
    "https://www.avient.com/resources/safety-data-sheets?page={page}";
pub const PAGE_PLACEHOLDER: &str = "{page}";
pub const START_PAGE: usize = 0;
pub const END_PAGE: usize = 1000;

pub const OUTPUT_DIR: &str = "PDFs";
pub const CACHE_FILE_PATH: &str = "avient.com.html";
pub const FALLBACK_FILE_NAME: &str = "downloaded_file";

pub const REQUEST_TIMEOUT_SECS: u64 = 600;
pub const DOWNLOAD_CONCURRENCY: usize = 8;
pub const LISTING_CONCURRENCY: usize = 4;
pub const VERIFY_CONCURRENCY: usize = 16;
/// Minimum gap between two request starts. 0 disables the limiter.
pub const REQUEST_DELAY_MS: u64 = 250;
