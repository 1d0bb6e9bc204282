use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::cli::{ScrapeArgs, VerifyArgs};
use crate::{
    Error, Result, BASE_URL, CACHE_FILE_PATH, DOWNLOAD_CONCURRENCY, END_PAGE, LISTING_CONCURRENCY,
    LISTING_URL_TEMPLATE, OUTPUT_DIR, PAGE_PLACEHOLDER, REQUEST_DELAY_MS, REQUEST_TIMEOUT_SECS,
    START_PAGE, VERIFY_CONCURRENCY,
};

/// Where the listing HTML comes from and whether it is kept on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingSource {
    /// Fetch pages over HTTP, appending each body to the cache file if one is set.
    Fetch { cache: Option<PathBuf> },
    /// Parse a previously written cache file, no listing requests.
    Cache(PathBuf),
}

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub base_url: Url,
    pub listing_url_template: String,
    pub pages: RangeInclusive<usize>,
    pub output_dir: PathBuf,
    pub listing_source: ListingSource,
    pub download_concurrency: usize,
    pub listing_concurrency: usize,
    pub request_delay: Duration,
    pub request_timeout: Duration,
    pub require_pdf_content_type: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(BASE_URL).expect("BASE_URL is an absolute url"),
            listing_url_template: LISTING_URL_TEMPLATE.to_string(),
            pages: START_PAGE..=END_PAGE,
            output_dir: PathBuf::from(OUTPUT_DIR),
            listing_source: ListingSource::Fetch {
                cache: Some(PathBuf::from(CACHE_FILE_PATH)),
            },
            download_concurrency: DOWNLOAD_CONCURRENCY,
            listing_concurrency: LISTING_CONCURRENCY,
            request_delay: Duration::from_millis(REQUEST_DELAY_MS),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            require_pdf_content_type: true,
        }
    }
}

impl ScrapeConfig {
    pub fn from_args(args: ScrapeArgs) -> Result<Self> {
        let base_url = Url::parse(&args.base_url)?;

        let listing_source = if args.from_cache {
            ListingSource::Cache(args.cache)
        } else if args.no_cache {
            ListingSource::Fetch { cache: None }
        } else {
            ListingSource::Fetch {
                cache: Some(args.cache),
            }
        };

        let config = Self {
            base_url,
            listing_url_template: args.listing_url,
            pages: args.start_page..=args.end_page,
            output_dir: args.out,
            listing_source,
            download_concurrency: args.concurrency,
            listing_concurrency: args.listing_concurrency,
            request_delay: Duration::from_millis(args.delay_ms),
            request_timeout: Duration::from_secs(args.timeout_secs),
            require_pdf_content_type: !args.allow_any_content_type,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !matches!(self.base_url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "base url must be http/https: {}",
                self.base_url
            )));
        }
        if !self.listing_url_template.contains(PAGE_PLACEHOLDER) {
            return Err(Error::Config(format!(
                "listing url must contain {PAGE_PLACEHOLDER}: {}",
                self.listing_url_template
            )));
        }
        if self.pages.is_empty() {
            return Err(Error::Config(format!(
                "start page {} is after end page {}",
                self.pages.start(),
                self.pages.end()
            )));
        }
        if self.download_concurrency == 0 || self.listing_concurrency == 0 {
            return Err(Error::Config("concurrency must be at least 1".into()));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::Config("timeout must be at least 1 second".into()));
        }
        Ok(())
    }

    /// Fills the page number into the listing template.
    pub fn listing_url(&self, page_num: usize) -> String {
        self.listing_url_template
            .replace(PAGE_PLACEHOLDER, &page_num.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct VerifyConfig {
    pub dir: PathBuf,
    pub remove_invalid: bool,
    pub concurrency: usize,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(OUTPUT_DIR),
            remove_invalid: true,
            concurrency: VERIFY_CONCURRENCY,
        }
    }
}

impl VerifyConfig {
    pub fn from_args(args: VerifyArgs) -> Result<Self> {
        if args.concurrency == 0 {
            return Err(Error::Config("concurrency must be at least 1".into()));
        }
        Ok(Self {
            dir: args.dir,
            remove_invalid: !args.keep_invalid,
            concurrency: args.concurrency,
        })
    }
}
