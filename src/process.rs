use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Local;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

use crate::config::{ListingSource, ScrapeConfig};
use crate::download::{DownloadOutcome, Downloader};
use crate::limit::RateLimiter;
use crate::parse::{dedup_links, parse_html};
use crate::request::{build_client, read_cache, request_listing_pages, ListingCache};
use crate::{info_time, Result};

/// Counts for one scrape run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub links_found: usize,
    pub downloaded: usize,
    pub already_present: usize,
    pub failed: usize,
}

pub async fn process_site(config: &ScrapeConfig) -> Result<RunSummary> {
    let start_time = Local::now();
    let client = build_client(config.request_timeout)?;
    let limiter = Arc::new(RateLimiter::new(config.request_delay));

    info_time!("Started scraping");

    let links = collect_links(config, client.clone(), limiter.clone()).await?;
    info_time!(start_time, "Collected {} unique pdf links", links.len());

    let downloader = Downloader::new(
        client,
        limiter,
        config.output_dir.clone(),
        config.require_pdf_content_type,
    );
    let summary =
        download_all(&config.base_url, links, downloader, config.download_concurrency).await?;

    info_time!(
        start_time,
        "Finished: {} downloaded, {} already present, {} failed",
        summary.downloaded,
        summary.already_present,
        summary.failed
    );
    Ok(summary)
}

/// Gathers the listing HTML (over HTTP or from the cache file) and returns the deduplicated
/// `.pdf` links in first-seen order.
async fn collect_links(
    config: &ScrapeConfig,
    client: reqwest::Client,
    limiter: Arc<RateLimiter>,
) -> Result<Vec<String>> {
    let links = match &config.listing_source {
        ListingSource::Cache(path) => parse_html(read_cache(path).await?).await?,
        ListingSource::Fetch { cache } => {
            let cache = match cache {
                Some(path) => Some(ListingCache::open(path).await?),
                None => None,
            };
            collect_listing_links(config, client, limiter, cache).await?
        }
    };
    Ok(dedup_links(links))
}

/// Fetches the listing pages and parses them in page order as they arrive. Each page is
/// appended to the cache as soon as every page before it is done, so an interrupted run keeps
/// what it fetched.
async fn collect_listing_links(
    config: &ScrapeConfig,
    client: reqwest::Client,
    limiter: Arc<RateLimiter>,
    mut cache: Option<ListingCache>,
) -> Result<Vec<String>> {
    let mut task_set = request_listing_pages(config, client, limiter);
    let mut in_order = InOrder::new(*config.pages.start());
    let mut links = Vec::new();
    let mut fetched = 0;

    while let Some(task) = task_set.join_next().await {
        let (page_num, res) = task?;
        let html = match res {
            Ok(html) => Some(html),
            Err(err) => {
                tracing::warn!(page_num, %err, "couldn't fetch listing page");
                None
            }
        };

        for html in in_order.push(page_num, html).into_iter().flatten() {
            fetched += 1;
            if let Some(cache) = cache.as_mut() {
                cache.append(&html).await?;
            }
            let page_links = parse_html(html).await?;
            if page_links.is_empty() {
                tracing::debug!("listing page without pdf links");
            }
            links.extend(page_links);
        }
    }

    info_time!("Fetched {} listing pages", fetched);
    if let Some(cache) = &cache {
        info_time!(
            "Appended {} pages to cache: {}",
            cache.pages(),
            cache.path().display()
        );
    }
    Ok(links)
}

/// Reorders items that complete out of order. Items come back out only once every index
/// before them has been pushed.
#[derive(Debug)]
struct InOrder<T> {
    next: usize,
    pending: BTreeMap<usize, T>,
}

impl<T> InOrder<T> {
    fn new(first: usize) -> Self {
        Self {
            next: first,
            pending: BTreeMap::new(),
        }
    }

    fn push(&mut self, index: usize, item: T) -> Vec<T> {
        self.pending.insert(index, item);
        let mut ready = Vec::new();
        while let Some(item) = self.pending.remove(&self.next) {
            ready.push(item);
            self.next += 1;
        }
        ready
    }
}

/// Downloads every link with at most `concurrency` transfers in flight and waits for all of them.
/// Per-link failures are logged and counted, never propagated.
pub async fn download_all(
    base_url: &Url,
    links: Vec<String>,
    downloader: Downloader,
    concurrency: usize,
) -> Result<RunSummary> {
    let mut summary = RunSummary {
        links_found: links.len(),
        ..RunSummary::default()
    };
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut task_set = JoinSet::new();

    for link in links {
        let url = match base_url.join(&link) {
            Ok(url) => url,
            Err(err) => {
                tracing::warn!(link = %link, %err, "invalid url, skipping");
                summary.failed += 1;
                continue;
            }
        };

        task_set.spawn({
            let downloader = downloader.clone();
            let permits = permits.clone();
            async move {
                let _permit = permits.acquire_owned().await;
                let res = downloader.download_pdf(url.as_str()).await;
                (url, res)
            }
        });
    }

    while let Some(task) = task_set.join_next().await {
        let (url, res) = task?;
        match res {
            Ok(DownloadOutcome::Downloaded(_)) => summary.downloaded += 1,
            Ok(DownloadOutcome::AlreadyExists(path)) => {
                tracing::info!(path = %path.display(), "file already exists, skipping");
                summary.already_present += 1;
            }
            Err(err) => {
                tracing::warn!(%url, %err, "download failed");
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}
