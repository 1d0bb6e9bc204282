use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::ScrapeConfig;
use crate::limit::RateLimiter;
use crate::{info_time, Error, Result};

/// Builds the client shared by every request of a run. It carries the per-request timeout.
pub fn build_client(timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Spawns a request for every listing page in the configured range, at most
/// `listing_concurrency` in flight. Each task yields its page number with the result.
pub fn request_listing_pages(
    config: &ScrapeConfig,
    client: Client,
    limiter: Arc<RateLimiter>,
) -> JoinSet<(usize, Result<String>)> {
    info_time!(
        "Requesting listing pages {}..={}",
        config.pages.start(),
        config.pages.end()
    );

    let permits = Arc::new(Semaphore::new(config.listing_concurrency));
    let mut task_set = JoinSet::new();

    for page_num in config.pages.clone() {
        let url = config.listing_url(page_num);
        task_set.spawn({
            // Client uses Arc so we can clone cheaply
            let client = client.clone();
            let limiter = limiter.clone();
            let permits = permits.clone();

            async move {
                let _permit = permits.acquire_owned().await;
                limiter.acquire().await;
                (page_num, request_page_html(&client, &url).await)
            }
        });
    }
    task_set
}

/// Requests a page and returns a `Result<String>` containing the HTML.
pub async fn request_page_html(client: &Client, url: &str) -> Result<String> {
    tracing::debug!(url, "requesting page");
    let res = client.get(url).send().await?;
    let status = res.status();
    if !status.is_success() {
        return Err(Error::UnexpectedStatus {
            url: url.to_string(),
            status,
        });
    }
    let html = res.text().await?;
    Ok(html)
}

/// Flat file the raw listing HTML accumulates in, one page per append.
#[derive(Debug)]
pub struct ListingCache {
    file: File,
    path: PathBuf,
    pages: usize,
}

impl ListingCache {
    /// Opens `path` for appending, creating it if needed.
    pub async fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            pages: 0,
        })
    }

    /// Appends the page body followed by a newline and flushes it to disk.
    pub async fn append(&mut self, html: &str) -> Result<()> {
        self.file.write_all(html.as_bytes()).await?;
        self.file.write_all(b"\n").await?;
        self.file.flush().await?;
        self.pages += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pages(&self) -> usize {
        self.pages
    }
}

/// Reads a listing cache file written by [`ListingCache`].
pub async fn read_cache(path: &Path) -> Result<String> {
    let html = tokio::fs::read_to_string(path).await?;
    info_time!("Read {} bytes of cached listing HTML", html.len());
    Ok(html)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cache_appends_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("listing.html");

        let mut cache = ListingCache::open(&path).await.unwrap();
        cache.append("<p>zero</p>").await.unwrap();
        // Each page is on disk as soon as it is appended.
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<p>zero</p>\n");
        cache.append("<p>one</p>").await.unwrap();
        assert_eq!(cache.pages(), 2);
        drop(cache);

        let mut cache = ListingCache::open(&path).await.unwrap();
        cache.append("<p>two</p>").await.unwrap();

        let html = read_cache(&path).await.unwrap();
        assert_eq!(html, "<p>zero</p>\n<p>one</p>\n<p>two</p>\n");
    }

    #[tokio::test]
    async fn missing_cache_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_cache(&dir.path().join("nope.html")).await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
