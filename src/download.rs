use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use url::Url;

use crate::limit::RateLimiter;
use crate::sanitize::local_file_name;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// A new file was written.
    Downloaded(PathBuf),
    /// A file with the derived name was already there. No request was made.
    AlreadyExists(PathBuf),
}

/// Everything a download needs besides the URL. Cheap to clone into tasks.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    limiter: Arc<RateLimiter>,
    output_dir: PathBuf,
    require_pdf_content_type: bool,
}

impl Downloader {
    pub fn new(
        client: Client,
        limiter: Arc<RateLimiter>,
        output_dir: impl Into<PathBuf>,
        require_pdf_content_type: bool,
    ) -> Self {
        Self {
            client,
            limiter,
            output_dir: output_dir.into(),
            require_pdf_content_type,
        }
    }

    /// Downloads `raw_url` into the output directory unless a file of the derived name exists.
    ///
    /// The body is buffered completely and written to a `.part` sibling before being renamed
    /// into place, so failures never leave a file at the final path.
    pub async fn download_pdf(&self, raw_url: &str) -> Result<DownloadOutcome> {
        let url = validate_url(raw_url)?;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let file_path = self.output_dir.join(local_file_name(&url));

        if tokio::fs::try_exists(&file_path).await? {
            return Ok(DownloadOutcome::AlreadyExists(file_path));
        }

        self.limiter.acquire().await;
        tracing::debug!(%url, "downloading");
        let res = self.client.get(url.clone()).send().await?;

        let status = res.status();
        if status != StatusCode::OK {
            return Err(Error::UnexpectedStatus {
                url: url.into(),
                status,
            });
        }

        if self.require_pdf_content_type {
            let content_type = res
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            if !content_type.as_deref().is_some_and(is_pdf_content_type) {
                return Err(Error::UnexpectedContentType {
                    url: url.into(),
                    content_type,
                });
            }
        }

        let body = res.bytes().await?;

        let part_path = part_path(&file_path);
        if let Err(err) = write_then_rename(&part_path, &file_path, &body).await {
            let _ = tokio::fs::remove_file(&part_path).await;
            return Err(err);
        }

        tracing::info!(%url, path = %file_path.display(), bytes = body.len(), "downloaded");
        Ok(DownloadOutcome::Downloaded(file_path))
    }
}

/// Accepts only absolute `http`/`https` URLs with a host.
pub fn validate_url(raw_url: &str) -> Result<Url> {
    let url = Url::parse(raw_url).map_err(|err| Error::InvalidUrl(format!("{raw_url}: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") || !url.has_host() {
        return Err(Error::InvalidUrl(raw_url.to_string()));
    }
    Ok(url)
}

/// Compares the media type only, ignoring parameters such as `charset`.
fn is_pdf_content_type(value: &str) -> bool {
    value
        .split(';')
        .next()
        .is_some_and(|media_type| media_type.trim().eq_ignore_ascii_case("application/pdf"))
}

fn part_path(file_path: &Path) -> PathBuf {
    let mut name = file_path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    file_path.with_file_name(name)
}

async fn write_then_rename(part_path: &Path, file_path: &Path, body: &[u8]) -> Result<()> {
    tokio::fs::write(part_path, body).await?;
    tokio::fs::rename(part_path, file_path).await?;
    Ok(())
}
