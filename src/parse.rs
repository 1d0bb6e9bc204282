use std::collections::HashSet;

use scraper::{Html, Selector};
use tokio::task::spawn_blocking;

use crate::{Error, Result};

/// Parses the page on a blocking thread and extracts the `.pdf` links.
/// See [`extract_pdf_links`].
pub async fn parse_html(html: String) -> Result<Vec<String>> {
    let links = spawn_blocking(move || extract_pdf_links(&html)).await??;
    Ok(links)
}

/// Returns the `href` of every `<a>` whose percent-decoded target ends in `.pdf`
/// (case-insensitive), in document order. The original, undecoded href is returned.
pub fn extract_pdf_links(html: &str) -> Result<Vec<String>> {
    let doc = Html::parse_document(html);
    let anchor_selector = create_selector("a[href]")?;

    let links = doc
        .select(&anchor_selector)
        .filter_map(|anchor| anchor.value().attr("href"))
        .filter(|href| is_pdf_link(href))
        .map(str::to_string)
        .collect();
    Ok(links)
}

fn is_pdf_link(href: &str) -> bool {
    let decoded = urlencoding::decode_binary(href.as_bytes());
    decoded.len() >= 4 && decoded[decoded.len() - 4..].eq_ignore_ascii_case(b".pdf")
}

/// Drops repeated links, keeping the first occurrence of each.
pub fn dedup_links(links: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    links
        .into_iter()
        .filter(|link| seen.insert(link.clone()))
        .collect()
}

#[inline]
fn create_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|_| Error::ParseSelector(sel_str.into()))
}
