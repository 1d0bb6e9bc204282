use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::Local;
use lopdf::Document;
use tokio::sync::Semaphore;
use tokio::task::{spawn_blocking, JoinSet};
use walkdir::WalkDir;

use crate::config::VerifyConfig;
use crate::{info_time, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfCheck {
    Valid,
    /// The parser rejected the file.
    Corrupt(String),
    NoPages,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    pub checked: usize,
    pub invalid: Vec<(PathBuf, PdfCheck)>,
    pub removed: usize,
    /// Files that couldn't be read. They are neither checked nor removed.
    pub unreadable: Vec<PathBuf>,
    /// Valid files whose name has an uppercase letter, which the downloader never produces.
    pub uppercase_names: Vec<PathBuf>,
}

/// Checks every PDF under `config.dir`, removing broken ones if `config.remove_invalid`.
pub async fn verify_dir(config: &VerifyConfig) -> Result<VerifyReport> {
    let start_time = Local::now();
    let files = find_pdf_files(&config.dir).await?;
    if files.is_empty() {
        info_time!("No PDF files found in {}", config.dir.display());
        return Ok(VerifyReport::default());
    }

    let permits = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let mut task_set = JoinSet::new();
    for path in files.iter().cloned() {
        let permits = permits.clone();
        task_set.spawn(async move {
            let _permit = permits.acquire_owned().await;
            let res = match tokio::fs::read(&path).await {
                Ok(bytes) => Ok(check_pdf_blocking(bytes).await),
                Err(err) => Err(err),
            };
            (path, res)
        });
    }

    let mut results = Vec::with_capacity(files.len());
    while let Some(task) = task_set.join_next().await {
        let (path, res) = task?;
        match res {
            Ok(check) => results.push((path, Some(check))),
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "couldn't read file");
                results.push((path, None));
            }
        }
    }

    let mut report = summarize(&files, results);
    for (path, check) in &report.invalid {
        tracing::warn!(path = %path.display(), ?check, "invalid pdf");
        if config.remove_invalid {
            tokio::fs::remove_file(path).await?;
            report.removed += 1;
        }
    }
    for path in &report.uppercase_names {
        tracing::info!(path = %path.display(), "uppercase file name");
    }

    info_time!(
        start_time,
        "Verified {} files: {} invalid, {} removed, {} unreadable",
        report.checked,
        report.invalid.len(),
        report.removed,
        report.unreadable.len()
    );
    Ok(report)
}

/// Builds the report in the newest-first order of `files`. A `None` check means the file
/// couldn't be read.
fn summarize(files: &[PathBuf], results: Vec<(PathBuf, Option<PdfCheck>)>) -> VerifyReport {
    let order: HashMap<&PathBuf, usize> = files.iter().enumerate().map(|(i, p)| (p, i)).collect();
    let mut results = results;
    results.sort_by_key(|(path, _)| order.get(path).copied().unwrap_or(usize::MAX));

    let mut report = VerifyReport::default();
    let mut valid = HashSet::new();
    for (path, check) in results {
        match check {
            None => report.unreadable.push(path),
            Some(PdfCheck::Valid) => {
                report.checked += 1;
                valid.insert(path);
            }
            Some(check) => {
                report.checked += 1;
                report.invalid.push((path, check));
            }
        }
    }

    report.uppercase_names = files
        .iter()
        .filter(|path| valid.contains(*path) && has_uppercase_name(path))
        .cloned()
        .collect();
    report
}

/// Recursively collects files ending in `.pdf` (case-insensitive), newest first.
pub async fn find_pdf_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let dir = dir.to_path_buf();
    let files = spawn_blocking(move || -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        for entry in WalkDir::new(&dir) {
            let entry = entry?;
            if !entry.file_type().is_file() || !is_pdf_name(entry.path()) {
                continue;
            }
            let modified = entry
                .metadata()?
                .modified()
                .unwrap_or(SystemTime::UNIX_EPOCH);
            found.push((modified, entry.into_path()));
        }

        found.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        Ok(found.into_iter().map(|(_, path)| path).collect())
    })
    .await??;

    Ok(files)
}

/// Loads the document and requires at least one page.
pub fn check_pdf(bytes: &[u8]) -> PdfCheck {
    match Document::load_mem(bytes) {
        Ok(doc) if doc.get_pages().is_empty() => PdfCheck::NoPages,
        Ok(_) => PdfCheck::Valid,
        Err(err) => PdfCheck::Corrupt(err.to_string()),
    }
}

async fn check_pdf_blocking(bytes: Vec<u8>) -> PdfCheck {
    match spawn_blocking(move || check_pdf(&bytes)).await {
        Ok(check) => check,
        Err(err) => PdfCheck::Corrupt(format!("parser crashed: {err}")),
    }
}

fn is_pdf_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.to_lowercase().ends_with(".pdf"))
}

fn has_uppercase_name(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().chars().any(char::is_uppercase))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use lopdf::{dictionary, Object};

    use super::*;

    fn one_page_pdf() -> Vec<u8> {
        let mut doc = Document::with_version("1.4");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    /// PDF 1.5 layout: catalog, page tree and page live in a compressed object stream and
    /// are only reachable through an xref stream.
    fn object_stream_pdf() -> Vec<u8> {
        let objects = [
            "<< /Type /Catalog /Pages 3 0 R >>",
            "<< /Type /Pages /Kids [4 0 R] /Count 1 >>",
            "<< /Type /Page /Parent 3 0 R /MediaBox [0 0 612 792] >>",
        ];
        let mut index = String::new();
        let mut body = String::new();
        for (i, obj) in objects.iter().enumerate() {
            index.push_str(&format!("{} {} ", i + 2, body.len()));
            body.push_str(obj);
            body.push('\n');
        }
        let first = index.len();
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(index.as_bytes()).unwrap();
        encoder.write_all(body.as_bytes()).unwrap();
        let packed = encoder.finish().unwrap();

        let mut pdf = b"%PDF-1.5\n".to_vec();
        let objstm_offset = pdf.len();
        pdf.extend_from_slice(
            format!(
                "1 0 obj\n<< /Type /ObjStm /N 3 /First {first} /Filter /FlateDecode /Length {} >>\nstream\n",
                packed.len()
            )
            .as_bytes(),
        );
        pdf.extend_from_slice(&packed);
        pdf.extend_from_slice(b"\nendstream\nendobj\n");

        let xref_offset = pdf.len();
        let mut entries = Vec::new();
        let mut push_entry = |kind: u8, field2: u32, field3: u16| {
            entries.push(kind);
            entries.extend_from_slice(&field2.to_be_bytes());
            entries.extend_from_slice(&field3.to_be_bytes());
        };
        push_entry(0, 0, 65535);
        push_entry(1, objstm_offset as u32, 0);
        push_entry(2, 1, 0);
        push_entry(2, 1, 1);
        push_entry(2, 1, 2);
        push_entry(1, xref_offset as u32, 0);

        pdf.extend_from_slice(
            format!(
                "5 0 obj\n<< /Type /XRef /Size 6 /W [1 4 2] /Root 2 0 R /Length {} >>\nstream\n",
                entries.len()
            )
            .as_bytes(),
        );
        pdf.extend_from_slice(&entries);
        pdf.extend_from_slice(
            format!("\nendstream\nendobj\nstartxref\n{xref_offset}\n%%EOF\n").as_bytes(),
        );
        pdf
    }

    fn no_page_pdf() -> Vec<u8> {
        let mut doc = Document::with_version("1.4");
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => 0,
        });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn accepts_one_page_pdf() {
        assert_eq!(check_pdf(&one_page_pdf()), PdfCheck::Valid);
    }

    #[test]
    fn accepts_pages_hidden_in_object_streams() {
        let pdf = object_stream_pdf();
        let plain_page_marker = pdf.windows(b"/Type /Page".len()).any(|w| w == b"/Type /Page");
        assert!(!plain_page_marker);

        assert_eq!(check_pdf(&pdf), PdfCheck::Valid);
    }

    #[test]
    fn rejects_broken_files() {
        assert!(matches!(check_pdf(b"<html>error</html>"), PdfCheck::Corrupt(_)));
        assert!(matches!(check_pdf(b""), PdfCheck::Corrupt(_)));

        assert_eq!(check_pdf(&no_page_pdf()), PdfCheck::NoPages);
    }

    #[test]
    fn summarize_skips_unreadable_files() {
        let files = vec![
            PathBuf::from("PDFs/Newest.pdf"),
            PathBuf::from("PDFs/Broken.pdf"),
            PathBuf::from("PDFs/Locked.pdf"),
            PathBuf::from("PDFs/oldest.pdf"),
        ];
        let results = vec![
            (files[3].clone(), Some(PdfCheck::Valid)),
            (files[2].clone(), None),
            (files[1].clone(), Some(PdfCheck::NoPages)),
            (files[0].clone(), Some(PdfCheck::Valid)),
        ];

        let report = summarize(&files, results);

        assert_eq!(report.checked, 3);
        assert_eq!(report.invalid, vec![(files[1].clone(), PdfCheck::NoPages)]);
        assert_eq!(report.unreadable, vec![files[2].clone()]);
        assert_eq!(report.uppercase_names, vec![files[0].clone()]);
    }

    #[tokio::test]
    async fn removes_invalid_and_reports_uppercase() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir_all(&nested).unwrap();

        let good = dir.path().join("good.pdf");
        let packed = dir.path().join("packed.pdf");
        let upper = nested.join("Upper.PDF");
        let broken = dir.path().join("broken.pdf");
        let other = dir.path().join("notes.txt");
        std::fs::write(&good, one_page_pdf()).unwrap();
        std::fs::write(&packed, object_stream_pdf()).unwrap();
        std::fs::write(&upper, one_page_pdf()).unwrap();
        std::fs::write(&broken, b"<html>not found</html>").unwrap();
        std::fs::write(&other, b"hello").unwrap();

        let config = VerifyConfig {
            dir: dir.path().to_path_buf(),
            ..VerifyConfig::default()
        };
        let report = verify_dir(&config).await.unwrap();

        assert_eq!(report.checked, 4);
        assert_eq!(report.invalid.len(), 1);
        assert_eq!(report.invalid[0].0, broken);
        assert!(matches!(report.invalid[0].1, PdfCheck::Corrupt(_)));
        assert_eq!(report.removed, 1);
        assert_eq!(report.uppercase_names, vec![upper.clone()]);
        assert!(!broken.exists());
        assert!(good.exists());
        assert!(packed.exists());
        assert!(upper.exists());
        assert!(other.exists());
    }

    #[tokio::test]
    async fn keep_invalid_removes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("broken.pdf");
        std::fs::write(&broken, b"partial").unwrap();

        let config = VerifyConfig {
            dir: dir.path().to_path_buf(),
            remove_invalid: false,
            ..VerifyConfig::default()
        };
        let report = verify_dir(&config).await.unwrap();

        assert_eq!(report.invalid.len(), 1);
        assert_eq!(report.removed, 0);
        assert!(broken.exists());
    }

    #[tokio::test]
    async fn finds_pdfs_recursively_and_errors_on_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("deep.Pdf"), b"x").unwrap();
        std::fs::write(dir.path().join("top.pdf"), b"x").unwrap();
        std::fs::write(dir.path().join("top.pdf.part"), b"x").unwrap();

        let mut found = find_pdf_files(dir.path()).await.unwrap();
        found.sort();
        assert_eq!(found, vec![nested.join("deep.Pdf"), dir.path().join("top.pdf")]);

        let err = find_pdf_files(&dir.path().join("missing")).await.unwrap_err();
        assert!(matches!(err, crate::Error::Walk(_)));
    }

    #[tokio::test]
    async fn empty_dir_yields_empty_report() {
        let dir = tempfile::tempdir().unwrap();
        let config = VerifyConfig {
            dir: dir.path().to_path_buf(),
            ..VerifyConfig::default()
        };
        assert_eq!(verify_dir(&config).await.unwrap(), VerifyReport::default());
    }
}
