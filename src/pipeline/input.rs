//! Input adapter: turn pasted text or a PDF into one plain-text document.
//!
//! ## Why download to a temp file?
//!
//! pdfium opens documents from a file-system path. URL inputs are downloaded
//! into a `TempDir` that lives as long as the [`ResolvedInput`], so cleanup
//! happens even on panic. The `%PDF` magic bytes are checked before pdfium is
//! ever loaded, so a corrupt or mislabelled upload fails fast with
//! [`SummaryError::DocumentExtraction`] and never reaches the agents.

use crate::error::SummaryError;
use pdfium_render::prelude::*;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// What the user handed us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentInput {
    /// Pasted text, used verbatim.
    Text(String),
    /// Local PDF path or HTTP/HTTPS URL to a PDF.
    Pdf(String),
}

/// Pick the input to summarize: non-blank pasted text wins over a PDF.
pub fn select_input(text: Option<&str>, pdf: Option<&str>) -> Result<DocumentInput, SummaryError> {
    match (text, pdf) {
        (Some(t), _) if !t.trim().is_empty() => Ok(DocumentInput::Text(t.to_string())),
        (_, Some(p)) if !p.trim().is_empty() => Ok(DocumentInput::Pdf(p.trim().to_string())),
        _ => Err(SummaryError::EmptyInput),
    }
}

/// Extract plain text from `input`.
///
/// PDF pages are read in order; each non-empty page contributes its text
/// followed by a newline.
pub async fn extract_text(
    input: &DocumentInput,
    download_timeout_secs: u64,
) -> Result<String, SummaryError> {
    match input {
        DocumentInput::Text(text) => Ok(text.clone()),
        DocumentInput::Pdf(location) => {
            let resolved = resolve_input(location, download_timeout_secs).await?;
            let path = resolved.path().to_path_buf();
            let text = tokio::task::spawn_blocking(move || extract_pdf_text_blocking(&path))
                .await
                .map_err(|e| SummaryError::Internal(format!("Extraction task panicked: {e}")))??;
            info!("Extracted {} chars from {}", text.chars().count(), location);
            Ok(text)
        }
    }
}

/// The resolved input: either a local path or a downloaded temp file.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; the PDF lives in a temp directory kept alive here.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve a path or URL to a local, magic-checked PDF file.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, SummaryError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

fn extraction_error(source_name: impl Into<String>, detail: impl Into<String>) -> SummaryError {
    SummaryError::DocumentExtraction {
        source_name: source_name.into(),
        detail: detail.into(),
    }
}

fn check_magic(name: &str, magic: &[u8]) -> Result<(), SummaryError> {
    if magic.len() < 4 || &magic[..4] != b"%PDF" {
        return Err(extraction_error(
            name,
            format!("not a PDF file (first bytes: {:?})", &magic[..magic.len().min(4)]),
        ));
    }
    Ok(())
}

fn resolve_local(path_str: &str) -> Result<ResolvedInput, SummaryError> {
    let path = PathBuf::from(path_str);

    let mut file = std::fs::File::open(&path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => extraction_error(path_str, "file not found"),
        std::io::ErrorKind::PermissionDenied => extraction_error(path_str, "permission denied"),
        _ => extraction_error(path_str, e.to_string()),
    })?;

    let mut magic = Vec::with_capacity(4);
    file.by_ref()
        .take(4)
        .read_to_end(&mut magic)
        .map_err(|e| extraction_error(path_str, e.to_string()))?;
    check_magic(path_str, &magic)?;

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, SummaryError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| extraction_error(url, format!("download failed: {e}")))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            extraction_error(
                url,
                format!("download timed out after {timeout_secs}s (raise --download-timeout)"),
            )
        } else {
            extraction_error(url, format!("download failed: {e}"))
        }
    })?;

    if !response.status().is_success() {
        return Err(extraction_error(
            url,
            format!("download failed: HTTP {}", response.status()),
        ));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| extraction_error(url, format!("download failed: {e}")))?;
    check_magic(url, &bytes)?;

    let temp_dir = TempDir::new().map_err(|e| SummaryError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(filename_from_url(url));
    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| SummaryError::Internal(format!("Failed to write temp file: {e}")))?;

    info!("Downloaded to: {}", file_path.display());
    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

fn filename_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut s| s.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty() && last.contains('.'))
        .unwrap_or_else(|| "downloaded.pdf".to_string())
}

/// Bind pdfium: an explicit `PDFIUM_LIB_PATH` wins, otherwise the
/// auto-downloaded, cached copy.
fn bind_pdfium() -> Result<Pdfium, String> {
    if let Ok(path) = std::env::var("PDFIUM_LIB_PATH") {
        if !path.is_empty() {
            return pdfium_auto::bind_pdfium_from_path(Path::new(&path)).map_err(|e| e.to_string());
        }
    }
    pdfium_auto::bind_pdfium_silent().map_err(|e| e.to_string())
}

fn extract_pdf_text_blocking(path: &Path) -> Result<String, SummaryError> {
    let name = path.display().to_string();
    let pdfium = bind_pdfium().map_err(|e| extraction_error(&name, format!("pdfium unavailable: {e}")))?;

    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| extraction_error(&name, format!("{e:?}")))?;

    let pages = document.pages();
    debug!("PDF loaded: {} pages", pages.len());

    let mut text = String::new();
    for (idx, page) in pages.iter().enumerate() {
        let page_text = page
            .text()
            .map_err(|e| extraction_error(&name, format!("page {}: {e:?}", idx + 1)))?
            .all();
        if !page_text.is_empty() {
            text.push_str(&page_text);
            text.push('\n');
        }
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn pasted_text_wins_over_pdf() {
        assert_eq!(
            select_input(Some("hello"), Some("doc.pdf")).unwrap(),
            DocumentInput::Text("hello".into())
        );
        assert_eq!(
            select_input(Some("   \n"), Some("doc.pdf")).unwrap(),
            DocumentInput::Pdf("doc.pdf".into())
        );
        assert!(matches!(
            select_input(Some(""), None),
            Err(SummaryError::EmptyInput)
        ));
        assert!(matches!(select_input(None, None), Err(SummaryError::EmptyInput)));
    }

    #[test]
    fn filename_from_url_falls_back() {
        assert_eq!(filename_from_url("https://x.org/papers/a.pdf"), "a.pdf");
        assert_eq!(filename_from_url("https://arxiv.org/pdf/1706"), "downloaded.pdf");
        assert_eq!(filename_from_url("not a url"), "downloaded.pdf");
    }

    #[tokio::test]
    async fn text_input_is_identity() {
        let input = DocumentInput::Text("  keep   me  ".into());
        assert_eq!(extract_text(&input, 5).await.unwrap(), "  keep   me  ");
    }

    #[tokio::test]
    async fn missing_file_is_extraction_error() {
        let input = DocumentInput::Pdf("/definitely/not/here.pdf".into());
        let err = extract_text(&input, 5).await.unwrap_err();
        assert!(matches!(err, SummaryError::DocumentExtraction { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn corrupt_file_is_rejected_before_pdfium() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"GIF89a definitely not a pdf").unwrap();
        let input = DocumentInput::Pdf(tmp.path().to_string_lossy().to_string());

        let err = extract_text(&input, 5).await.unwrap_err();
        match err {
            SummaryError::DocumentExtraction { detail, .. } => {
                assert!(detail.contains("not a PDF"), "got {detail}")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn truncated_file_is_not_a_pdf() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"%P").unwrap();
        assert!(resolve_local(&tmp.path().to_string_lossy()).is_err());
    }

    #[tokio::test]
    async fn unreachable_url_is_extraction_error() {
        // Port 9 (discard) is closed on loopback, so the connect fails fast.
        let url = "http://127.0.0.1:9/report.pdf";
        let err = extract_text(&DocumentInput::Pdf(url.into()), 5)
            .await
            .unwrap_err();
        match err {
            SummaryError::DocumentExtraction {
                source_name,
                detail,
            } => {
                assert_eq!(source_name, url);
                assert!(detail.starts_with("download"), "got {detail}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
