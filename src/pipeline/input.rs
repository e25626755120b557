//! Input resolution: turn a user-supplied path or URL into a [`SourceDocument`].
//!
//! Every reader in this crate works on in-memory bytes, so both local files
//! and downloads are read fully into memory. The format is detected from the
//! file name, then the `Content-Type` header (downloads only), then the
//! leading magic bytes.

use crate::error::DocMatrixError;
use crate::format::{SourceDocument, SourceFormat};
use reqwest::header::CONTENT_TYPE;
use std::path::PathBuf;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve a path or URL into a source document.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<SourceDocument, DocMatrixError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input).await
    }
}

/// Read a local file and detect its format.
async fn resolve_local(path_str: &str) -> Result<SourceDocument, DocMatrixError> {
    let path = PathBuf::from(path_str);
    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DocMatrixError::FileNotFound { path: path.clone() },
        _ => DocMatrixError::extraction(
            path_str,
            SourceFormat::detect(path_str, None, &[]).unwrap_or(SourceFormat::Text),
            e,
        ),
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path_str.to_string());

    let doc = SourceDocument::detect(name, bytes)?;
    debug!("Resolved local {} file: {}", doc.format, path.display());
    Ok(doc)
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<SourceDocument, DocMatrixError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| DocMatrixError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            DocMatrixError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            DocMatrixError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(DocMatrixError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let mime = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());

    let bytes = response
        .bytes()
        .await
        .map_err(|e| DocMatrixError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?
        .to_vec();

    let name = filename_from_url(url);
    let format = SourceFormat::detect(&name, mime.as_deref(), &bytes)
        .ok_or_else(|| DocMatrixError::UnsupportedFormat { name: name.clone() })?;

    info!("Downloaded {} bytes ({})", bytes.len(), format);
    let doc = SourceDocument::new(name, format, bytes);
    Ok(match mime {
        Some(m) => doc.with_mime(m),
        None => doc,
    })
}

/// Last path segment of a URL when it looks like a file name.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }
    "download".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn test_filename_from_url() {
        assert_eq!(filename_from_url("https://x.test/files/q3.xlsx?dl=1"), "q3.xlsx");
        assert_eq!(filename_from_url("https://x.test/files/"), "download");
        assert_eq!(filename_from_url("not a url"), "download");
    }

    #[tokio::test]
    async fn local_file_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();
        let doc = resolve_input(path.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(doc.format, SourceFormat::Text);
        assert_eq!(doc.name, "notes.txt");
        assert_eq!(doc.bytes, b"hello");
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = resolve_input("/definitely/not/here.pdf", 5).await.unwrap_err();
        assert!(matches!(err, DocMatrixError::FileNotFound { .. }));
    }
}
