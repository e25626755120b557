//! Error types for the edgequake-docmatrix library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`DocMatrixError`]: **Fatal for one conversion call**: the source could
//!   not be parsed, the target could not be encoded, the OCR service failed.
//!   Returned as `Err(DocMatrixError)` from the `convert*` and `merge*`
//!   functions.
//!
//! * [`FileError`]: **Non-fatal for a batch**: one file of a batch failed but
//!   its siblings are unaffected. Stored inside
//!   [`crate::output::FileState`] so callers can show the message next to
//!   that file and keep the rest of the batch.
//!
//! Empty sources are not errors at all: encoders emit a placeholder instead.

use crate::format::{SourceFormat, TargetFormat};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-docmatrix library.
#[derive(Debug, Error)]
pub enum DocMatrixError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// The file extension or MIME type is not one of the known formats.
    #[error("Unsupported file format for '{name}'")]
    UnsupportedFormat { name: String },

    /// The file does not match the source format the tool expects.
    #[error("'{name}' is not a {expected} file (detected: {detected})")]
    FormatMismatch {
        name: String,
        expected: SourceFormat,
        detected: String,
    },

    /// HTTP URL was syntactically valid but the download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Conversion errors ─────────────────────────────────────────────────
    /// Source bytes could not be parsed (corrupt archive, unreadable stream).
    #[error("Could not read '{name}' as {format}: {detail}")]
    ExtractionFailed {
        name: String,
        format: SourceFormat,
        detail: String,
    },

    /// A writer rejected the intermediate content.
    #[error("Could not write {format} output: {detail}")]
    EncodingFailed { format: TargetFormat, detail: String },

    /// No handler is registered for the requested pair.
    #[error("Conversion from {from} to {to} is not supported")]
    UnsupportedConversion { from: SourceFormat, to: TargetFormat },

    /// The registry is missing handlers for advertised tools.
    #[error("Conversion registry is incomplete; missing: {missing}")]
    RegistryIncomplete { missing: String },

    // ── OCR errors ────────────────────────────────────────────────────────
    /// No OCR engine is configured but the route needs one.
    #[error("OCR engine is not configured.\n{hint}")]
    OcrNotConfigured { hint: String },

    /// The OCR service returned a non-retryable error or retries ran out.
    #[error("OCR request failed: {message}")]
    OcrFailed { message: String },

    /// The OCR call did not settle within the server timeout.
    #[error("OCR timed out after {secs}s for '{name}'")]
    OcrTimeout { name: String, secs: u64 },

    /// OCR returned text that failed the quality heuristic.
    #[error("Could not extract readable text from '{name}': {reason}")]
    LowQualityOcr { name: String, reason: String },

    /// OCR API returned HTTP 429.
    #[error("Rate limit exceeded by OCR service '{service}'")]
    RateLimited {
        service: String,
        retry_after_secs: Option<u64>,
    },

    /// OCR API returned 401/403; retrying will not help.
    #[error("Authentication error from OCR service '{service}': {detail}")]
    AuthError { service: String, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDF reading, writing and rasterising need the pdfium shared library.\n\
  • Place libpdfium next to the executable, or\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium (file or directory), or\n\
  • Install pdfium system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DocMatrixError {
    /// Shorthand for [`DocMatrixError::EncodingFailed`].
    pub fn encoding(format: TargetFormat, detail: impl fmt::Display) -> Self {
        DocMatrixError::EncodingFailed {
            format,
            detail: detail.to_string(),
        }
    }

    /// Shorthand for [`DocMatrixError::ExtractionFailed`].
    pub fn extraction(name: &str, format: SourceFormat, detail: impl fmt::Display) -> Self {
        DocMatrixError::ExtractionFailed {
            name: name.to_string(),
            format,
            detail: detail.to_string(),
        }
    }

    /// Which [`FileErrorKind`] this error maps to when stored per file.
    pub fn kind(&self) -> FileErrorKind {
        match self {
            DocMatrixError::UnsupportedFormat { .. } | DocMatrixError::FormatMismatch { .. } => {
                FileErrorKind::Validation
            }
            DocMatrixError::ExtractionFailed { .. }
            | DocMatrixError::FileNotFound { .. }
            | DocMatrixError::DownloadFailed { .. }
            | DocMatrixError::DownloadTimeout { .. } => FileErrorKind::Extraction,
            DocMatrixError::EncodingFailed { .. }
            | DocMatrixError::OutputWriteFailed { .. }
            | DocMatrixError::PdfiumBindingFailed(_) => FileErrorKind::Encoding,
            DocMatrixError::OcrNotConfigured { .. }
            | DocMatrixError::OcrFailed { .. }
            | DocMatrixError::LowQualityOcr { .. }
            | DocMatrixError::RateLimited { .. }
            | DocMatrixError::AuthError { .. } => FileErrorKind::Ocr,
            DocMatrixError::OcrTimeout { .. } => FileErrorKind::Timeout,
            DocMatrixError::UnsupportedConversion { .. }
            | DocMatrixError::RegistryIncomplete { .. }
            | DocMatrixError::InvalidConfig(_)
            | DocMatrixError::Internal(_) => FileErrorKind::Internal,
        }
    }
}

/// Coarse category of a per-file failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileErrorKind {
    /// Declared format did not match the tool; the file never started.
    Validation,
    /// Source could not be parsed.
    Extraction,
    /// Target could not be produced.
    Encoding,
    /// OCR collaborator failed or returned unusable text.
    Ocr,
    /// A server-bound step exceeded its deadline.
    Timeout,
    /// Anything else, including a panicked task.
    Internal,
}

/// A non-fatal error for a single file in a batch.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[error("{message}")]
pub struct FileError {
    pub kind: FileErrorKind,
    pub message: String,
}

impl FileError {
    pub fn new(kind: FileErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<&DocMatrixError> for FileError {
    fn from(err: &DocMatrixError) -> Self {
        FileError::new(err.kind(), err.to_string())
    }
}

impl From<DocMatrixError> for FileError {
    fn from(err: DocMatrixError) -> Self {
        FileError::from(&err)
    }
}
