//! Output types: conversion results and per-file orchestration state.
//!
//! [`ConversionResult`] is a closed enum so every consumer (file writer,
//! archive packager, CLI) matches exhaustively on the output shape instead
//! of probing optional fields.

use crate::error::FileError;
use crate::format::{DocumentFormat, TargetFormat};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Plain text output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextResult {
    pub text: String,
    pub filename: String,
}

/// One rasterised page.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageImage {
    /// 1-indexed page number within its source document.
    pub page: usize,
    pub filename: String,
    /// PNG bytes.
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl fmt::Debug for PageImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageImage")
            .field("page", &self.page)
            .field("filename", &self.filename)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// A set of page images (one per page of the source).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSetResult {
    pub images: Vec<PageImage>,
}

/// A binary office/PDF document.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryDocumentResult {
    pub format: DocumentFormat,
    pub filename: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl fmt::Debug for BinaryDocumentResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryDocumentResult")
            .field("format", &self.format)
            .field("filename", &self.filename)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// The outcome of one conversion (or one merge).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConversionResult {
    Text(TextResult),
    Images(ImageSetResult),
    Document(BinaryDocumentResult),
}

impl ConversionResult {
    /// Build a binary document result named `<basename>_converted.<ext>`.
    pub fn document(format: DocumentFormat, basename: &str, bytes: Vec<u8>) -> Self {
        ConversionResult::Document(BinaryDocumentResult {
            format,
            filename: converted_filename(basename, format.extension()),
            bytes,
        })
    }

    /// Build a text result named `<basename>_converted.txt`.
    pub fn text(basename: &str, text: String) -> Self {
        ConversionResult::Text(TextResult {
            text,
            filename: converted_filename(basename, "txt"),
        })
    }

    /// Build an image-set result from PNG pages named `<basename>_page_<n>.png`.
    pub fn images(basename: &str, pages: Vec<Vec<u8>>) -> Self {
        let images = pages
            .into_iter()
            .enumerate()
            .map(|(i, bytes)| PageImage {
                page: i + 1,
                filename: page_image_filename(basename, i + 1),
                bytes,
            })
            .collect();
        ConversionResult::Images(ImageSetResult { images })
    }

    pub fn target(&self) -> TargetFormat {
        match self {
            ConversionResult::Text(_) => TargetFormat::Text,
            ConversionResult::Images(_) => TargetFormat::Image,
            ConversionResult::Document(doc) => match doc.format {
                DocumentFormat::Pdf => TargetFormat::Pdf,
                DocumentFormat::Docx => TargetFormat::Word,
                DocumentFormat::Xlsx => TargetFormat::Excel,
                DocumentFormat::Pptx => TargetFormat::Ppt,
            },
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ConversionResult::Text(_) => "text/plain",
            ConversionResult::Images(_) => "image/png",
            ConversionResult::Document(doc) => doc.format.mime_type(),
        }
    }

    /// Suggested filename of the primary artefact.
    pub fn filename(&self) -> &str {
        match self {
            ConversionResult::Text(t) => &t.filename,
            ConversionResult::Images(set) => set
                .images
                .first()
                .map(|i| i.filename.as_str())
                .unwrap_or("images.png"),
            ConversionResult::Document(doc) => &doc.filename,
        }
    }

    /// Total payload size in bytes.
    pub fn byte_len(&self) -> usize {
        match self {
            ConversionResult::Text(t) => t.text.len(),
            ConversionResult::Images(set) => set.images.iter().map(|i| i.bytes.len()).sum(),
            ConversionResult::Document(doc) => doc.bytes.len(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ConversionResult::Text(t) => Some(&t.text),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ConversionResult::Document(doc) => Some(&doc.bytes),
            _ => None,
        }
    }
}

/// `<basename>_converted.<ext>`
pub fn converted_filename(basename: &str, ext: &str) -> String {
    format!("{basename}_converted.{ext}")
}

/// `<basename>_page_<n>.png`
pub fn page_image_filename(basename: &str, page: usize) -> String {
    format!("{basename}_page_{page}.png")
}

// ── Orchestrator state ───────────────────────────────────────────────────

/// Lifecycle of one file in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    #[default]
    Idle,
    Processing,
    Success,
    Error,
}

impl FileStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, FileStatus::Success | FileStatus::Error)
    }
}

/// Per-file state owned by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileState {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub name: String,
    pub status: FileStatus,
    /// 0–100, never decreases.
    pub progress: u8,
    pub result: Option<ConversionResult>,
    pub error: Option<FileError>,
}

impl FileState {
    pub fn new(batch_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            batch_id,
            name: name.into(),
            status: FileStatus::Idle,
            progress: 0,
            result: None,
            error: None,
        }
    }
}

/// Final view of a batch after every file settled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub files: Vec<FileState>,
    /// Whether the batch-complete notification fired.
    pub notified: bool,
}

impl BatchReport {
    pub fn all_succeeded(&self) -> bool {
        !self.files.is_empty() && self.files.iter().all(|f| f.status == FileStatus::Success)
    }

    pub fn failed(&self) -> impl Iterator<Item = &FileState> {
        self.files.iter().filter(|f| f.status == FileStatus::Error)
    }

    /// Successful results in submission order, paired with the file name.
    pub fn results(&self) -> Vec<(&str, &ConversionResult)> {
        self.files
            .iter()
            .filter_map(|f| f.result.as_ref().map(|r| (f.name.as_str(), r)))
            .collect()
    }
}
