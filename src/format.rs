//! Format tags, source documents and the advertised tool matrix.
//!
//! A [`SourceDocument`] is an immutable named blob plus the format it claims
//! to be. Format detection looks at the file extension first, then the MIME
//! type, then the leading magic bytes; validation against a tool's expected
//! source format happens before any parsing work starts.

use crate::error::DocMatrixError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Format of an input document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceFormat {
    Pdf,
    Word,
    Excel,
    Ppt,
    Text,
    Image,
}

/// Format of a conversion output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TargetFormat {
    Pdf,
    Word,
    Excel,
    Ppt,
    Text,
    Image,
}

/// Binary document containers produced by the writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Xlsx,
    Pptx,
}

impl SourceFormat {
    pub const ALL: [SourceFormat; 6] = [
        SourceFormat::Pdf,
        SourceFormat::Word,
        SourceFormat::Excel,
        SourceFormat::Ppt,
        SourceFormat::Text,
        SourceFormat::Image,
    ];

    /// File extensions (lower case, without dot) accepted for this format.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            SourceFormat::Pdf => &["pdf"],
            SourceFormat::Word => &["docx"],
            SourceFormat::Excel => &["xlsx", "xlsm", "xls", "ods"],
            SourceFormat::Ppt => &["pptx"],
            SourceFormat::Text => &["txt", "md", "csv", "tsv", "log"],
            SourceFormat::Image => &["png", "jpg", "jpeg", "webp"],
        }
    }

    /// MIME types accepted for this format.
    pub fn mime_types(self) -> &'static [&'static str] {
        match self {
            SourceFormat::Pdf => &["application/pdf"],
            SourceFormat::Word => {
                &["application/vnd.openxmlformats-officedocument.wordprocessingml.document"]
            }
            SourceFormat::Excel => &[
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                "application/vnd.ms-excel",
                "application/vnd.oasis.opendocument.spreadsheet",
            ],
            SourceFormat::Ppt => {
                &["application/vnd.openxmlformats-officedocument.presentationml.presentation"]
            }
            SourceFormat::Text => &["text/plain", "text/markdown", "text/csv"],
            SourceFormat::Image => &["image/png", "image/jpeg", "image/webp"],
        }
    }

    /// Detect a format from a file extension.
    pub fn from_extension(ext: &str) -> Option<SourceFormat> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.extensions().contains(&ext.as_str()))
    }

    /// Detect a format from a MIME type (`image/*` and `text/*` by prefix).
    pub fn from_mime(mime: &str) -> Option<SourceFormat> {
        let mime = mime.trim().to_ascii_lowercase();
        if let Some(f) = Self::ALL
            .into_iter()
            .find(|f| f.mime_types().contains(&mime.as_str()))
        {
            return Some(f);
        }
        if mime.starts_with("image/") {
            Some(SourceFormat::Image)
        } else if mime.starts_with("text/") {
            Some(SourceFormat::Text)
        } else {
            None
        }
    }

    /// Guess a format from leading magic bytes.
    ///
    /// ZIP containers are ambiguous between the three Office formats and
    /// return `None`.
    pub fn sniff(bytes: &[u8]) -> Option<SourceFormat> {
        if bytes.starts_with(b"%PDF") {
            Some(SourceFormat::Pdf)
        } else if bytes.starts_with(&[0x89, b'P', b'N', b'G'])
            || bytes.starts_with(&[0xFF, 0xD8, 0xFF])
            || (bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP")
        {
            Some(SourceFormat::Image)
        } else {
            None
        }
    }

    /// Detect a format from name, MIME type and content, in that order.
    pub fn detect(name: &str, mime: Option<&str>, bytes: &[u8]) -> Option<SourceFormat> {
        extension_of(name)
            .and_then(|ext| Self::from_extension(&ext))
            .or_else(|| mime.and_then(Self::from_mime))
            .or_else(|| Self::sniff(bytes))
    }
}

impl TargetFormat {
    pub const ALL: [TargetFormat; 6] = [
        TargetFormat::Pdf,
        TargetFormat::Word,
        TargetFormat::Excel,
        TargetFormat::Ppt,
        TargetFormat::Text,
        TargetFormat::Image,
    ];

    /// Extension of the file this target produces.
    pub fn extension(self) -> &'static str {
        match self {
            TargetFormat::Pdf => "pdf",
            TargetFormat::Word => "docx",
            TargetFormat::Excel => "xlsx",
            TargetFormat::Ppt => "pptx",
            TargetFormat::Text => "txt",
            TargetFormat::Image => "png",
        }
    }

    /// Whether several outputs of this target can be merged into one file.
    pub fn supports_native_merge(self) -> bool {
        !matches!(self, TargetFormat::Image)
    }
}

impl DocumentFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "application/pdf",
            DocumentFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            DocumentFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            DocumentFormat::Pptx => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Xlsx => "xlsx",
            DocumentFormat::Pptx => "pptx",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(format_label(*self as usize))
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(format_label(*self as usize))
    }
}

fn format_label(discriminant: usize) -> &'static str {
    ["PDF", "Word", "Excel", "PPT", "Text", "Image"][discriminant]
}

fn parse_label(s: &str) -> Option<usize> {
    match s.trim().to_ascii_lowercase().as_str() {
        "pdf" => Some(0),
        "word" | "docx" | "doc" => Some(1),
        "excel" | "xlsx" | "xls" | "sheet" => Some(2),
        "ppt" | "pptx" | "powerpoint" | "slides" => Some(3),
        "text" | "txt" | "plain" => Some(4),
        "image" | "img" | "png" | "jpg" | "jpeg" => Some(5),
        _ => None,
    }
}

impl FromStr for SourceFormat {
    type Err = DocMatrixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_label(s)
            .map(|i| SourceFormat::ALL[i])
            .ok_or_else(|| DocMatrixError::UnsupportedFormat { name: s.to_string() })
    }
}

impl FromStr for TargetFormat {
    type Err = DocMatrixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_label(s)
            .map(|i| TargetFormat::ALL[i])
            .ok_or_else(|| DocMatrixError::UnsupportedFormat { name: s.to_string() })
    }
}

// ── Source documents ─────────────────────────────────────────────────────

/// An immutable input blob with its declared format.
#[derive(Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub name: String,
    pub format: SourceFormat,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for SourceDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceDocument")
            .field("name", &self.name)
            .field("format", &self.format)
            .field("mime", &self.mime)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .finish()
    }
}

impl SourceDocument {
    /// Build a document with an explicit format.
    pub fn new(name: impl Into<String>, format: SourceFormat, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            format,
            mime: None,
            bytes,
        }
    }

    /// Build a document, detecting the format from the name and content.
    pub fn detect(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, DocMatrixError> {
        let name = name.into();
        let format = SourceFormat::detect(&name, None, &bytes)
            .ok_or_else(|| DocMatrixError::UnsupportedFormat { name: name.clone() })?;
        Ok(Self::new(name, format, bytes))
    }

    /// Convenience constructor for plain text.
    pub fn text(name: impl Into<String>, text: &str) -> Self {
        Self::new(name, SourceFormat::Text, text.as_bytes().to_vec())
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    /// File name without directory or extension; used to name outputs.
    pub fn basename(&self) -> String {
        basename(&self.name)
    }

    /// Validate against `expected` and adopt it as the declared format, so
    /// the reader chosen later is the one that was validated.
    pub fn accept_as(mut self, expected: SourceFormat) -> Result<Self, DocMatrixError> {
        self.validate_for(expected)?;
        if self.format != expected {
            debug!("'{}': declared {} but validated as {}", self.name, self.format, expected);
            self.format = expected;
        }
        Ok(self)
    }

    /// Check this document against the format a tool expects.
    ///
    /// The extension decides when present; otherwise the MIME type. A
    /// document with neither is accepted only when its declared format
    /// matches.
    pub fn validate_for(&self, expected: SourceFormat) -> Result<(), DocMatrixError> {
        let by_ext = extension_of(&self.name).map(|ext| (SourceFormat::from_extension(&ext), ext));
        let (detected, label) = match (by_ext, self.mime.as_deref()) {
            (Some((found, ext)), _) => (found, ext),
            (None, Some(mime)) => (SourceFormat::from_mime(mime), mime.to_string()),
            (None, None) => (Some(self.format), self.format.to_string()),
        };
        if detected == Some(expected) {
            Ok(())
        } else {
            Err(DocMatrixError::FormatMismatch {
                name: self.name.clone(),
                expected,
                detected: label,
            })
        }
    }
}

/// Lower-case extension of a file name, if any.
pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .filter(|e| !e.is_empty())
}

/// File stem of a name, falling back to `"document"`.
pub fn basename(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string())
}

// ── Tool matrix ──────────────────────────────────────────────────────────

/// One advertised conversion tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tool {
    pub from: SourceFormat,
    pub to: TargetFormat,
}

impl Tool {
    pub const fn new(from: SourceFormat, to: TargetFormat) -> Self {
        Self { from, to }
    }

    /// Stable identifier such as `pdf-to-word`.
    pub fn id(&self) -> String {
        format!(
            "{}-to-{}",
            self.from.to_string().to_ascii_lowercase(),
            self.to.to_string().to_ascii_lowercase()
        )
    }

    pub fn title(&self) -> String {
        format!("{} to {}", self.from, self.to)
    }
}

use SourceFormat as S;
use TargetFormat as T;

/// Every tool the engine advertises.
pub const TOOL_MATRIX: [Tool; 30] = [
    Tool::new(S::Image, T::Pdf),
    Tool::new(S::Text, T::Pdf),
    Tool::new(S::Excel, T::Pdf),
    Tool::new(S::Word, T::Pdf),
    Tool::new(S::Ppt, T::Pdf),
    Tool::new(S::Pdf, T::Word),
    Tool::new(S::Image, T::Word),
    Tool::new(S::Text, T::Word),
    Tool::new(S::Excel, T::Word),
    Tool::new(S::Ppt, T::Word),
    Tool::new(S::Pdf, T::Image),
    Tool::new(S::Word, T::Image),
    Tool::new(S::Text, T::Image),
    Tool::new(S::Excel, T::Image),
    Tool::new(S::Ppt, T::Image),
    Tool::new(S::Pdf, T::Excel),
    Tool::new(S::Word, T::Excel),
    Tool::new(S::Text, T::Excel),
    Tool::new(S::Image, T::Excel),
    Tool::new(S::Ppt, T::Excel),
    Tool::new(S::Pdf, T::Ppt),
    Tool::new(S::Word, T::Ppt),
    Tool::new(S::Image, T::Ppt),
    Tool::new(S::Text, T::Ppt),
    Tool::new(S::Excel, T::Ppt),
    Tool::new(S::Image, T::Text),
    Tool::new(S::Pdf, T::Text),
    Tool::new(S::Excel, T::Text),
    Tool::new(S::Ppt, T::Text),
    Tool::new(S::Word, T::Text),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_by_extension_then_magic() {
        assert_eq!(SourceFormat::detect("a.PDF", None, b""), Some(SourceFormat::Pdf));
        assert_eq!(SourceFormat::detect("deck.pptx", None, b"PK"), Some(SourceFormat::Ppt));
        assert_eq!(
            SourceFormat::detect("blob", None, b"%PDF-1.7"),
            Some(SourceFormat::Pdf)
        );
        assert_eq!(
            SourceFormat::detect("scan", Some("image/tiff"), b""),
            Some(SourceFormat::Image)
        );
        assert_eq!(SourceFormat::detect("archive.zip", None, b"PK"), None);
    }

    #[test]
    fn validation_rejects_wrong_extension() {
        let doc = SourceDocument::text("notes.txt", "hello");
        assert!(doc.validate_for(SourceFormat::Text).is_ok());
        let err = doc.validate_for(SourceFormat::Pdf).unwrap_err();
        assert!(matches!(err, DocMatrixError::FormatMismatch { .. }));
    }

    #[test]
    fn validation_falls_back_to_mime() {
        let doc = SourceDocument::new("upload", SourceFormat::Image, vec![])
            .with_mime("image/png");
        assert!(doc.validate_for(SourceFormat::Image).is_ok());
        assert!(doc.validate_for(SourceFormat::Word).is_err());
    }

    #[test]
    fn accepted_documents_take_the_validated_format() {
        let doc = SourceDocument::new("sales.xlsx", SourceFormat::Text, vec![1, 2, 3]);
        let accepted = doc.accept_as(SourceFormat::Excel).unwrap();
        assert_eq!(accepted.format, SourceFormat::Excel);

        let doc = SourceDocument::new("sales.xlsx", SourceFormat::Excel, vec![]);
        assert!(doc.accept_as(SourceFormat::Text).is_err());
    }

    #[test]
    fn tool_matrix_has_every_off_diagonal_pair_once() {
        let mut seen = std::collections::HashSet::new();
        for tool in TOOL_MATRIX {
            assert_ne!(tool.from as usize, tool.to as usize, "{tool:?}");
            assert!(seen.insert(tool), "duplicate {tool:?}");
        }
        assert_eq!(seen.len(), 30);
    }

    #[test]
    fn parse_and_display_labels() {
        assert_eq!("pptx".parse::<SourceFormat>().unwrap(), SourceFormat::Ppt);
        assert_eq!("Excel".parse::<TargetFormat>().unwrap(), TargetFormat::Excel);
        assert!("midi".parse::<TargetFormat>().is_err());
        assert_eq!(TargetFormat::Ppt.to_string(), "PPT");
        assert_eq!(Tool::new(S::Word, T::Pdf).id(), "word-to-pdf");
    }

    #[test]
    fn basename_strips_dir_and_extension() {
        assert_eq!(basename("/tmp/report.final.docx"), "report.final");
        assert_eq!(basename(""), "document");
    }
}
