//! Configuration types for document conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Empirical constants (clustering
//! tolerances, OCR quality thresholds) live here as fields rather than
//! literals so they can be tuned per deployment and per script.

use crate::error::DocMatrixError;
use crate::pipeline::ocr::OcrEngine;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default OCR endpoint (Mistral OCR compatible).
pub const DEFAULT_OCR_ENDPOINT: &str = "https://api.mistral.ai/v1/ocr";

/// Default OCR model.
pub const DEFAULT_OCR_MODEL: &str = "mistral-ocr-latest";

/// Configuration for conversions, merges and batches.
///
/// # Example
/// ```rust
/// use edgequake_docmatrix::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .row_tolerance(4.0)
///     .server_timeout_secs(25)
///     .build()
///     .unwrap();
/// assert_eq!(config.server_timeout_secs, 25);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Max vertical distance (PDF points) for two text items to share a row. Default: 5.
    pub row_tolerance: f32,

    /// Max horizontal distance (PDF points) for two text items to share a column. Default: 15.
    pub column_tolerance: f32,

    /// Minimum share of letters/digits among non-whitespace OCR characters. Default: 0.15.
    ///
    /// Tuned on Latin and CJK samples; scripts with heavy punctuation may
    /// need a lower value.
    pub min_alnum_ratio: f32,

    /// Minimum number of letters/digits in OCR output. Default: 3.
    pub min_alnum_chars: usize,

    /// Apply digit/letter confusion fixes to OCR text bound for spreadsheets. Default: true.
    pub correct_ocr_numbers: bool,

    /// Deadline for server-bound steps (OCR, downloads inside a batch). Default: 30.
    pub server_timeout_secs: u64,

    /// Oversampling factor when rasterising PDF pages. Default: 2.0.
    pub raster_scale: f32,

    /// Body font size for generated PDFs, in points. Default: 11.
    pub font_size: f32,

    /// Line height as a multiple of the font size. Default: 1.15.
    pub line_height_factor: f32,

    /// Page margin for generated PDFs, in points. Default: 40.
    pub margin: f32,

    /// Retry attempts on a transient OCR failure. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (doubles per attempt). Default: 500.
    pub retry_backoff_ms: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Interval of the simulated progress ticker for server-bound steps. Default: 500.
    pub progress_tick_ms: u64,

    /// Percentage added per tick. Default: 5.
    pub progress_step: u8,

    /// Simulated progress stays strictly below this value. Default: 90.
    pub progress_cap: u8,

    /// Files processed at once by [`crate::stream::convert_stream`]. Default: 4.
    pub concurrency: usize,

    /// OCR service settings used when no engine is injected.
    pub ocr: OcrSettings,

    /// Pre-constructed OCR engine. Takes precedence over `ocr`.
    pub ocr_engine: Option<Arc<dyn OcrEngine>>,

    /// Optional per-file progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

/// Connection settings for the HTTP OCR engine.
#[derive(Clone, Serialize, Deserialize)]
pub struct OcrSettings {
    pub endpoint: String,
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_OCR_ENDPOINT.to_string(),
            model: DEFAULT_OCR_MODEL.to_string(),
            api_key: None,
        }
    }
}

impl OcrSettings {
    /// Read `DOCMATRIX_OCR_URL`, `DOCMATRIX_OCR_MODEL` and the API key from
    /// `DOCMATRIX_OCR_API_KEY` or `MISTRAL_API_KEY`.
    pub fn from_env() -> Self {
        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        Self {
            endpoint: non_empty("DOCMATRIX_OCR_URL").unwrap_or(defaults.endpoint),
            model: non_empty("DOCMATRIX_OCR_MODEL").unwrap_or(defaults.model),
            api_key: non_empty("DOCMATRIX_OCR_API_KEY").or_else(|| non_empty("MISTRAL_API_KEY")),
        }
    }
}

impl fmt::Debug for OcrSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OcrSettings")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            row_tolerance: 5.0,
            column_tolerance: 15.0,
            min_alnum_ratio: 0.15,
            min_alnum_chars: 3,
            correct_ocr_numbers: true,
            server_timeout_secs: 30,
            raster_scale: 2.0,
            font_size: 11.0,
            line_height_factor: 1.15,
            margin: 40.0,
            max_retries: 3,
            retry_backoff_ms: 500,
            download_timeout_secs: 120,
            progress_tick_ms: 500,
            progress_step: 5,
            progress_cap: 90,
            concurrency: 4,
            ocr: OcrSettings::default(),
            ocr_engine: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("row_tolerance", &self.row_tolerance)
            .field("column_tolerance", &self.column_tolerance)
            .field("min_alnum_ratio", &self.min_alnum_ratio)
            .field("min_alnum_chars", &self.min_alnum_chars)
            .field("server_timeout_secs", &self.server_timeout_secs)
            .field("raster_scale", &self.raster_scale)
            .field("font_size", &self.font_size)
            .field("margin", &self.margin)
            .field("max_retries", &self.max_retries)
            .field("concurrency", &self.concurrency)
            .field("ocr", &self.ocr)
            .field("ocr_engine", &self.ocr_engine.as_ref().map(|e| e.name().to_string()))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Line height in points derived from the font size.
    pub fn line_height(&self) -> f32 {
        self.font_size * self.line_height_factor
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn row_tolerance(mut self, points: f32) -> Self {
        self.config.row_tolerance = points;
        self
    }

    pub fn column_tolerance(mut self, points: f32) -> Self {
        self.config.column_tolerance = points;
        self
    }

    pub fn min_alnum_ratio(mut self, ratio: f32) -> Self {
        self.config.min_alnum_ratio = ratio;
        self
    }

    pub fn min_alnum_chars(mut self, n: usize) -> Self {
        self.config.min_alnum_chars = n;
        self
    }

    pub fn correct_ocr_numbers(mut self, v: bool) -> Self {
        self.config.correct_ocr_numbers = v;
        self
    }

    pub fn server_timeout_secs(mut self, secs: u64) -> Self {
        self.config.server_timeout_secs = secs;
        self
    }

    pub fn raster_scale(mut self, scale: f32) -> Self {
        self.config.raster_scale = scale;
        self
    }

    pub fn font_size(mut self, size: f32) -> Self {
        self.config.font_size = size;
        self
    }

    pub fn line_height_factor(mut self, factor: f32) -> Self {
        self.config.line_height_factor = factor;
        self
    }

    pub fn margin(mut self, points: f32) -> Self {
        self.config.margin = points;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_tick_ms(mut self, ms: u64) -> Self {
        self.config.progress_tick_ms = ms.max(1);
        self
    }

    pub fn progress_step(mut self, step: u8) -> Self {
        self.config.progress_step = step;
        self
    }

    pub fn progress_cap(mut self, cap: u8) -> Self {
        self.config.progress_cap = cap;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn ocr_settings(mut self, settings: OcrSettings) -> Self {
        self.config.ocr = settings;
        self
    }

    pub fn ocr_engine(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.config.ocr_engine = Some(engine);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, DocMatrixError> {
        let c = &self.config;
        let invalid = |msg: String| Err(DocMatrixError::InvalidConfig(msg));
        if !(c.row_tolerance > 0.0) || !(c.column_tolerance > 0.0) {
            return invalid(format!(
                "Clustering tolerances must be > 0, got row={} column={}",
                c.row_tolerance, c.column_tolerance
            ));
        }
        if !(0.0..=1.0).contains(&c.min_alnum_ratio) {
            return invalid(format!(
                "min_alnum_ratio must be 0–1, got {}",
                c.min_alnum_ratio
            ));
        }
        if !(0.5..=8.0).contains(&c.raster_scale) {
            return invalid(format!("raster_scale must be 0.5–8, got {}", c.raster_scale));
        }
        if !(4.0..=72.0).contains(&c.font_size) {
            return invalid(format!("font_size must be 4–72pt, got {}", c.font_size));
        }
        if c.line_height_factor < 1.0 {
            return invalid(format!(
                "line_height_factor must be ≥ 1, got {}",
                c.line_height_factor
            ));
        }
        if !(0.0..=200.0).contains(&c.margin) {
            return invalid(format!("margin must be 0–200pt, got {}", c.margin));
        }
        if c.progress_cap == 0 || c.progress_cap > 99 || c.progress_step == 0 {
            return invalid(format!(
                "progress_cap must be 1–99 and progress_step ≥ 1, got cap={} step={}",
                c.progress_cap, c.progress_step
            ));
        }
        if c.server_timeout_secs == 0 {
            return invalid("server_timeout_secs must be ≥ 1".into());
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Page orientation for generated PDFs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    /// A4 portrait (default).
    #[default]
    Portrait,
    /// A4 landscape, used for slide-sourced content.
    Landscape,
}
