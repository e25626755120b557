//! OCR interaction: send an image (or PDF) to the OCR service and get text back.
//!
//! The engine sits behind the [`OcrEngine`] trait so tests and embedders can
//! inject their own recogniser; [`HttpOcrEngine`] speaks the Mistral OCR
//! wire format. All cleanup and quality gating lives in
//! [`crate::pipeline::postprocess`] and is applied by [`extract_text`], so an
//! engine only has to return raw text.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 5xx errors from OCR APIs are transient under concurrent load.
//! Exponential backoff (`retry_backoff_ms * 2^(attempt-1)`) avoids a
//! thundering herd: with 500 ms base and 3 retries the wait sequence is
//! 500 ms → 1 s → 2 s. 401/403 are never retried.

use crate::config::{ConversionConfig, OcrSettings};
use crate::error::DocMatrixError;
use crate::pipeline::encode::data_url;
use crate::pipeline::postprocess::{assess_ocr_text, clean_ocr_output, OcrThresholds};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// A document handed to the OCR engine.
#[derive(Clone)]
pub struct OcrRequest {
    /// Source file name, used in logs and errors.
    pub name: String,
    /// MIME type of `bytes` (`image/png`, `application/pdf`, ...).
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for OcrRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrRequest")
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl OcrRequest {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    fn is_pdf(&self) -> bool {
        self.mime == "application/pdf"
    }
}

/// Recognises text in an image or PDF.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Return the raw recognised text (Markdown flavoured is fine).
    async fn recognize(&self, request: &OcrRequest) -> Result<String, DocMatrixError>;

    /// Short engine name for logs.
    fn name(&self) -> &str;
}

// ── HTTP engine ──────────────────────────────────────────────────────────────

/// OCR engine backed by a Mistral-compatible `/v1/ocr` endpoint.
pub struct HttpOcrEngine {
    client: reqwest::Client,
    settings: OcrSettings,
    api_key: String,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl HttpOcrEngine {
    /// Build from config; fails when no API key is available.
    pub fn from_config(config: &ConversionConfig) -> Result<Self, DocMatrixError> {
        let api_key = config
            .ocr
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| DocMatrixError::OcrNotConfigured {
                hint: "Set DOCMATRIX_OCR_API_KEY (or MISTRAL_API_KEY), or inject an OcrEngine."
                    .into(),
            })?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| DocMatrixError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            settings: config.ocr.clone(),
            api_key,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        })
    }

    /// JSON body for one OCR request.
    fn request_body(&self, request: &OcrRequest) -> Value {
        build_request_body(&self.settings.model, request)
    }

    async fn send_once(&self, body: &Value) -> Result<String, DocMatrixError> {
        let response = self
            .client
            .post(&self.settings.endpoint)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| DocMatrixError::OcrFailed {
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            let parsed: OcrResponse =
                response.json().await.map_err(|e| DocMatrixError::OcrFailed {
                    message: format!("invalid response body: {e}"),
                })?;
            return Ok(parsed.into_text());
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let detail = response.text().await.unwrap_or_default();

        Err(match status.as_u16() {
            401 | 403 => DocMatrixError::AuthError {
                service: self.name().to_string(),
                detail: format!("HTTP {status}: {detail}"),
            },
            429 => DocMatrixError::RateLimited {
                service: self.name().to_string(),
                retry_after_secs: retry_after,
            },
            _ => DocMatrixError::OcrFailed {
                message: format!("HTTP {status}: {detail}"),
            },
        })
    }
}

impl std::fmt::Debug for HttpOcrEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpOcrEngine")
            .field("settings", &self.settings)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

#[async_trait]
impl OcrEngine for HttpOcrEngine {
    async fn recognize(&self, request: &OcrRequest) -> Result<String, DocMatrixError> {
        let start = Instant::now();
        let body = self.request_body(request);
        let mut last_err: Option<DocMatrixError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "{}: OCR retry {}/{} after {}ms",
                    request.name, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.send_once(&body).await {
                Ok(text) => {
                    debug!(
                        "{}: OCR returned {} chars in {:?}",
                        request.name,
                        text.len(),
                        start.elapsed()
                    );
                    return Ok(text);
                }
                Err(e) if !is_retryable(&e) => return Err(e),
                Err(e) => {
                    warn!("{}: OCR attempt {} failed: {}", request.name, attempt + 1, e);
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| DocMatrixError::OcrFailed {
            message: "Unknown error".into(),
        }))
    }

    fn name(&self) -> &str {
        "mistral-ocr"
    }
}

fn is_retryable(err: &DocMatrixError) -> bool {
    match err {
        DocMatrixError::AuthError { .. } => false,
        DocMatrixError::RateLimited { .. } => true,
        DocMatrixError::OcrFailed { message } => {
            !message.starts_with("HTTP 4") && !message.starts_with("invalid response body")
        }
        _ => false,
    }
}

/// Request body: images go as `image_url`, PDFs as `document_url`.
pub fn build_request_body(model: &str, request: &OcrRequest) -> Value {
    let url = data_url(&request.mime, &request.bytes);
    let document = if request.is_pdf() {
        json!({ "type": "document_url", "document_url": url })
    } else {
        json!({ "type": "image_url", "image_url": url })
    };
    json!({
        "model": model,
        "document": document,
        "include_image_base64": false,
    })
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    #[serde(default)]
    pages: Vec<OcrPage>,
    #[serde(default)]
    document_annotation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OcrPage {
    #[serde(default)]
    markdown: String,
}

impl OcrResponse {
    /// Non-empty page markdown joined by blank lines, else the annotation.
    fn into_text(self) -> String {
        let text = self
            .pages
            .into_iter()
            .map(|p| p.markdown)
            .filter(|m| !m.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        if text.is_empty() {
            self.document_annotation.unwrap_or_default()
        } else {
            text
        }
    }
}

// ── Engine selection and the OCR step ────────────────────────────────────────

/// The injected engine if any, else an HTTP engine from settings.
pub fn resolve_engine(config: &ConversionConfig) -> Result<Arc<dyn OcrEngine>, DocMatrixError> {
    if let Some(engine) = &config.ocr_engine {
        return Ok(Arc::clone(engine));
    }
    Ok(Arc::new(HttpOcrEngine::from_config(config)?))
}

/// Run one recognition under a deadline.
pub async fn recognize_with_timeout(
    engine: &dyn OcrEngine,
    request: &OcrRequest,
    secs: u64,
) -> Result<String, DocMatrixError> {
    timeout(Duration::from_secs(secs), engine.recognize(request))
        .await
        .map_err(|_| DocMatrixError::OcrTimeout {
            name: request.name.clone(),
            secs,
        })?
}

/// Call the engine with the server deadline and return cleaned, validated text.
///
/// Fails with [`DocMatrixError::OcrTimeout`] when the engine does not settle
/// within `server_timeout_secs`, and with [`DocMatrixError::LowQualityOcr`]
/// when the cleaned text fails the quality heuristic.
pub async fn extract_text(
    request: OcrRequest,
    config: &ConversionConfig,
) -> Result<String, DocMatrixError> {
    let engine = resolve_engine(config)?;
    info!("OCR '{}' via {}", request.name, engine.name());

    let raw = recognize_with_timeout(engine.as_ref(), &request, config.server_timeout_secs).await?;
    let cleaned = clean_ocr_output(&raw);
    match assess_ocr_text(&cleaned, OcrThresholds::from_config(config)) {
        Ok(quality) => {
            debug!(
                "{}: {} alnum of {} chars ({:.0}%)",
                request.name,
                quality.alnum,
                quality.non_whitespace,
                quality.ratio * 100.0
            );
            Ok(cleaned)
        }
        Err(reason) => Err(DocMatrixError::LowQualityOcr {
            name: request.name,
            reason,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEngine(&'static str);

    #[async_trait]
    impl OcrEngine for FixedEngine {
        async fn recognize(&self, _request: &OcrRequest) -> Result<String, DocMatrixError> {
            Ok(self.0.to_string())
        }
        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct SlowEngine;

    #[async_trait]
    impl OcrEngine for SlowEngine {
        async fn recognize(&self, _request: &OcrRequest) -> Result<String, DocMatrixError> {
            sleep(Duration::from_secs(3600)).await;
            Ok(String::new())
        }
        fn name(&self) -> &str {
            "slow"
        }
    }

    fn config_with(engine: Arc<dyn OcrEngine>) -> ConversionConfig {
        ConversionConfig::builder()
            .ocr_engine(engine)
            .server_timeout_secs(1)
            .build()
            .unwrap()
    }

    fn png_request() -> OcrRequest {
        OcrRequest::new("scan.png", "image/png", vec![0x89, b'P', b'N', b'G'])
    }

    #[test]
    fn request_body_uses_image_url_for_images() {
        let body = build_request_body("m", &png_request());
        assert_eq!(body["document"]["type"], "image_url");
        assert!(body["document"]["image_url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,"));
    }

    #[test]
    fn request_body_uses_document_url_for_pdf() {
        let req = OcrRequest::new("a.pdf", "application/pdf", b"%PDF".to_vec());
        let body = build_request_body("m", &req);
        assert_eq!(body["document"]["type"], "document_url");
        assert_eq!(body["model"], "m");
    }

    #[test]
    fn response_pages_are_joined() {
        let resp: OcrResponse = serde_json::from_value(json!({
            "pages": [{"markdown": "one"}, {"markdown": "  "}, {"markdown": "two"}]
        }))
        .unwrap();
        assert_eq!(resp.into_text(), "one\n\ntwo");
    }

    #[test]
    fn response_falls_back_to_annotation() {
        let resp: OcrResponse =
            serde_json::from_value(json!({"pages": [], "document_annotation": "note"})).unwrap();
        assert_eq!(resp.into_text(), "note");
    }

    #[test]
    fn auth_errors_are_not_retried() {
        assert!(!is_retryable(&DocMatrixError::AuthError {
            service: "x".into(),
            detail: "bad key".into()
        }));
        assert!(is_retryable(&DocMatrixError::RateLimited {
            service: "x".into(),
            retry_after_secs: None
        }));
        assert!(is_retryable(&DocMatrixError::OcrFailed {
            message: "HTTP 503 Service Unavailable: busy".into()
        }));
        assert!(!is_retryable(&DocMatrixError::OcrFailed {
            message: "HTTP 400 Bad Request: nope".into()
        }));
    }

    #[test]
    fn missing_key_is_not_configured() {
        let config = ConversionConfig::default();
        let err = HttpOcrEngine::from_config(&config).unwrap_err();
        assert!(matches!(err, DocMatrixError::OcrNotConfigured { .. }));
    }

    #[tokio::test]
    async fn extract_text_cleans_output() {
        let config = config_with(Arc::new(FixedEngine("Invoice 42\n\n\n![img-0.jpeg](img-0.jpeg)\nTotal  100")));
        let text = extract_text(png_request(), &config).await.unwrap();
        assert_eq!(text, "Invoice 42\nTotal 100");
    }

    #[tokio::test]
    async fn extract_text_rejects_garbage() {
        let config = config_with(Arc::new(FixedEngine("![img-0.jpeg](img-0.jpeg)")));
        let err = extract_text(png_request(), &config).await.unwrap_err();
        assert!(matches!(err, DocMatrixError::LowQualityOcr { .. }), "got {err:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn extract_text_times_out() {
        let config = config_with(Arc::new(SlowEngine));
        let err = extract_text(png_request(), &config).await.unwrap_err();
        assert!(matches!(err, DocMatrixError::OcrTimeout { secs: 1, .. }), "got {err:?}");
    }
}
