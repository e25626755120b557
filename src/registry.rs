//! Conversion registry: `(SourceFormat, TargetFormat) → handler`.
//!
//! Every advertised tool in [`TOOL_MATRIX`] must have a handler. The
//! orchestrator and the CLI call [`ConversionRegistry::validate`] when they
//! are built, so a missing pair fails at startup instead of on the first
//! file that needs it.
//!
//! Handlers are plain synchronous functions executed inside
//! `spawn_blocking`. A server-bound handler additionally receives the OCR
//! text of the source, fetched by the async caller under the server
//! deadline before the body runs.

use crate::config::ConversionConfig;
use crate::error::DocMatrixError;
use crate::format::{SourceDocument, SourceFormat, TargetFormat, Tool, TOOL_MATRIX};
use crate::output::ConversionResult;
use std::collections::BTreeMap;
use std::fmt;

/// Body of a client-side conversion.
pub type LocalHandler =
    fn(&SourceDocument, &ConversionConfig) -> Result<ConversionResult, DocMatrixError>;

/// Body of a server-bound conversion; the `String` is the recognised text.
pub type OcrHandler =
    fn(&SourceDocument, String, &ConversionConfig) -> Result<ConversionResult, DocMatrixError>;

/// How one pair is converted.
#[derive(Clone, Copy)]
pub enum Route {
    Local(LocalHandler),
    Ocr(OcrHandler),
}

impl Route {
    /// Whether the route calls the OCR service.
    pub fn server_bound(&self) -> bool {
        matches!(self, Route::Ocr(_))
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Local(_) => f.write_str("Route::Local"),
            Route::Ocr(_) => f.write_str("Route::Ocr"),
        }
    }
}

/// Dispatch table from format pairs to routes.
#[derive(Debug, Clone, Default)]
pub struct ConversionRegistry {
    routes: BTreeMap<(SourceFormat, TargetFormat), Route>,
}

impl ConversionRegistry {
    /// A registry with no routes.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in routes for every advertised tool.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        for (from, to, route) in crate::convert::standard_routes() {
            registry.register(from, to, route);
        }
        registry
    }

    /// Add or replace the route for a pair.
    pub fn register(&mut self, from: SourceFormat, to: TargetFormat, route: Route) -> &mut Self {
        self.routes.insert((from, to), route);
        self
    }

    pub fn route(&self, from: SourceFormat, to: TargetFormat) -> Result<Route, DocMatrixError> {
        self.routes
            .get(&(from, to))
            .copied()
            .ok_or(DocMatrixError::UnsupportedConversion { from, to })
    }

    pub fn supports(&self, from: SourceFormat, to: TargetFormat) -> bool {
        self.routes.contains_key(&(from, to))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Registered pairs as tools, in format order.
    pub fn tools(&self) -> Vec<Tool> {
        self.routes.keys().map(|(from, to)| Tool::new(*from, *to)).collect()
    }

    /// Fail with [`DocMatrixError::RegistryIncomplete`] if any tool lacks a route.
    pub fn validate(&self, tools: &[Tool]) -> Result<(), DocMatrixError> {
        let missing: Vec<String> = tools
            .iter()
            .filter(|t| !self.supports(t.from, t.to))
            .map(Tool::id)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(DocMatrixError::RegistryIncomplete {
                missing: missing.join(", "),
            })
        }
    }

    /// [`standard`](Self::standard), validated against [`TOOL_MATRIX`].
    pub fn validated() -> Result<Self, DocMatrixError> {
        let registry = Self::standard();
        registry.validate(&TOOL_MATRIX)?;
        Ok(registry)
    }
}
