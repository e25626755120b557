//! Pdfium binding.
//!
//! ## Why not `Pdfium::default()`?
//!
//! `Pdfium::default()` panics when no library is found. Every PDF stage in
//! this crate runs inside a batch next to other files, so a missing library
//! must surface as a per-file [`DocMatrixError::PdfiumBindingFailed`] rather
//! than take the worker down.
//!
//! ## Search order
//!
//! 1. `PDFIUM_LIB_PATH` (a library file or a directory containing one)
//! 2. the current working directory
//! 3. the system library path

use crate::error::DocMatrixError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming a pdfium library file or directory.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Bind to a pdfium library following the documented search order.
///
/// Call from blocking contexts only.
pub fn bind_pdfium() -> Result<Pdfium, DocMatrixError> {
    let mut failures = Vec::new();

    for candidate in candidate_paths() {
        match Pdfium::bind_to_library(&candidate) {
            Ok(bindings) => {
                debug!("Bound pdfium from {}", candidate.display());
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => failures.push(format!("{}: {e:?}", candidate.display())),
        }
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => {
            debug!("Bound system pdfium");
            Ok(Pdfium::new(bindings))
        }
        Err(e) => {
            failures.push(format!("system: {e:?}"));
            Err(DocMatrixError::PdfiumBindingFailed(failures.join("; ")))
        }
    }
}

/// Library paths to try before the system library, in order.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Ok(value) = std::env::var(PDFIUM_LIB_PATH_ENV) {
        if !value.trim().is_empty() {
            paths.push(resolve_library_path(Path::new(value.trim())));
        }
    }
    paths.push(Pdfium::pdfium_platform_library_name_at_path("./"));
    paths
}

/// A directory resolves to the platform library name inside it.
fn resolve_library_path(path: &Path) -> PathBuf {
    if path.is_dir() {
        Pdfium::pdfium_platform_library_name_at_path(path)
    } else {
        path.to_path_buf()
    }
}

/// Whether a pdfium library can be bound in this process.
pub fn pdfium_available() -> bool {
    bind_pdfium().is_ok()
}
