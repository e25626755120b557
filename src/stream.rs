//! Streaming batch API: emit file states as conversions settle.
//!
//! ## Why stream?
//!
//! A batch of scans behind an OCR service can take minutes. A stream lets
//! callers write each output as soon as it is ready instead of waiting for
//! the slowest file, with at most `config.concurrency` files in flight.
//!
//! Unlike [`crate::orchestrator::Orchestrator::run_batch`], which returns
//! after every file settles, [`convert_stream`] yields each settled
//! [`FileState`] in completion order (not submission order). The stream
//! does not fire batch notifications.

use crate::config::ConversionConfig;
use crate::error::{DocMatrixError, FileError};
use crate::format::{SourceDocument, Tool};
use crate::output::{FileState, FileStatus};
use crate::registry::ConversionRegistry;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::{info, warn};
use uuid::Uuid;

/// A boxed stream of settled file states.
pub type FileStream = Pin<Box<dyn Stream<Item = FileState> + Send>>;

/// Convert `documents` with `tool`, yielding each file as it settles.
///
/// Files that fail format validation are yielded as errors without being
/// converted.
///
/// # Errors
/// Fails up front only when the tool has no route.
pub fn convert_stream(
    tool: Tool,
    documents: Vec<SourceDocument>,
    config: &ConversionConfig,
) -> Result<FileStream, DocMatrixError> {
    let registry = ConversionRegistry::standard();
    let route = registry.route(tool.from, tool.to)?;
    let batch_id = Uuid::new_v4();
    let concurrency = config.concurrency.max(1);
    let config = Arc::new(config.clone());
    info!(
        "Streaming {} files via {} (concurrency {})",
        documents.len(),
        tool.id(),
        concurrency
    );

    let s = stream::iter(documents.into_iter().map(move |doc| {
        let config = Arc::clone(&config);
        async move {
            let mut state = FileState::new(batch_id, doc.name.clone());
            let doc = match doc.accept_as(tool.from) {
                Ok(doc) => doc,
                Err(e) => return settle_error(state, &e),
            };
            state.status = FileStatus::Processing;
            let name = doc.name.clone();
            match crate::convert::run_route(route, doc, tool.to, &config).await {
                Ok(result) => {
                    state.status = FileStatus::Success;
                    state.progress = 100;
                    state.result = Some(result);
                    state
                }
                Err(e) => {
                    warn!("'{}' failed: {}", name, e);
                    settle_error(state, &e)
                }
            }
        }
    }))
    .buffer_unordered(concurrency);

    Ok(Box::pin(s))
}

fn settle_error(mut state: FileState, error: &DocMatrixError) -> FileState {
    state.status = FileStatus::Error;
    state.error = Some(FileError::from(error));
    state
}
