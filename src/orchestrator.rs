//! Batch orchestration: per-file lifecycle, progress and batch completion.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle ──validate──▶ Processing ──▶ Success
//!   │                     └───────▶ Error
//!   └──── mismatch ─────────────────▶ Error
//! ```
//!
//! Format validation runs synchronously when a batch is submitted; a file
//! that fails it never enters `Processing`. Every accepted file runs as its
//! own tokio task, so one slow or panicking file cannot hold up the others.
//!
//! ## Progress
//!
//! 10 % on entering `Processing`. Server-bound routes run a ticker that adds
//! `progress_step` every `progress_tick_ms` while progress is below
//! `progress_cap`. 100 % on success. [`FileBoard::set_progress`] ignores
//! decreases, so readers never see progress go backwards.
//!
//! ## Batch completion
//!
//! `on_batch_complete` fires at most once per batch, and only when every
//! member reached `Success`. The check runs each time a member settles; an
//! atomic flag makes the notification idempotent when two members settle
//! at the same moment.
//!
//! Once every member has settled the batch is taken off the board; its
//! final states live on in the returned [`BatchReport`].

use crate::config::ConversionConfig;
use crate::convert::run_route;
use crate::error::{DocMatrixError, FileError, FileErrorKind};
use crate::format::{SourceDocument, Tool, TOOL_MATRIX};
use crate::output::{BatchReport, ConversionResult, FileState, FileStatus};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::registry::{ConversionRegistry, Route};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Progress reported when a file enters `Processing`.
pub const START_PROGRESS: u8 = 10;

// ── File board ───────────────────────────────────────────────────────────────

/// Shared per-file state, keyed by file id.
#[derive(Debug, Default)]
pub struct FileBoard {
    inner: Mutex<BoardInner>,
}

#[derive(Debug, Default)]
struct BoardInner {
    files: HashMap<Uuid, FileState>,
    /// Submission order per batch.
    batches: HashMap<Uuid, Vec<Uuid>>,
}

impl FileBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BoardInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an idle file.
    pub fn insert(&self, state: FileState) {
        let mut inner = self.lock();
        inner.batches.entry(state.batch_id).or_default().push(state.id);
        inner.files.insert(state.id, state);
    }

    pub fn get(&self, id: Uuid) -> Option<FileState> {
        self.lock().files.get(&id).cloned()
    }

    pub fn progress(&self, id: Uuid) -> Option<u8> {
        self.lock().files.get(&id).map(|f| f.progress)
    }

    /// Raise progress to `percent` (capped at 100); returns whether it changed.
    pub fn set_progress(&self, id: Uuid, percent: u8) -> bool {
        let percent = percent.min(100);
        let mut inner = self.lock();
        match inner.files.get_mut(&id) {
            Some(file) if percent > file.progress && !file.status.is_terminal() => {
                file.progress = percent;
                true
            }
            _ => false,
        }
    }

    /// Move an idle file to `Processing`; returns false for any other state.
    pub fn start(&self, id: Uuid) -> bool {
        let mut inner = self.lock();
        match inner.files.get_mut(&id) {
            Some(file) if file.status == FileStatus::Idle => {
                file.status = FileStatus::Processing;
                true
            }
            _ => false,
        }
    }

    /// Settle a file as `Success` at 100 %.
    pub fn succeed(&self, id: Uuid, result: ConversionResult) {
        let mut inner = self.lock();
        if let Some(file) = inner.files.get_mut(&id).filter(|f| !f.status.is_terminal()) {
            file.progress = 100;
            file.status = FileStatus::Success;
            file.result = Some(result);
        }
    }

    /// Settle a file as `Error`; progress is left where it stopped.
    pub fn fail(&self, id: Uuid, error: FileError) {
        let mut inner = self.lock();
        if let Some(file) = inner.files.get_mut(&id).filter(|f| !f.status.is_terminal()) {
            file.status = FileStatus::Error;
            file.error = Some(error);
        }
    }

    /// Members of a batch in submission order.
    pub fn batch(&self, batch_id: Uuid) -> Vec<FileState> {
        let inner = self.lock();
        inner
            .batches
            .get(&batch_id)
            .map(|ids| ids.iter().filter_map(|id| inner.files.get(id).cloned()).collect())
            .unwrap_or_default()
    }

    /// Whether every member of the batch succeeded.
    pub fn batch_succeeded(&self, batch_id: Uuid) -> bool {
        let inner = self.lock();
        match inner.batches.get(&batch_id) {
            Some(ids) if !ids.is_empty() => ids.iter().all(|id| {
                inner
                    .files
                    .get(id)
                    .is_some_and(|f| f.status == FileStatus::Success)
            }),
            _ => false,
        }
    }

    /// Number of files currently tracked.
    pub fn file_count(&self) -> usize {
        self.lock().files.len()
    }

    /// Forget a batch and its files.
    pub fn remove_batch(&self, batch_id: Uuid) {
        let mut inner = self.lock();
        if let Some(ids) = inner.batches.remove(&batch_id) {
            for id in ids {
                inner.files.remove(&id);
            }
        }
    }
}

// ── Orchestrator ─────────────────────────────────────────────────────────────

/// Runs batches of files through one tool.
pub struct Orchestrator {
    registry: Arc<ConversionRegistry>,
    config: ConversionConfig,
    board: Arc<FileBoard>,
}

/// Everything a file task needs, cloned per task.
#[derive(Clone)]
struct BatchContext {
    batch_id: Uuid,
    size: usize,
    route: Route,
    tool: Tool,
    config: ConversionConfig,
    board: Arc<FileBoard>,
    callback: ProgressCallback,
    notified: Arc<AtomicBool>,
}

impl Orchestrator {
    /// An orchestrator over the built-in routes.
    ///
    /// # Errors
    /// [`DocMatrixError::RegistryIncomplete`] if an advertised tool has no route.
    pub fn new(config: ConversionConfig) -> Result<Self, DocMatrixError> {
        Self::with_registry(ConversionRegistry::standard(), config)
    }

    /// An orchestrator over custom routes, validated against [`TOOL_MATRIX`].
    pub fn with_registry(
        registry: ConversionRegistry,
        config: ConversionConfig,
    ) -> Result<Self, DocMatrixError> {
        registry.validate(&TOOL_MATRIX)?;
        Ok(Self {
            registry: Arc::new(registry),
            config,
            board: Arc::new(FileBoard::new()),
        })
    }

    pub fn board(&self) -> &FileBoard {
        &self.board
    }

    pub fn registry(&self) -> &ConversionRegistry {
        &self.registry
    }

    /// Convert `documents` with `tool` and wait for every file to settle.
    ///
    /// Per-file failures are recorded in the report, never returned; the
    /// call itself only fails when the tool has no route.
    pub async fn run_batch(
        &self,
        tool: Tool,
        documents: Vec<SourceDocument>,
    ) -> Result<BatchReport, DocMatrixError> {
        let route = self.registry.route(tool.from, tool.to)?;
        let callback = self
            .config
            .progress_callback
            .clone()
            .unwrap_or_else(|| Arc::new(NoopProgressCallback));
        let ctx = BatchContext {
            batch_id: Uuid::new_v4(),
            size: documents.len(),
            route,
            tool,
            config: self.config.clone(),
            board: Arc::clone(&self.board),
            callback,
            notified: Arc::new(AtomicBool::new(false)),
        };
        info!("Batch {}: {} files via {}", ctx.batch_id, ctx.size, tool.id());
        ctx.callback.on_batch_start(ctx.batch_id, ctx.size);

        let mut tasks: Vec<(Uuid, String, JoinHandle<()>)> = Vec::new();
        for doc in documents {
            let state = FileState::new(ctx.batch_id, doc.name.clone());
            let id = state.id;
            self.board.insert(state);

            let name = doc.name.clone();
            let doc = match doc.accept_as(tool.from) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!("'{}' rejected: {}", name, e);
                    ctx.settle_error(id, &name, FileError::from(&e));
                    continue;
                }
            };
            let task_ctx = ctx.clone();
            tasks.push((id, name, tokio::spawn(async move { task_ctx.process(id, doc).await })));
        }

        for (id, name, handle) in tasks {
            if let Err(e) = handle.await {
                warn!("'{}' task aborted: {}", name, e);
                let error = FileError::new(FileErrorKind::Internal, format!("Conversion task panicked: {e}"));
                ctx.settle_error(id, &name, error);
            }
        }

        let files = self.board.batch(ctx.batch_id);
        self.board.remove_batch(ctx.batch_id);
        let notified = ctx.notified.load(Ordering::SeqCst);
        info!(
            "Batch {} settled: {} ok, {} failed",
            ctx.batch_id,
            files.iter().filter(|f| f.status == FileStatus::Success).count(),
            files.iter().filter(|f| f.status == FileStatus::Error).count()
        );
        Ok(BatchReport {
            batch_id: ctx.batch_id,
            files,
            notified,
        })
    }
}

impl BatchContext {
    async fn process(&self, id: Uuid, doc: SourceDocument) {
        if !self.board.start(id) {
            return;
        }
        self.callback.on_file_start(id, &doc.name);
        self.raise(id, START_PROGRESS);

        let ticker = self.route.server_bound().then(|| self.spawn_ticker(id));
        let name = doc.name.clone();
        let outcome = run_route(self.route, doc, self.tool.to, &self.config).await;
        if let Some(ticker) = ticker {
            ticker.abort();
        }

        match outcome {
            Ok(result) => {
                let bytes = result.byte_len();
                self.board.succeed(id, result);
                self.callback.on_file_progress(id, 100);
                self.callback.on_file_complete(id, &name, bytes);
                self.check_batch();
            }
            Err(e) => {
                warn!("'{}' failed: {}", name, e);
                self.settle_error(id, &name, FileError::from(&e));
            }
        }
    }

    fn raise(&self, id: Uuid, percent: u8) {
        if self.board.set_progress(id, percent) {
            self.callback.on_file_progress(id, percent);
        }
    }

    fn spawn_ticker(&self, id: Uuid) -> JoinHandle<()> {
        let ctx = self.clone();
        let period = Duration::from_millis(self.config.progress_tick_ms.max(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(current) = ctx.board.progress(id) else {
                    break;
                };
                if current >= ctx.config.progress_cap {
                    break;
                }
                let next = current
                    .saturating_add(ctx.config.progress_step)
                    .min(ctx.config.progress_cap);
                debug!("file {} progress {} → {}", id, current, next);
                ctx.raise(id, next);
            }
        })
    }

    fn settle_error(&self, id: Uuid, name: &str, error: FileError) {
        let message = error.message.clone();
        self.board.fail(id, error);
        self.callback.on_file_error(id, name, &message);
        self.check_batch();
    }

    fn check_batch(&self) {
        if self.board.batch(self.batch_id).len() < self.size {
            return;
        }
        if self.board.batch_succeeded(self.batch_id) && !self.notified.swap(true, Ordering::SeqCst) {
            info!("Batch {} complete", self.batch_id);
            self.callback.on_batch_complete(self.batch_id, self.size);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{SourceFormat, TargetFormat};
    use crate::formats::Sheet;
    use crate::writers::excel::write_xlsx;

    fn idle(batch: Uuid, name: &str) -> FileState {
        FileState::new(batch, name)
    }

    #[test]
    fn progress_never_decreases() {
        let board = FileBoard::new();
        let state = idle(Uuid::new_v4(), "a.txt");
        let id = state.id;
        board.insert(state);
        assert!(board.set_progress(id, 40));
        assert!(!board.set_progress(id, 20));
        assert!(!board.set_progress(id, 40));
        assert_eq!(board.progress(id), Some(40));
        assert!(board.set_progress(id, 250));
        assert_eq!(board.progress(id), Some(100));
    }

    #[test]
    fn settled_files_are_frozen() {
        let board = FileBoard::new();
        let state = idle(Uuid::new_v4(), "a.txt");
        let id = state.id;
        board.insert(state);
        assert!(board.start(id));
        board.fail(id, FileError::new(FileErrorKind::Extraction, "corrupt"));
        board.succeed(id, ConversionResult::text("a", String::new()));
        let file = board.get(id).unwrap();
        assert_eq!(file.status, FileStatus::Error);
        assert!(file.result.is_none());
        assert!(!board.set_progress(id, 99));
        assert!(!board.start(id));
    }

    #[test]
    fn batch_success_needs_every_member() {
        let board = FileBoard::new();
        let batch = Uuid::new_v4();
        let a = idle(batch, "a");
        let b = idle(batch, "b");
        let (ida, idb) = (a.id, b.id);
        board.insert(a);
        board.insert(b);
        board.succeed(ida, ConversionResult::text("a", String::new()));
        assert!(!board.batch_succeeded(batch));
        board.succeed(idb, ConversionResult::text("b", String::new()));
        assert!(board.batch_succeeded(batch));
        let names: Vec<String> = board.batch(batch).into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["a", "b"]);
        board.remove_batch(batch);
        assert!(board.batch(batch).is_empty());
    }

    #[tokio::test]
    async fn mismatched_file_skips_processing() {
        let orchestrator = Orchestrator::new(ConversionConfig::default()).unwrap();
        let tool = Tool::new(SourceFormat::Excel, TargetFormat::Text);
        let doc = SourceDocument::text("notes.txt", "hello");
        let report = orchestrator.run_batch(tool, vec![doc]).await.unwrap();
        let file = &report.files[0];
        assert_eq!(file.status, FileStatus::Error);
        assert_eq!(file.progress, 0);
        assert_eq!(file.error.as_ref().unwrap().kind, FileErrorKind::Validation);
        assert!(!report.notified);
    }

    #[tokio::test]
    async fn settled_batches_leave_the_board() {
        let orchestrator = Orchestrator::new(ConversionConfig::default()).unwrap();
        let tool = Tool::new(SourceFormat::Text, TargetFormat::Excel);
        for round in 0..3 {
            let docs = vec![
                SourceDocument::text(format!("a{round}.txt"), "x\ty"),
                SourceDocument::text(format!("b{round}.txt"), "1\t2"),
            ];
            let report = orchestrator.run_batch(tool, docs).await.unwrap();
            assert_eq!(report.files.len(), 2);
            assert!(report.notified);
            assert!(orchestrator.board().batch(report.batch_id).is_empty());
            assert_eq!(orchestrator.board().file_count(), 0);
        }
    }

    #[tokio::test]
    async fn files_are_read_as_the_validated_format() {
        let sheet = Sheet::new("Q1", vec![vec!["total".to_string(), "42".to_string()]]);
        let bytes = write_xlsx(&[sheet]).unwrap();
        let doc = SourceDocument::new("q1.xlsx", SourceFormat::Text, bytes);
        let orchestrator = Orchestrator::new(ConversionConfig::default()).unwrap();
        let tool = Tool::new(SourceFormat::Excel, TargetFormat::Text);
        let report = orchestrator.run_batch(tool, vec![doc]).await.unwrap();
        let file = &report.files[0];
        assert_eq!(file.status, FileStatus::Success);
        let text = file.result.as_ref().and_then(|r| r.as_text()).unwrap();
        assert!(text.contains("total\t42"), "{text}");
    }

    #[tokio::test]
    async fn incomplete_registry_is_rejected() {
        let err = Orchestrator::with_registry(ConversionRegistry::empty(), ConversionConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, DocMatrixError::RegistryIncomplete { .. }));
    }
}
