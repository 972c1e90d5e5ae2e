//! Analysis job orchestration: document → chunks → reasoning → report.
//!
//! A job moves through
//! `Idle → Chunking → PerChunkAnalysis(i/n) → Classifying → Completed | Cancelled | Failed`.
//! Chunks are analyzed strictly in order, one reasoning call at a time. The
//! job's cancellation token is checked before every chunk and again when each
//! call returns. Cancellation never interrupts a call in flight; the call runs
//! to completion and its result is discarded. The first failing chunk fails
//! the whole job.
//!
//! Every terminal state deregisters the job from the [`JobRegistry`], even
//! when the task panics or is aborted.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use lexrisk_indexing::IndexMetadata;
use lexrisk_shared::{AnalysisConfig, AnalysisReport, Document, Identity, LexRiskError, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, warn};

use crate::collaborators::{Indexer, Reasoner};
use crate::registry::{JobHandle, JobId, JobRegistry};
use crate::{chunker, classifier};

/// Placed between per-chunk analyses in the final report.
pub const SEPARATOR: &str = "\n\n---\n\n";

// ---------------------------------------------------------------------------
// Phases & progress
// ---------------------------------------------------------------------------

/// Where a job currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Idle,
    Chunking,
    /// Analyzing chunk `current` (1-based) of `total`.
    PerChunkAnalysis { current: usize, total: usize },
    Classifying,
    Completed,
    Cancelled,
    Failed,
}

impl JobPhase {
    /// Whether the job can make no further progress.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Chunking => f.write_str("chunking"),
            Self::PerChunkAnalysis { current, total } => {
                write!(f, "analyzing chunk {current}/{total}")
            }
            Self::Classifying => f.write_str("classifying"),
            Self::Completed => f.write_str("completed"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Progress callback for reporting job status.
pub trait AnalysisProgress: Send + Sync {
    /// Called when the job enters a new phase.
    fn phase(&self, phase: &JobPhase);
    /// Called right before chunk `index` of `total` is sent for analysis.
    fn chunk_started(&self, index: usize, total: usize);
    /// Called when chunk `index` of `total` came back successfully.
    fn chunk_finished(&self, index: usize, total: usize);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl AnalysisProgress for SilentProgress {
    fn phase(&self, _phase: &JobPhase) {}
    fn chunk_started(&self, _index: usize, _total: usize) {}
    fn chunk_finished(&self, _index: usize, _total: usize) {}
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Size limits applied to every job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisOptions {
    /// Upper bound on characters per chunk.
    pub max_chunk_chars: usize,
    /// Documents longer than this are rejected before any reasoning call.
    pub max_document_chars: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self::from(&AnalysisConfig::default())
    }
}

impl From<&AnalysisConfig> for AnalysisOptions {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            max_chunk_chars: config.max_chunk_chars,
            max_document_chars: config.max_document_chars,
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Runs analysis jobs against a [`Reasoner`] and tracks them in a shared
/// [`JobRegistry`].
#[derive(Clone)]
pub struct Orchestrator {
    reasoner: Arc<dyn Reasoner>,
    registry: Arc<JobRegistry>,
    indexer: Option<Arc<dyn Indexer>>,
    progress: Arc<dyn AnalysisProgress>,
    options: AnalysisOptions,
    background: TaskTracker,
}

impl Orchestrator {
    pub fn new(
        reasoner: Arc<dyn Reasoner>,
        registry: Arc<JobRegistry>,
        options: AnalysisOptions,
    ) -> Self {
        Self {
            reasoner,
            registry,
            indexer: None,
            progress: Arc::new(SilentProgress),
            options,
            background: TaskTracker::new(),
        }
    }

    /// Send every completed document to `indexer` in the background.
    pub fn with_indexer(mut self, indexer: Arc<dyn Indexer>) -> Self {
        self.indexer = Some(indexer);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn AnalysisProgress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn options(&self) -> AnalysisOptions {
        self.options
    }

    /// Wait for background indexing calls started so far to finish.
    ///
    /// Jobs never wait on indexing; call this before shutting the runtime
    /// down so in-flight calls are not dropped.
    pub async fn wait_for_indexing(&self) {
        self.background.close();
        self.background.wait().await;
        self.background.reopen();
    }

    /// Run a job for `identity` to completion on the current task.
    ///
    /// Any job already running for `identity` is superseded.
    pub async fn analyze(&self, identity: &Identity, document: &Document) -> Result<AnalysisReport> {
        let handle = self.registry.start_job(identity);
        self.run(identity.clone(), document, handle).await
    }

    /// Register a job for `identity` and run it on a new tokio task.
    ///
    /// The job is registered before this returns, so a `cancel_job` issued
    /// right after always finds it. Must be called within a tokio runtime.
    pub fn spawn(&self, identity: Identity, document: Document) -> RunningJob {
        let handle = self.registry.start_job(&identity);
        let id = handle.id();
        let token = handle.token().clone();

        let this = self.clone();
        let task_identity = identity.clone();
        let task = tokio::spawn(async move { this.run(task_identity, &document, handle).await });

        RunningJob {
            identity,
            id,
            token,
            task,
        }
    }

    #[instrument(skip_all, fields(user = %identity, job = %handle.id(), filename = %document.filename))]
    async fn run(
        &self,
        identity: Identity,
        document: &Document,
        handle: JobHandle,
    ) -> Result<AnalysisReport> {
        let guard = JobGuard {
            registry: Arc::clone(&self.registry),
            identity: identity.clone(),
            id: handle.id(),
        };
        let start = Instant::now();

        let outcome = self.execute(document, handle.token()).await;
        drop(guard);

        let report = match outcome {
            Ok(report) => report,
            Err(LexRiskError::Cancelled) => {
                self.progress.phase(&JobPhase::Cancelled);
                info!("analysis cancelled");
                return Err(LexRiskError::Cancelled);
            }
            Err(e) => {
                self.progress.phase(&JobPhase::Failed);
                warn!(error = %e, code = e.code(), "analysis failed");
                return Err(e);
            }
        };

        self.progress.phase(&JobPhase::Completed);
        info!(
            chunks = report.chunk_count,
            document_type = %report.document_type,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "analysis complete"
        );

        if let Some(indexer) = &self.indexer {
            let indexer = Arc::clone(indexer);
            let text = document.text.clone();
            let metadata = IndexMetadata {
                filename: report.filename.clone(),
                document_type: report.document_type,
            };
            self.background.spawn(async move {
                if let Err(e) = indexer.index(&identity, &text, &metadata).await {
                    warn!(user = %identity, error = %e, "document indexing failed");
                }
            });
        }

        Ok(report)
    }

    async fn execute(
        &self,
        document: &Document,
        token: &CancellationToken,
    ) -> Result<AnalysisReport> {
        self.progress.phase(&JobPhase::Chunking);

        if document.text.trim().is_empty() {
            return Err(LexRiskError::EmptyDocument);
        }
        let chars = document.char_len();
        if chars > self.options.max_document_chars {
            return Err(LexRiskError::DocumentTooLarge {
                chars,
                max: self.options.max_document_chars,
            });
        }

        let chunks = chunker::split(&document.text, self.options.max_chunk_chars);
        let total = chunks.len();
        debug!(chunks = total, chars, "document chunked");

        let mut results = Vec::with_capacity(total);
        for chunk in &chunks {
            if token.is_cancelled() {
                return Err(LexRiskError::Cancelled);
            }

            self.progress.phase(&JobPhase::PerChunkAnalysis {
                current: chunk.index,
                total,
            });
            self.progress.chunk_started(chunk.index, total);

            let result = self.reasoner.analyze(&chunk.text).await;

            // Cancelled while the call was in flight: its result is dropped.
            if token.is_cancelled() {
                debug!(chunk = chunk.index, total, "discarding result of cancelled job");
                return Err(LexRiskError::Cancelled);
            }

            match result {
                Ok(text) => {
                    debug!(chunk = chunk.index, total, chars = text.chars().count(), "chunk analyzed");
                    self.progress.chunk_finished(chunk.index, total);
                    results.push(text);
                }
                Err(e) => {
                    warn!(chunk = chunk.index, total, error = %e, "chunk analysis failed");
                    return Err(e);
                }
            }
        }

        self.progress.phase(&JobPhase::Classifying);
        let document_type = classifier::classify(&document.text);

        Ok(AnalysisReport {
            analysis: results.join(SEPARATOR),
            document_type,
            filename: document.filename.clone(),
            timestamp: Utc::now(),
            chunk_count: total,
        })
    }
}

/// Deregisters a job when dropped, whatever way the job ended.
struct JobGuard {
    registry: Arc<JobRegistry>,
    identity: Identity,
    id: JobId,
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.registry.finish_job(&self.identity, self.id);
    }
}

// ---------------------------------------------------------------------------
// RunningJob
// ---------------------------------------------------------------------------

/// Handle to a job started with [`Orchestrator::spawn`].
#[derive(Debug)]
pub struct RunningJob {
    identity: Identity,
    id: JobId,
    token: CancellationToken,
    task: JoinHandle<Result<AnalysisReport>>,
}

impl RunningJob {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Request cancellation. The job stops at its next poll point.
    ///
    /// Unlike [`JobRegistry::cancel_job`] this leaves the upload cache alone.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the job's outcome.
    pub async fn wait(self) -> Result<AnalysisReport> {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(LexRiskError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers every chunk with "analysis #n".
    struct CountingReasoner {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Reasoner for CountingReasoner {
        async fn analyze(&self, _chunk: &str) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("analysis #{n}"))
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        events: Mutex<Vec<String>>,
    }

    impl AnalysisProgress for RecordingProgress {
        fn phase(&self, phase: &JobPhase) {
            self.events.lock().unwrap().push(phase.to_string());
        }
        fn chunk_started(&self, index: usize, total: usize) {
            self.events.lock().unwrap().push(format!("start {index}/{total}"));
        }
        fn chunk_finished(&self, index: usize, total: usize) {
            self.events.lock().unwrap().push(format!("done {index}/{total}"));
        }
    }

    fn orchestrator(max_chunk_chars: usize) -> (Orchestrator, Arc<CountingReasoner>) {
        let reasoner = Arc::new(CountingReasoner {
            calls: AtomicUsize::new(0),
        });
        let options = AnalysisOptions {
            max_chunk_chars,
            max_document_chars: 1_000,
        };
        let orch = Orchestrator::new(reasoner.clone(), Arc::new(JobRegistry::new()), options);
        (orch, reasoner)
    }

    #[test]
    fn phase_display() {
        assert_eq!(
            JobPhase::PerChunkAnalysis {
                current: 2,
                total: 3
            }
            .to_string(),
            "analyzing chunk 2/3"
        );
        assert_eq!(JobPhase::Classifying.to_string(), "classifying");
        assert!(JobPhase::Failed.is_terminal());
        assert!(!JobPhase::Chunking.is_terminal());
    }

    #[test]
    fn options_from_config() {
        let options = AnalysisOptions::default();
        assert_eq!(options.max_chunk_chars, 12_000);
        assert_eq!(options.max_document_chars, 1_000_000);
    }

    #[tokio::test]
    async fn joins_chunks_with_separator() {
        let (orch, reasoner) = orchestrator(10);
        let doc = Document::new("contract.txt", "Договор. ".repeat(3));

        let report = orch.analyze(&Identity::from("u1"), &doc).await.unwrap();

        assert_eq!(report.chunk_count, 3);
        assert_eq!(reasoner.calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            report.analysis,
            ["analysis #1", "analysis #2", "analysis #3"].join(SEPARATOR)
        );
        assert_eq!(report.filename, "contract.txt");
        assert!(!orch.registry().is_running(&Identity::from("u1")));
    }

    #[tokio::test]
    async fn whitespace_document_is_rejected() {
        let (orch, reasoner) = orchestrator(100);
        let doc = Document::new("blank.txt", "  \n\t ");

        let err = orch.analyze(&Identity::from("u1"), &doc).await.unwrap_err();

        assert!(matches!(err, LexRiskError::EmptyDocument));
        assert_eq!(reasoner.calls.load(Ordering::SeqCst), 0);
        assert_eq!(orch.registry().active_jobs(), 0);
    }

    #[tokio::test]
    async fn oversized_document_is_rejected() {
        let (orch, reasoner) = orchestrator(100);
        let doc = Document::new("huge.txt", "ж".repeat(1_001));

        let err = orch.analyze(&Identity::from("u1"), &doc).await.unwrap_err();

        assert!(matches!(
            err,
            LexRiskError::DocumentTooLarge {
                chars: 1_001,
                max: 1_000
            }
        ));
        assert_eq!(reasoner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn progress_sees_every_phase_in_order() {
        let (orch, _) = orchestrator(10);
        let progress = Arc::new(RecordingProgress::default());
        let orch = orch.with_progress(progress.clone());

        orch.analyze(&Identity::from("u1"), &Document::new("a.txt", "Приказ №1. Текст."))
            .await
            .unwrap();

        let events = progress.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "chunking",
                "analyzing chunk 1/2",
                "start 1/2",
                "done 1/2",
                "analyzing chunk 2/2",
                "start 2/2",
                "done 2/2",
                "classifying",
                "completed",
            ]
        );
    }

    #[tokio::test]
    async fn pre_cancelled_token_makes_no_calls() {
        let (orch, reasoner) = orchestrator(100);
        let identity = Identity::from("u1");
        let handle = orch.registry().start_job(&identity);
        handle.token().cancel();

        let err = orch
            .run(identity.clone(), &Document::new("a.txt", "текст"), handle)
            .await
            .unwrap_err();

        assert!(matches!(err, LexRiskError::Cancelled));
        assert_eq!(reasoner.calls.load(Ordering::SeqCst), 0);
        assert!(!orch.registry().is_running(&identity));
    }
}
