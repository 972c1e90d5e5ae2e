//! End-to-end job scenarios against scripted reasoning and indexing services.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lexrisk_core::{AnalysisOptions, Indexer, JobRegistry, Orchestrator, Reasoner, SEPARATOR};
use lexrisk_indexing::IndexMetadata;
use lexrisk_shared::{Document, DocumentType, Identity, LexRiskError, Result};
use tokio::sync::{Semaphore, mpsc};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Succeeds for every call except the one numbered `fail_on` (1-based).
struct ScriptedReasoner {
    calls: AtomicUsize,
    fail_on: Option<usize>,
}

impl ScriptedReasoner {
    fn new(fail_on: Option<usize>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail_on,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    async fn analyze(&self, chunk: &str) -> Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on == Some(n) {
            return Err(LexRiskError::UpstreamStatus {
                status: 502,
                body: "bad gateway".into(),
            });
        }
        Ok(format!("### Риски части {n} ({} симв.)", chunk.chars().count()))
    }
}

/// Announces each call on `entered`, then blocks until a permit is released.
struct GatedReasoner {
    calls: AtomicUsize,
    completed: AtomicUsize,
    gate: Arc<Semaphore>,
    entered: mpsc::UnboundedSender<usize>,
}

impl GatedReasoner {
    fn new() -> (Arc<Self>, Arc<Semaphore>, mpsc::UnboundedReceiver<usize>) {
        let gate = Arc::new(Semaphore::new(0));
        let (tx, rx) = mpsc::unbounded_channel();
        let reasoner = Arc::new(Self {
            calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            gate: Arc::clone(&gate),
            entered: tx,
        });
        (reasoner, gate, rx)
    }
}

#[async_trait]
impl Reasoner for GatedReasoner {
    async fn analyze(&self, _chunk: &str) -> Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.entered.send(n);
        let _permit = self.gate.acquire().await.expect("gate closed");
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(format!("gated {n}"))
    }
}

struct PanickingReasoner;

#[async_trait]
impl Reasoner for PanickingReasoner {
    async fn analyze(&self, _chunk: &str) -> Result<String> {
        panic!("reasoner exploded");
    }
}

/// Reports what it was asked to index, then fails if `fail` is set.
struct RecordingIndexer {
    seen: mpsc::UnboundedSender<(Identity, String, IndexMetadata)>,
    fail: bool,
}

#[async_trait]
impl Indexer for RecordingIndexer {
    async fn index(&self, identity: &Identity, text: &str, metadata: &IndexMetadata) -> Result<()> {
        let _ = self
            .seen
            .send((identity.clone(), text.to_string(), metadata.clone()));
        if self.fail {
            Err(LexRiskError::Indexing("embedding service returned status 500".into()))
        } else {
            Ok(())
        }
    }
}

fn orchestrator(reasoner: Arc<dyn Reasoner>) -> Orchestrator {
    Orchestrator::new(reasoner, Arc::new(JobRegistry::new()), AnalysisOptions::default())
}

fn lease_text(chars: usize) -> String {
    "Договор аренды нежилого помещения. Арендатор обязуется вносить плату ежемесячно. "
        .chars()
        .cycle()
        .take(chars)
        .collect()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn short_contract_is_one_chunk() {
    let reasoner = ScriptedReasoner::new(None);
    let orch = orchestrator(reasoner.clone());
    let user = Identity::from("u1");

    let report = orch
        .analyze(&user, &Document::new("lease.txt", lease_text(9_000)))
        .await
        .expect("analysis");

    assert_eq!(reasoner.calls(), 1);
    assert_eq!(report.chunk_count, 1);
    assert_eq!(report.document_type, DocumentType::Contract);
    assert_eq!(report.document_type.label(), "Договор");
    assert!(!report.analysis.contains(SEPARATOR));
    assert_eq!(report.filename, "lease.txt");
    assert!(!orch.registry().is_running(&user));
}

#[tokio::test]
async fn failure_on_second_chunk_stops_the_job() {
    let reasoner = ScriptedReasoner::new(Some(2));
    let orch = orchestrator(reasoner.clone());
    let user = Identity::from("u1");

    let err = orch
        .analyze(&user, &Document::new("big.txt", "x".repeat(25_000)))
        .await
        .unwrap_err();

    assert!(matches!(err, LexRiskError::UpstreamStatus { status: 502, .. }));
    assert_eq!(reasoner.calls(), 2, "chunk 3 must never be attempted");
    assert_eq!(orch.registry().active_jobs(), 0);
}

#[tokio::test]
async fn three_chunks_join_in_order() {
    let reasoner = ScriptedReasoner::new(None);
    let orch = orchestrator(reasoner.clone());

    let report = orch
        .analyze(&Identity::from("u1"), &Document::new("big.txt", "x".repeat(25_000)))
        .await
        .unwrap();

    assert_eq!(report.chunk_count, 3);
    let parts: Vec<&str> = report.analysis.split(SEPARATOR).collect();
    assert_eq!(
        parts,
        vec![
            "### Риски части 1 (12000 симв.)",
            "### Риски части 2 (12000 симв.)",
            "### Риски части 3 (1000 симв.)",
        ]
    );
    assert_eq!(report.document_type, DocumentType::Unknown);
}

#[tokio::test]
async fn cancel_lets_in_flight_call_finish_and_discards_result() {
    let (reasoner, gate, mut entered) = GatedReasoner::new();
    let orch = orchestrator(reasoner.clone());
    let user = Identity::from("u1");
    let text = "x".repeat(25_000);

    orch.registry().set_cache(&user, text.clone());
    let job = orch.spawn(user.clone(), Document::new("big.txt", text));

    assert_eq!(timeout(WAIT, entered.recv()).await.unwrap(), Some(1));
    orch.registry().cancel_job(&user).expect("job is registered");

    // The call is still pending; the job waits for it instead of dropping it.
    tokio::task::yield_now().await;
    assert!(!job.is_finished());
    assert_eq!(reasoner.completed.load(Ordering::SeqCst), 0);

    gate.add_permits(10);
    let err = timeout(WAIT, job.wait()).await.unwrap().unwrap_err();

    assert!(matches!(err, LexRiskError::Cancelled));
    assert_eq!(reasoner.completed.load(Ordering::SeqCst), 1);
    assert_eq!(reasoner.calls.load(Ordering::SeqCst), 1, "no chunk after the cancelled one");
    assert!(orch.registry().get_cache(&user).is_none());
    assert!(!orch.registry().is_running(&user));
}

#[tokio::test]
async fn running_job_cancel_keeps_cache() {
    let (reasoner, gate, mut entered) = GatedReasoner::new();
    let orch = orchestrator(reasoner);
    let user = Identity::from("u1");

    orch.registry().set_cache(&user, "raw".into());
    let job = orch.spawn(user.clone(), Document::new("a.txt", "Решение суда"));
    timeout(WAIT, entered.recv()).await.unwrap();

    job.cancel();
    gate.add_permits(1);
    let err = timeout(WAIT, job.wait()).await.unwrap().unwrap_err();

    assert!(matches!(err, LexRiskError::Cancelled));
    assert_eq!(orch.registry().get_cache(&user).as_deref(), Some("raw"));
    assert!(!orch.registry().is_running(&user));
}

#[tokio::test]
async fn superseded_job_does_not_deregister_replacement() {
    let (reasoner, gate, mut entered) = GatedReasoner::new();
    let orch = orchestrator(reasoner);
    let user = Identity::from("u1");

    let first = orch.spawn(user.clone(), Document::new("v1.txt", "Приказ №1"));
    timeout(WAIT, entered.recv()).await.unwrap();

    let second = orch.spawn(user.clone(), Document::new("v2.txt", "Приказ №2"));
    let second_id = second.id();

    // One permit, returned after each call, lets both calls through in turn.
    gate.add_permits(1);
    let err = timeout(WAIT, first.wait()).await.unwrap().unwrap_err();
    assert!(matches!(err, LexRiskError::Cancelled));
    assert_eq!(orch.registry().active_job(&user), Some(second_id));

    timeout(WAIT, entered.recv()).await.unwrap();
    let report = timeout(WAIT, second.wait()).await.unwrap().expect("replacement completes");

    assert_eq!(report.filename, "v2.txt");
    assert_eq!(report.document_type, DocumentType::Order);
    assert!(!orch.registry().is_running(&user));
}

#[tokio::test]
async fn cancel_idle_identity_is_not_found() {
    let orch = orchestrator(ScriptedReasoner::new(None));
    let err = orch.registry().cancel_job(&Identity::from("nobody")).unwrap_err();
    assert!(matches!(err, LexRiskError::NotFound { .. }));
}

#[tokio::test]
async fn identities_run_in_parallel() {
    let (reasoner, gate, mut entered) = GatedReasoner::new();
    let orch = orchestrator(reasoner);

    let a = orch.spawn(Identity::from("alice"), Document::new("a.txt", "Закон о труде"));
    let b = orch.spawn(Identity::from("bob"), Document::new("b.txt", "Постановление №5"));

    // Both calls are in flight before either is allowed to finish.
    timeout(WAIT, entered.recv()).await.unwrap();
    timeout(WAIT, entered.recv()).await.unwrap();
    assert_eq!(orch.registry().active_jobs(), 2);

    gate.add_permits(2);
    let a = timeout(WAIT, a.wait()).await.unwrap().unwrap();
    let b = timeout(WAIT, b.wait()).await.unwrap().unwrap();

    assert_eq!(a.document_type, DocumentType::Law);
    assert_eq!(b.document_type, DocumentType::Resolution);
    assert_eq!(orch.registry().active_jobs(), 0);
}

#[tokio::test]
async fn indexer_receives_completed_document() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let indexer = Arc::new(RecordingIndexer { seen: tx, fail: false });
    let orch = orchestrator(ScriptedReasoner::new(None)).with_indexer(indexer);
    let text = lease_text(500);

    orch.analyze(&Identity::from("u1"), &Document::new("lease.txt", text.clone()))
        .await
        .unwrap();
    timeout(WAIT, orch.wait_for_indexing()).await.unwrap();

    let (identity, indexed, metadata) = rx.try_recv().expect("indexed before wait returned");
    assert_eq!(identity.as_str(), "u1");
    assert_eq!(indexed, text);
    assert_eq!(metadata.filename, "lease.txt");
    assert_eq!(metadata.document_type, DocumentType::Contract);
}

#[tokio::test]
async fn indexer_failure_does_not_fail_job() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let indexer = Arc::new(RecordingIndexer { seen: tx, fail: true });
    let orch = orchestrator(ScriptedReasoner::new(None)).with_indexer(indexer);

    let report = orch
        .analyze(&Identity::from("u1"), &Document::new("a.txt", "Решение суда"))
        .await;

    assert!(report.is_ok());
    assert!(timeout(WAIT, rx.recv()).await.unwrap().is_some());
}

#[tokio::test]
async fn indexer_not_called_for_failed_job() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let indexer = Arc::new(RecordingIndexer { seen: tx, fail: false });
    let orch = orchestrator(ScriptedReasoner::new(Some(1))).with_indexer(indexer);

    let result = orch
        .analyze(&Identity::from("u1"), &Document::new("a.txt", "Решение суда"))
        .await;

    assert!(result.is_err());
    drop(orch);
    // The only sender lived in the orchestrator, so the channel closes empty.
    assert!(timeout(WAIT, rx.recv()).await.unwrap().is_none());
}

#[tokio::test]
async fn panicking_reasoner_still_deregisters() {
    let orch = orchestrator(Arc::new(PanickingReasoner));
    let user = Identity::from("u1");

    let job = orch.spawn(user.clone(), Document::new("a.txt", "Договор"));
    let joined = tokio::spawn(job.wait()).await;

    assert!(joined.unwrap_err().is_panic());
    assert!(!orch.registry().is_running(&user));
}

/// Holds every indexing call until a permit is released.
struct BlockedIndexer {
    gate: Arc<Semaphore>,
    done: AtomicUsize,
}

#[async_trait]
impl Indexer for BlockedIndexer {
    async fn index(&self, _identity: &Identity, _text: &str, _metadata: &IndexMetadata) -> Result<()> {
        let _permit = self.gate.acquire().await.expect("gate closed");
        self.done.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn report_is_ready_before_indexing_finishes() {
    let indexer = Arc::new(BlockedIndexer {
        gate: Arc::new(Semaphore::new(0)),
        done: AtomicUsize::new(0),
    });
    let orch = orchestrator(ScriptedReasoner::new(None)).with_indexer(indexer.clone());

    let report = timeout(
        WAIT,
        orch.analyze(&Identity::from("u1"), &Document::new("a.txt", "Договор займа")),
    )
    .await
    .expect("job must not wait on indexing")
    .unwrap();
    assert_eq!(report.document_type, DocumentType::Contract);
    assert_eq!(indexer.done.load(Ordering::SeqCst), 0);

    indexer.gate.add_permits(1);
    timeout(WAIT, orch.wait_for_indexing()).await.unwrap();
    assert_eq!(indexer.done.load(Ordering::SeqCst), 1);
}
