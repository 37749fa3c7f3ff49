use async_trait::async_trait;
use dispatcher::constants::{BATCH_KEY_PREFIX, BATCH_LEASE_PREFIX};
use dispatcher::error::EngagementError;
use dispatcher::models::{ActionType, BatchState, BatchSummary, Reaction, Signer};
use dispatcher::services::batch::{batch_key, batch_lease_key};
use dispatcher::services::{BatchLogSink, BatchOutcome, BatchProcessor, EngagementApi};
use dispatcher::store::{LockStore, MemoryLockStore};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::time::{Duration, Instant};

const CAST: &str = "0x71d5225f77e0164388b1d4c120825f3a2c1f131c";

#[derive(Default)]
struct RecordingApi {
    calls: Mutex<Vec<(u64, Reaction)>>,
    failing_signers: HashSet<String>,
}

#[async_trait]
impl EngagementApi for RecordingApi {
    async fn react(
        &self,
        signer_uuid: &str,
        reaction: Reaction,
        _cast_hash: &str,
        _target_fid: Option<u64>,
    ) -> Result<(), EngagementError> {
        let fid: u64 = signer_uuid.trim_start_matches("signer-").parse().unwrap();
        self.calls.lock().unwrap().push((fid, reaction));
        if self.failing_signers.contains(signer_uuid) {
            return Err(EngagementError::Api { status: 403, body: "signer revoked".to_string() });
        }
        Ok(())
    }
}

#[derive(Default)]
struct RecordingSink {
    summaries: Mutex<Vec<BatchSummary>>,
    fail: bool,
}

#[async_trait]
impl BatchLogSink for RecordingSink {
    async fn record_summary(&self, summary: &BatchSummary) -> anyhow::Result<()> {
        if self.fail {
            return Err(anyhow::anyhow!("database unavailable"));
        }
        self.summaries.lock().unwrap().push(summary.clone());
        Ok(())
    }
}

fn signer(fid: u64, permissions: &[&str]) -> Signer {
    Signer {
        fid,
        signer_uuid: format!("signer-{}", fid),
        permissions: permissions.iter().map(|p| p.to_string()).collect(),
        status: "approved".to_string(),
        follower_count: Some(100),
    }
}

fn signers(n: u64) -> Vec<Signer> {
    (1..=n).map(|fid| signer(fid, &["like", "recast"])).collect()
}

struct Harness {
    store: Arc<MemoryLockStore>,
    api: Arc<RecordingApi>,
    sink: Arc<RecordingSink>,
    processor: BatchProcessor,
}

fn harness(api: RecordingApi, sink: RecordingSink) -> Harness {
    let store = Arc::new(MemoryLockStore::new());
    let api = Arc::new(api);
    let sink = Arc::new(sink);
    let processor = BatchProcessor::new(store.clone(), api.clone(), sink.clone()).with_signer_delay(Duration::ZERO);
    Harness { store, api, sink, processor }
}

async fn load_state(store: &MemoryLockStore, batch_id: &str) -> Option<BatchState> {
    store
        .get(&batch_key(batch_id))
        .await
        .unwrap()
        .map(|raw| serde_json::from_str(&raw).unwrap())
}

#[tokio::test]
async fn twelve_signers_drain_in_three_passes() {
    let h = harness(RecordingApi::default(), RecordingSink::default());
    let (batch_id, kept) = h
        .processor
        .enqueue(CAST, ActionType::Like, Some(3), signers(12))
        .await
        .unwrap();
    assert_eq!(kept, 12);

    let reports = h.processor.run_pass().await.unwrap();
    assert_eq!(reports.len(), 1);
    assert!(matches!(reports[0].outcome, BatchOutcome::Advanced { current_index: 5, total: 12 }));
    assert_eq!(load_state(&h.store, &batch_id).await.unwrap().current_index, 5);

    h.processor.run_pass().await.unwrap();
    assert_eq!(load_state(&h.store, &batch_id).await.unwrap().current_index, 10);

    let reports = h.processor.run_pass().await.unwrap();
    match &reports[0].outcome {
        BatchOutcome::Completed { summary } => {
            assert_eq!(summary.signer_count, 12);
            assert_eq!(summary.successful, 12);
            assert_eq!(summary.failed, 0);
        }
        other => panic!("expected completion, got {:?}", other),
    }

    assert!(load_state(&h.store, &batch_id).await.is_none());
    assert!(h.store.keys_with_prefix(BATCH_KEY_PREFIX).await.unwrap().is_empty());
    assert_eq!(h.sink.summaries.lock().unwrap().len(), 1);

    // Signers were processed strictly in list order
    let fids: Vec<u64> = h.api.calls.lock().unwrap().iter().map(|(fid, _)| *fid).collect();
    assert_eq!(fids, (1..=12).collect::<Vec<_>>());

    // Nothing left for a fourth pass
    assert!(h.processor.run_pass().await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_permission_fails_without_calling_api() {
    let h = harness(RecordingApi::default(), RecordingSink::default());
    let roster = vec![signer(1, &["like"]), signer(2, &["like", "recast"])];
    h.processor.enqueue(CAST, ActionType::Both, None, roster).await.unwrap();

    let reports = h.processor.run_pass().await.unwrap();
    let BatchOutcome::Completed { summary } = &reports[0].outcome else {
        panic!("expected completion");
    };
    assert_eq!(summary.successful, 3);
    assert_eq!(summary.failed, 1);
    assert!(summary.errors[0].contains("recast permission"));

    let calls = h.api.calls.lock().unwrap().clone();
    assert_eq!(
        calls,
        vec![(1, Reaction::Like), (2, Reaction::Like), (2, Reaction::Recast)]
    );
}

#[tokio::test]
async fn api_failures_are_recorded_and_batch_continues() {
    let api = RecordingApi {
        failing_signers: ["signer-2".to_string()].into_iter().collect(),
        ..Default::default()
    };
    let h = harness(api, RecordingSink::default());
    h.processor.enqueue(CAST, ActionType::Recast, None, signers(3)).await.unwrap();

    let reports = h.processor.run_pass().await.unwrap();
    let BatchOutcome::Completed { summary } = &reports[0].outcome else {
        panic!("expected completion");
    };
    assert_eq!(summary.successful, 2);
    assert_eq!(summary.failed, 1);
    assert!(summary.errors[0].contains("403"));
}

#[tokio::test]
async fn missing_state_is_reported_not_failed() {
    let h = harness(RecordingApi::default(), RecordingSink::default());
    let report = h.processor.process_batch("gone").await;
    assert!(matches!(report.outcome, BatchOutcome::Missing));
}

#[tokio::test]
async fn unapproved_signers_are_dropped_on_enqueue() {
    let h = harness(RecordingApi::default(), RecordingSink::default());
    let mut roster = signers(3);
    roster[1].status = "revoked".to_string();

    let (batch_id, kept) = h.processor.enqueue(CAST, ActionType::Like, None, roster).await.unwrap();
    assert_eq!(kept, 2);
    let state = load_state(&h.store, &batch_id).await.unwrap();
    assert_eq!(state.signers.iter().map(|s| s.fid).collect::<Vec<_>>(), vec![1, 3]);
}

#[tokio::test]
async fn failed_summary_write_keeps_batch_for_next_pass() {
    let h = harness(RecordingApi::default(), RecordingSink { fail: true, ..Default::default() });
    let (batch_id, _) = h.processor.enqueue(CAST, ActionType::Like, None, signers(2)).await.unwrap();

    let reports = h.processor.run_pass().await.unwrap();
    assert!(matches!(reports[0].outcome, BatchOutcome::Failed { .. }));

    // Progress was checkpointed, so the retry does not re-like
    let state = load_state(&h.store, &batch_id).await.unwrap();
    assert!(state.is_complete());
    assert_eq!(h.api.calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn corrupt_state_abandons_only_that_batch() {
    let h = harness(RecordingApi::default(), RecordingSink::default());
    h.store.set(&batch_key("broken"), "{not json", None).await.unwrap();
    h.processor.enqueue(CAST, ActionType::Like, None, signers(1)).await.unwrap();

    let reports = h.processor.run_pass().await.unwrap();
    assert_eq!(reports.len(), 2);
    let broken = reports.iter().find(|r| r.batch_id == "broken").unwrap();
    assert!(matches!(broken.outcome, BatchOutcome::Failed { .. }));
    assert!(reports
        .iter()
        .any(|r| matches!(r.outcome, BatchOutcome::Completed { .. })));
}

#[tokio::test(start_paused = true)]
async fn signers_are_spaced_one_second_apart() {
    let store = Arc::new(MemoryLockStore::new());
    let processor = BatchProcessor::new(
        store,
        Arc::new(RecordingApi::default()),
        Arc::new(RecordingSink::default()),
    );
    processor.enqueue(CAST, ActionType::Like, None, signers(7)).await.unwrap();

    let started = Instant::now();
    processor.run_pass().await.unwrap();
    // Five signers, no delay after the last one
    assert_eq!(started.elapsed(), Duration::from_secs(4));
}

#[tokio::test]
async fn leased_batch_is_skipped_until_released() {
    let h = harness(RecordingApi::default(), RecordingSink::default());
    let (batch_id, _) = h.processor.enqueue(CAST, ActionType::Like, None, signers(2)).await.unwrap();
    h.store.set_if_absent(&batch_lease_key(&batch_id), "1", 120).await.unwrap();

    let report = h.processor.process_batch(&batch_id).await;
    assert!(matches!(report.outcome, BatchOutcome::InProgress));
    assert!(h.api.calls.lock().unwrap().is_empty());
    assert_eq!(load_state(&h.store, &batch_id).await.unwrap().current_index, 0);

    h.store.delete(&batch_lease_key(&batch_id)).await.unwrap();
    let report = h.processor.process_batch(&batch_id).await;
    assert!(matches!(report.outcome, BatchOutcome::Completed { .. }));
    assert!(h.store.keys_with_prefix(BATCH_LEASE_PREFIX).await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn overlapping_drivers_do_not_repeat_a_window() {
    let store = Arc::new(MemoryLockStore::new());
    let api = Arc::new(RecordingApi::default());
    let processor = BatchProcessor::new(store.clone(), api.clone(), Arc::new(RecordingSink::default()));
    let (batch_id, _) = processor.enqueue(CAST, ActionType::Like, None, signers(7)).await.unwrap();

    let (first, second) = tokio::join!(processor.run_pass(), processor.run_pass());
    let mut outcomes: Vec<BatchOutcome> = first.unwrap().into_iter().chain(second.unwrap()).map(|r| r.outcome).collect();
    outcomes.sort_by_key(|o| matches!(o, BatchOutcome::InProgress));
    assert!(matches!(outcomes[0], BatchOutcome::Advanced { current_index: 5, total: 7 }));
    assert!(matches!(outcomes[1], BatchOutcome::InProgress));

    // Each signer in the window reacted exactly once
    assert_eq!(api.calls.lock().unwrap().len(), 5);
    assert_eq!(load_state(&store, &batch_id).await.unwrap().current_index, 5);
    assert!(store.keys_with_prefix(BATCH_LEASE_PREFIX).await.unwrap().is_empty());
}
