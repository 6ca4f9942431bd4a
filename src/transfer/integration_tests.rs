//! Integration Tests for the Transfer Lifecycle
//!
//! Full coordinator + reconciler flows against the scripted
//! MockBridgeService. Time is paused, so timeouts of minutes run instantly.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

use super::adapters::{MockBridgeService, MockWallet, SubmitBehavior};
use super::coordinator::{ApplyOutcome, TransferCoordinator};
use super::error::{ControllerError, QueryError, SubmissionError, ValidationError};
use super::events::TransferEvent;
use super::state::TransferState;
use super::types::{FailureReason, StatusSnapshot, TransferId, TransferRequest};
use crate::config::{BridgeConfig, ConfigError};
use crate::network::Direction;

const SOL_ADDR: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";

/// Coordinator wired to mock collaborators
struct TestHarness {
    coordinator: Arc<TransferCoordinator>,
    service: Arc<MockBridgeService>,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_config(BridgeConfig::default())
    }

    fn with_config(config: BridgeConfig) -> Self {
        Self::with_wallet(config, MockWallet::new())
    }

    fn with_wallet(config: BridgeConfig, wallet: MockWallet) -> Self {
        let service = Arc::new(MockBridgeService::new());
        let coordinator =
            TransferCoordinator::new(config, service.clone(), Arc::new(wallet)).unwrap();
        Self {
            coordinator,
            service,
        }
    }

    /// 5B QU to Solana against a 6B balance
    fn request() -> TransferRequest {
        TransferRequest::new(
            Direction::QubicToSolana,
            5_000_000_000,
            SOL_ADDR,
            6_000_000_000,
        )
    }

    async fn submitted(&self, slot: &str) -> TransferId {
        let id = self
            .coordinator
            .create_transfer(slot, &Self::request())
            .unwrap();
        let state = self.coordinator.submit(id).await.unwrap();
        assert_eq!(state, TransferState::Submitted);
        id
    }
}

/// Collect events for `id` until its terminal event
async fn events_until_terminal(
    rx: &mut broadcast::Receiver<TransferEvent>,
    id: TransferId,
) -> Vec<TransferEvent> {
    let mut events = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(3600), rx.recv())
            .await
            .expect("no terminal event within an hour")
            .expect("event channel closed");
        if event.transfer_id != id {
            continue;
        }
        let done = event.is_terminal();
        events.push(event);
        if done {
            return events;
        }
    }
}

fn path(events: &[TransferEvent]) -> Vec<(TransferState, TransferState)> {
    events.iter().map(|e| (e.from_state, e.to_state)).collect()
}

// ========================================================================
// Happy Path Tests
// ========================================================================

/// Flow: CREATED → SUBMITTED → CONFIRMING → FINALIZED
#[tokio::test(start_paused = true)]
async fn test_happy_path_finalizes() {
    let harness = TestHarness::new();
    let ext = MockBridgeService::external_ref(1);
    harness.service.push_status(&ext, Ok(StatusSnapshot::pending()));
    harness.service.push_status(&ext, Ok(StatusSnapshot::included(1)));
    harness.service.push_status(&ext, Ok(StatusSnapshot::confirmed(2)));

    let mut rx = harness.coordinator.subscribe();
    let id = harness.submitted("main").await;
    let events = events_until_terminal(&mut rx, id).await;

    assert_eq!(
        path(&events),
        vec![
            (TransferState::Created, TransferState::Submitted),
            (TransferState::Submitted, TransferState::Confirming),
            (TransferState::Confirming, TransferState::Finalized),
        ]
    );

    let snapshot = harness.coordinator.snapshot(id).unwrap();
    assert_eq!(snapshot.state, TransferState::Finalized);
    assert_eq!(snapshot.external_ref, Some(ext));
    assert_eq!(snapshot.confirmations, 2);
    assert_eq!(snapshot.fee, 50_000_000);
    assert!(snapshot.source_address.is_some());
    assert!(snapshot.submitted_at.is_some());
    assert!(snapshot.confirmed_at.is_some());
    assert!(snapshot.finalized_at.is_some());
    assert!(snapshot.failure_reason.is_none());
    assert_eq!(snapshot.history.len(), 3);

    // Terminal: watch released, slot freed, record archived
    let reconciler = harness.coordinator.reconciler();
    assert_eq!(reconciler.detached_total(), 1);
    assert_eq!(reconciler.active_watches(), 0);
    assert!(harness.coordinator.slot_holder("main").is_none());

    let stats = harness.coordinator.stats();
    assert_eq!(stats.active, 0);
    assert_eq!(stats.finalized, 1);
    assert_eq!(stats.total_bridged, 5_000_000_000);
    assert_eq!(stats.total_fees, 50_000_000);
    assert_eq!(harness.service.submit_count(), 1);
}

/// Service reports confirmed on the first poll: CONFIRMING is still visited
#[tokio::test(start_paused = true)]
async fn test_immediate_confirmation_passes_through_confirming() {
    let harness = TestHarness::new();
    let ext = MockBridgeService::external_ref(1);
    harness.service.push_status(&ext, Ok(StatusSnapshot::confirmed(3)));

    let mut rx = harness.coordinator.subscribe();
    let id = harness.submitted("main").await;
    let events = events_until_terminal(&mut rx, id).await;

    assert_eq!(
        path(&events),
        vec![
            (TransferState::Created, TransferState::Submitted),
            (TransferState::Submitted, TransferState::Confirming),
            (TransferState::Confirming, TransferState::Finalized),
        ]
    );
}

/// Background submission via start_transfer
#[tokio::test(start_paused = true)]
async fn test_start_transfer_runs_to_completion() {
    let harness = TestHarness::new();
    let ext = MockBridgeService::external_ref(1);
    harness.service.push_status(&ext, Ok(StatusSnapshot::included(2)));

    let mut rx = harness.coordinator.subscribe();
    let id = harness
        .coordinator
        .start_transfer("main", &TestHarness::request())
        .unwrap();
    let events = events_until_terminal(&mut rx, id).await;

    assert_eq!(events.last().unwrap().to_state, TransferState::Finalized);
}

// ========================================================================
// Submission Failure Tests
// ========================================================================

/// Submit error → FAILED(SubmissionError), nothing watched
#[tokio::test(start_paused = true)]
async fn test_submit_error_fails_transfer() {
    let harness = TestHarness::new();
    harness
        .service
        .push_submit(SubmitBehavior::Fail(SubmissionError::Unavailable(
            "503".into(),
        )));

    let mut rx = harness.coordinator.subscribe();
    let id = harness
        .coordinator
        .create_transfer("main", &TestHarness::request())
        .unwrap();
    let state = harness.coordinator.submit(id).await.unwrap();
    assert_eq!(state, TransferState::Failed);

    let event = rx.recv().await.unwrap();
    assert_eq!(event.from_state, TransferState::Created);
    assert_eq!(event.to_state, TransferState::Failed);
    assert!(matches!(
        event.reason,
        Some(FailureReason::SubmissionError(_))
    ));

    let snapshot = harness.coordinator.snapshot(id).unwrap();
    assert!(snapshot.external_ref.is_none());
    assert!(snapshot.submitted_at.is_none());
    assert_eq!(harness.coordinator.reconciler().attached_total(), 0);
    assert_eq!(harness.coordinator.stats().failed, 1);
}

/// Submit call that never answers fails after the 30s default timeout
#[tokio::test(start_paused = true)]
async fn test_submit_timeout() {
    let harness = TestHarness::new();
    harness.service.push_submit(SubmitBehavior::Hang);

    let id = harness
        .coordinator
        .create_transfer("main", &TestHarness::request())
        .unwrap();
    let start = Instant::now();
    let state = harness.coordinator.submit(id).await.unwrap();

    assert_eq!(state, TransferState::Failed);
    assert!(start.elapsed() >= Duration::from_secs(30));
    assert!(start.elapsed() < Duration::from_secs(31));

    let snapshot = harness.coordinator.snapshot(id).unwrap();
    assert_eq!(
        snapshot.failure_reason,
        Some(FailureReason::SubmissionError(
            SubmissionError::Timeout(30_000).to_string()
        ))
    );
}

#[tokio::test(start_paused = true)]
async fn test_disconnected_wallet_fails_submission() {
    let harness = TestHarness::with_wallet(BridgeConfig::default(), MockWallet::disconnected());
    let id = harness
        .coordinator
        .create_transfer("main", &TestHarness::request())
        .unwrap();

    assert_eq!(
        harness.coordinator.submit(id).await.unwrap(),
        TransferState::Failed
    );
    assert_eq!(harness.service.submit_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_signing_error_fails_submission() {
    let harness = TestHarness::with_wallet(BridgeConfig::default(), MockWallet::failing());
    let id = harness
        .coordinator
        .create_transfer("main", &TestHarness::request())
        .unwrap();

    assert_eq!(
        harness.coordinator.submit(id).await.unwrap(),
        TransferState::Failed
    );
    let snapshot = harness.coordinator.snapshot(id).unwrap();
    assert_eq!(
        snapshot.failure_reason.map(|r| r.code()),
        Some("SUBMISSION_ERROR")
    );
    assert_eq!(harness.service.submit_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_second_submit_refused() {
    let harness = TestHarness::new();
    let id = harness.submitted("main").await;

    assert!(matches!(
        harness.coordinator.submit(id).await,
        Err(ControllerError::InvalidStateTransition {
            from: TransferState::Submitted,
            to: TransferState::Submitted,
            ..
        })
    ));
    assert_eq!(harness.service.submit_count(), 1);
}

/// The service accepts after the transfer was already failed: the handle
/// is dropped and the recorded outcome stands
#[tokio::test(start_paused = true)]
async fn test_submission_accepted_after_failure_is_dropped() {
    let harness = TestHarness::new();
    harness
        .service
        .push_submit(SubmitBehavior::Delay(Duration::from_secs(10)));
    let id = harness
        .coordinator
        .create_transfer("main", &TestHarness::request())
        .unwrap();

    let coordinator = harness.coordinator.clone();
    let submit = tokio::spawn(async move { coordinator.submit(id).await });
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(harness.service.submit_count(), 1);

    harness
        .coordinator
        .fail(id, FailureReason::SubmissionError("cancelled by user".into()))
        .unwrap();
    assert_eq!(submit.await.unwrap(), Ok(TransferState::Failed));

    let snapshot = harness.coordinator.snapshot(id).unwrap();
    assert_eq!(snapshot.state, TransferState::Failed);
    assert!(snapshot.external_ref.is_none());
    assert_eq!(harness.coordinator.reconciler().attached_total(), 0);
    assert_eq!(harness.coordinator.reconciler().active_watches(), 0);
    assert_eq!(harness.coordinator.stats().failed, 1);
    assert_eq!(harness.coordinator.slot_holder("main"), None);
}

// ========================================================================
// Confirmation Timeout Tests
// ========================================================================

/// No acknowledgment within 10 minutes → FAILED(ConfirmationTimeout),
/// detach invoked exactly once
#[tokio::test(start_paused = true)]
async fn test_confirmation_timeout_detaches_once() {
    let harness = TestHarness::new();
    let mut rx = harness.coordinator.subscribe();
    let start = Instant::now();
    let id = harness.submitted("main").await;
    let events = events_until_terminal(&mut rx, id).await;

    let last = events.last().unwrap();
    assert_eq!(last.from_state, TransferState::Submitted);
    assert_eq!(last.to_state, TransferState::Failed);
    assert_eq!(last.reason, Some(FailureReason::ConfirmationTimeout));
    assert!(start.elapsed() >= Duration::from_secs(600));

    let reconciler = harness.coordinator.reconciler();
    assert_eq!(reconciler.detached_total(), 1);
    assert_eq!(reconciler.active_watches(), 0);

    // Nothing keeps polling afterwards
    let polls = harness.service.status_count();
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(harness.service.status_count(), polls);
    assert_eq!(reconciler.detached_total(), 1);
}

/// Deadline runs from submission and also covers CONFIRMING
#[tokio::test(start_paused = true)]
async fn test_confirmation_timeout_while_confirming() {
    let harness = TestHarness::new();
    let ext = MockBridgeService::external_ref(1);
    harness.service.push_status(&ext, Ok(StatusSnapshot::included(1)));

    let mut rx = harness.coordinator.subscribe();
    let id = harness.submitted("main").await;
    let events = events_until_terminal(&mut rx, id).await;

    assert_eq!(
        path(&events),
        vec![
            (TransferState::Created, TransferState::Submitted),
            (TransferState::Submitted, TransferState::Confirming),
            (TransferState::Confirming, TransferState::Failed),
        ]
    );
    assert_eq!(
        events.last().unwrap().reason,
        Some(FailureReason::ConfirmationTimeout)
    );
}

// ========================================================================
// Reconciliation Tests
// ========================================================================

/// Two "confirmed" notifications → one FINALIZED transition and event
#[tokio::test(start_paused = true)]
async fn test_duplicate_confirmed_applies_once() {
    let harness = TestHarness::new();
    let mut rx = harness.coordinator.subscribe();
    let id = harness.submitted("main").await;
    let coordinator = &harness.coordinator;

    assert_eq!(
        coordinator.apply_status(id, &StatusSnapshot::included(1)),
        ApplyOutcome::Applied(1)
    );
    assert_eq!(
        coordinator.apply_status(id, &StatusSnapshot::confirmed(2)),
        ApplyOutcome::Applied(1)
    );
    assert_eq!(
        coordinator.apply_status(id, &StatusSnapshot::confirmed(2)),
        ApplyOutcome::Stale
    );

    let mut finalized = 0;
    while let Ok(event) = rx.try_recv() {
        if event.to_state == TransferState::Finalized {
            finalized += 1;
        }
    }
    assert_eq!(finalized, 1);
    assert_eq!(coordinator.reconciler().detached_total(), 1);
    assert_eq!(coordinator.stats().finalized, 1);
}

/// Late or reordered notifications never move a transfer backward
#[tokio::test(start_paused = true)]
async fn test_out_of_order_notifications() {
    let config = BridgeConfig {
        required_signatures: 3,
        ..BridgeConfig::default()
    };
    let harness = TestHarness::with_config(config);
    let id = harness.submitted("main").await;
    let coordinator = &harness.coordinator;

    assert_eq!(
        coordinator.apply_status(id, &StatusSnapshot::included(2)),
        ApplyOutcome::Applied(1)
    );
    // pending arrives late
    assert_eq!(
        coordinator.apply_status(id, &StatusSnapshot::pending()),
        ApplyOutcome::Stale
    );
    // count drops within the same phase
    assert_eq!(
        coordinator.apply_status(id, &StatusSnapshot::included(1)),
        ApplyOutcome::Rejected
    );
    assert_eq!(
        coordinator.apply_status(id, &StatusSnapshot::included(2)),
        ApplyOutcome::Stale
    );

    let snapshot = coordinator.snapshot(id).unwrap();
    assert_eq!(snapshot.state, TransferState::Confirming);
    assert_eq!(snapshot.confirmations, 2);

    assert_eq!(
        coordinator.apply_status(id, &StatusSnapshot::included(3)),
        ApplyOutcome::Applied(1)
    );
    // rejection after finalization contradicts the terminal state
    assert_eq!(
        coordinator.apply_status(id, &StatusSnapshot::rejected("late")),
        ApplyOutcome::Rejected
    );
    assert_eq!(
        coordinator.snapshot(id).unwrap().state,
        TransferState::Finalized
    );
}

#[tokio::test(start_paused = true)]
async fn test_confirmation_progress_without_transition() {
    let config = BridgeConfig {
        required_signatures: 3,
        ..BridgeConfig::default()
    };
    let harness = TestHarness::with_config(config);
    let mut rx = harness.coordinator.subscribe();
    let id = harness.submitted("main").await;
    rx.recv().await.unwrap();

    harness
        .coordinator
        .apply_status(id, &StatusSnapshot::included(1));
    rx.recv().await.unwrap();

    assert_eq!(
        harness
            .coordinator
            .apply_status(id, &StatusSnapshot::included(2)),
        ApplyOutcome::Updated
    );
    assert!(rx.try_recv().is_err());
    assert_eq!(harness.coordinator.snapshot(id).unwrap().confirmations, 2);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_phase_ignored() {
    let harness = TestHarness::new();
    let id = harness.submitted("main").await;

    let unknown = StatusSnapshot::new(super::types::RemotePhase::Unknown("REORG".into()), 5);
    assert_eq!(
        harness.coordinator.apply_status(id, &unknown),
        ApplyOutcome::Ignored
    );
    assert_eq!(
        harness.coordinator.snapshot(id).unwrap().state,
        TransferState::Submitted
    );
    assert_eq!(
        harness
            .coordinator
            .apply_status(TransferId::new(), &StatusSnapshot::confirmed(3)),
        ApplyOutcome::Ignored
    );
}

/// Explicit rejection from the bridge service
#[tokio::test(start_paused = true)]
async fn test_rejection_fails_transfer() {
    let harness = TestHarness::new();
    let ext = MockBridgeService::external_ref(1);
    harness.service.push_status(&ext, Ok(StatusSnapshot::included(1)));
    harness
        .service
        .push_status(&ext, Ok(StatusSnapshot::rejected("invalid signature")));

    let mut rx = harness.coordinator.subscribe();
    let id = harness.submitted("main").await;
    let events = events_until_terminal(&mut rx, id).await;

    let last = events.last().unwrap();
    assert_eq!(last.from_state, TransferState::Confirming);
    assert_eq!(
        last.reason,
        Some(FailureReason::Rejected("invalid signature".into()))
    );
    assert_eq!(harness.coordinator.reconciler().detached_total(), 1);
}

/// Unrecoverable query error carries through as the failure reason
#[tokio::test(start_paused = true)]
async fn test_fatal_query_error_fails_transfer() {
    let harness = TestHarness::new();
    let ext = MockBridgeService::external_ref(1);
    harness
        .service
        .push_status(&ext, Err(QueryError::NotFound(ext.to_string())));

    let mut rx = harness.coordinator.subscribe();
    let id = harness.submitted("main").await;
    let events = events_until_terminal(&mut rx, id).await;

    assert_eq!(
        events.last().unwrap().reason,
        Some(FailureReason::QueryError(
            QueryError::NotFound("mock-1".into()).to_string()
        ))
    );
}

/// Transient outages are retried until the service answers
#[tokio::test(start_paused = true)]
async fn test_transient_query_errors_retried() {
    let harness = TestHarness::new();
    let ext = MockBridgeService::external_ref(1);
    harness
        .service
        .push_status(&ext, Err(QueryError::Unavailable("503".into())));
    harness
        .service
        .push_status(&ext, Err(QueryError::Unavailable("503".into())));
    harness.service.push_status(&ext, Ok(StatusSnapshot::confirmed(2)));

    let mut rx = harness.coordinator.subscribe();
    let id = harness.submitted("main").await;
    let events = events_until_terminal(&mut rx, id).await;

    assert_eq!(events.last().unwrap().to_state, TransferState::Finalized);
    assert_eq!(harness.service.status_count(), 3);
}

/// "Confirmed" with fewer confirmations than required is only an
/// acknowledgment
#[tokio::test(start_paused = true)]
async fn test_confirmed_below_threshold_does_not_finalize() {
    let config = BridgeConfig {
        required_signatures: 3,
        ..BridgeConfig::default()
    };
    let harness = TestHarness::with_config(config);
    let id = harness.submitted("main").await;
    let coordinator = &harness.coordinator;

    assert_eq!(
        coordinator.apply_status(id, &StatusSnapshot::confirmed(0)),
        ApplyOutcome::Applied(1)
    );
    let snapshot = coordinator.snapshot(id).unwrap();
    assert_eq!(snapshot.state, TransferState::Confirming);
    assert_eq!(snapshot.confirmations, 0);
    assert_eq!(coordinator.stats().finalized, 0);

    assert_eq!(
        coordinator.apply_status(id, &StatusSnapshot::confirmed(3)),
        ApplyOutcome::Applied(1)
    );
    assert_eq!(
        coordinator.snapshot(id).unwrap().state,
        TransferState::Finalized
    );
}

// ========================================================================
// Request Admission Tests
// ========================================================================

#[tokio::test(start_paused = true)]
async fn test_validation_error_creates_nothing() {
    let harness = TestHarness::new();
    let request = TransferRequest::new(Direction::QubicToSolana, 500_000, SOL_ADDR, u64::MAX);

    let result = harness.coordinator.create_transfer("main", &request);
    assert!(matches!(
        result,
        Err(ControllerError::Validation(
            ValidationError::AmountOutOfRange { .. }
        ))
    ));
    assert_eq!(harness.coordinator.stats().active, 0);
    assert!(harness.coordinator.slot_holder("main").is_none());
}

/// One active transfer per slot; terminal transfers release the slot
#[tokio::test(start_paused = true)]
async fn test_slot_busy_until_terminal() {
    let harness = TestHarness::new();
    let coordinator = &harness.coordinator;
    let request = TestHarness::request();

    let first = coordinator.create_transfer("main", &request).unwrap();
    assert_eq!(
        coordinator.create_transfer("main", &request),
        Err(ControllerError::SlotBusy("main".into()))
    );
    // other slots are independent
    let other = coordinator.create_transfer("side", &request).unwrap();
    assert_ne!(first, other);

    coordinator
        .fail(first, FailureReason::SubmissionError("cancelled".into()))
        .unwrap();
    assert!(coordinator.slot_holder("main").is_none());
    let again = coordinator.create_transfer("main", &request).unwrap();
    assert_eq!(coordinator.slot_holder("main"), Some(again));
}

#[tokio::test(start_paused = true)]
async fn test_paused_bridge_rejects_new_requests() {
    let harness = TestHarness::new();
    let coordinator = &harness.coordinator;
    let in_flight = harness.submitted("main").await;

    coordinator.pause();
    assert!(coordinator.is_paused());
    assert_eq!(
        coordinator.create_transfer("side", &TestHarness::request()),
        Err(ControllerError::BridgePaused)
    );
    // in-flight transfers carry on
    assert_eq!(
        coordinator.apply_status(in_flight, &StatusSnapshot::included(1)),
        ApplyOutcome::Applied(1)
    );

    coordinator.resume();
    assert!(
        coordinator
            .create_transfer("side", &TestHarness::request())
            .is_ok()
    );
}

#[tokio::test(start_paused = true)]
async fn test_inactive_config_starts_paused() {
    let config = BridgeConfig {
        is_active: false,
        ..BridgeConfig::default()
    };
    let harness = TestHarness::with_config(config);
    assert!(harness.coordinator.is_paused());
}

/// Configs the reconciler cannot run with never produce a coordinator
#[tokio::test]
async fn test_invalid_config_refused() {
    let zero_poll = BridgeConfig {
        poll_interval_ms: 0,
        ..BridgeConfig::default()
    };
    let result = TransferCoordinator::new(
        zero_poll,
        Arc::new(MockBridgeService::new()),
        Arc::new(MockWallet::new()),
    );
    assert!(matches!(result, Err(ConfigError::Invalid(_))));

    let zero_threshold = BridgeConfig {
        confirmation_threshold: Some(0),
        ..BridgeConfig::default()
    };
    let result = TransferCoordinator::new(
        zero_threshold,
        Arc::new(MockBridgeService::new()),
        Arc::new(MockWallet::new()),
    );
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

// ========================================================================
// Concurrency & Resource Tests
// ========================================================================

/// One transfer's failure never affects another in flight
#[tokio::test(start_paused = true)]
async fn test_concurrent_transfers_independent() {
    let harness = TestHarness::new();
    harness.service.push_status(
        &MockBridgeService::external_ref(1),
        Ok(StatusSnapshot::rejected("nonce reused")),
    );
    harness.service.push_status(
        &MockBridgeService::external_ref(2),
        Ok(StatusSnapshot::confirmed(2)),
    );

    let mut rx_a = harness.coordinator.subscribe();
    let mut rx_b = harness.coordinator.subscribe();
    let a = harness.submitted("a").await;
    let b = harness.submitted("b").await;

    let events_a = events_until_terminal(&mut rx_a, a).await;
    let events_b = events_until_terminal(&mut rx_b, b).await;

    assert_eq!(events_a.last().unwrap().to_state, TransferState::Failed);
    assert_eq!(events_b.last().unwrap().to_state, TransferState::Finalized);

    let stats = harness.coordinator.stats();
    assert_eq!(stats.finalized, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(harness.coordinator.reconciler().detached_total(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_active_transfers_lists_live_only() {
    let harness = TestHarness::new();
    let coordinator = &harness.coordinator;
    let a = coordinator
        .create_transfer("a", &TestHarness::request())
        .unwrap();
    let b = coordinator
        .create_transfer("b", &TestHarness::request())
        .unwrap();

    let mut expected = vec![a, b];
    expected.sort();
    let active: Vec<TransferId> = coordinator.active_transfers().iter().map(|s| s.id).collect();
    assert_eq!(active, expected);

    coordinator
        .fail(a, FailureReason::SubmissionError("abandoned".into()))
        .unwrap();
    let active = coordinator.active_transfers();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, b);
    assert_eq!(active[0].state, TransferState::Created);
}

#[tokio::test(start_paused = true)]
async fn test_archive_keeps_most_recent() {
    let config = BridgeConfig {
        archive_capacity: 2,
        ..BridgeConfig::default()
    };
    let harness = TestHarness::with_config(config);
    let coordinator = &harness.coordinator;

    let mut ids = Vec::new();
    for _ in 0..3 {
        let id = coordinator
            .create_transfer("main", &TestHarness::request())
            .unwrap();
        coordinator
            .fail(id, FailureReason::SubmissionError("abandoned".into()))
            .unwrap();
        ids.push(id);
    }

    let history = coordinator.history(10);
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, ids[2]);
    assert_eq!(history[1].id, ids[1]);
    assert!(coordinator.snapshot(ids[0]).is_none());
    assert_eq!(coordinator.stats().failed, 3);
}

#[tokio::test(start_paused = true)]
async fn test_fail_terminal_refused() {
    let harness = TestHarness::new();
    let id = harness
        .coordinator
        .create_transfer("main", &TestHarness::request())
        .unwrap();
    harness
        .coordinator
        .fail(id, FailureReason::SubmissionError("x".into()))
        .unwrap();

    assert_eq!(
        harness
            .coordinator
            .fail(id, FailureReason::ConfirmationTimeout),
        Err(ControllerError::TransferNotFound(id))
    );
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_watches() {
    let harness = TestHarness::new();
    let id = harness.submitted("main").await;
    assert!(harness.coordinator.reconciler().is_attached(id));

    harness.coordinator.shutdown();
    assert_eq!(harness.coordinator.reconciler().active_watches(), 0);
    assert_eq!(
        harness
            .coordinator
            .create_transfer("side", &TestHarness::request()),
        Err(ControllerError::ShutDown)
    );

    let polls = harness.service.status_count();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(harness.service.status_count(), polls);
}
