//! Transfer Coordinator
//!
//! Sole owner of every active [`Transfer`]. Requests, submission results and
//! reconciler observations all go through here; nothing else mutates a
//! transfer's state.

use dashmap::{DashMap, DashSet};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::adapters::{BridgeService, WalletProvider};
use super::archive::TransferArchive;
use super::error::{ControllerError, SubmissionError};
use super::events::{EventBus, TransferEvent};
use super::reconciler::{ReconcilerUpdate, StatusReconciler};
use super::state::TransferState;
use super::types::{
    ExternalRef, FailureReason, RemotePhase, StatusSnapshot, SubmissionPayload, Transfer, TransferId,
    TransferRequest, TransferSnapshot,
};
use super::validator::RequestValidator;
use crate::config::{BridgeConfig, ConfigError};

/// Result of applying one status observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Number of transitions made
    Applied(usize),
    /// Confirmation count rose, no state change
    Updated,
    /// Already past what the observation reports
    Stale,
    /// Contradicts the recorded lifecycle; not applied
    Rejected,
    /// Unclassifiable or unknown transfer
    Ignored,
}

/// Aggregate view of the controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ControllerStats {
    pub active: usize,
    pub finalized: u64,
    pub failed: u64,
    /// Sum of finalized amounts (source-network base units, all directions)
    pub total_bridged: u64,
    pub total_fees: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Plan {
    Advance {
        path: Vec<TransferState>,
        confirmations: u32,
    },
    Fail(FailureReason),
    Progress(u32),
    Stale,
    Reject(&'static str),
    Ignore,
}

/// Decide what an observation means for a transfer in `state` that has seen
/// `recorded` confirmations.
fn plan(state: TransferState, recorded: u32, snapshot: &StatusSnapshot, threshold: u32) -> Plan {
    use TransferState::*;

    let observed = snapshot.confirmations;
    let reached = match &snapshot.phase {
        RemotePhase::Unknown(_) => return Plan::Ignore,
        RemotePhase::Rejected(reason) => {
            return match state {
                Submitted | Confirming => Plan::Fail(FailureReason::Rejected(reason.clone())),
                Failed => Plan::Stale,
                Created => Plan::Reject("status observed before submission"),
                Finalized => Plan::Reject("rejection reported after finalization"),
            };
        }
        _ if observed >= threshold => Finalized,
        // Confirmed short of the threshold only acknowledges
        RemotePhase::Confirmed | RemotePhase::Included => Confirming,
        RemotePhase::Pending if observed > 0 => Confirming,
        RemotePhase::Pending => Submitted,
    };

    match state {
        Created => return Plan::Reject("status observed before submission"),
        Failed => return Plan::Reject("progress reported for a failed transfer"),
        Finalized => return Plan::Stale,
        Submitted | Confirming => {}
    }

    // Out-of-order delivery of a phase already passed
    if reached.progress() < state.progress() {
        return Plan::Stale;
    }
    if observed < recorded {
        return Plan::Reject("confirmation count went backwards");
    }

    let path: Vec<TransferState> = [Confirming, Finalized]
        .into_iter()
        .filter(|next| next.progress() > state.progress() && next.progress() <= reached.progress())
        .collect();

    if !path.is_empty() {
        Plan::Advance {
            path,
            confirmations: observed,
        }
    } else if observed > recorded {
        Plan::Progress(observed)
    } else {
        Plan::Stale
    }
}

pub struct TransferCoordinator {
    validator: RequestValidator,
    service: Arc<dyn BridgeService>,
    wallet: Arc<dyn WalletProvider>,
    reconciler: StatusReconciler,
    events: EventBus,
    transfers: DashMap<TransferId, Transfer>,
    /// UI slot -> transfer occupying it
    slots: DashMap<String, TransferId>,
    submitting: DashSet<TransferId>,
    archive: Mutex<TransferArchive>,
    paused: AtomicBool,
    shutdown: CancellationToken,
    finalized: AtomicU64,
    failed: AtomicU64,
    total_bridged: AtomicU64,
    total_fees: AtomicU64,
}

impl TransferCoordinator {
    /// Validate `config`, create the coordinator and spawn its
    /// reconciliation driver.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(
        config: BridgeConfig,
        service: Arc<dyn BridgeService>,
        wallet: Arc<dyn WalletProvider>,
    ) -> Result<Arc<Self>, ConfigError> {
        config.validate()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let reconciler = StatusReconciler::new(
            service.clone(),
            tx,
            config.poll_interval(),
            shutdown.child_token(),
        );

        info!(
            service = service.name(),
            min_amount = config.min_amount,
            max_amount = config.max_amount,
            fee_rate_bps = config.fee_rate_bps,
            threshold = config.confirmation_threshold(),
            "Transfer coordinator starting"
        );

        let coordinator = Arc::new(Self {
            archive: Mutex::new(TransferArchive::new(config.archive_capacity)),
            paused: AtomicBool::new(!config.is_active),
            validator: RequestValidator::new(config),
            service,
            wallet,
            reconciler,
            events: EventBus::default(),
            transfers: DashMap::new(),
            slots: DashMap::new(),
            submitting: DashSet::new(),
            shutdown: shutdown.clone(),
            finalized: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            total_bridged: AtomicU64::new(0),
            total_fees: AtomicU64::new(0),
        });

        tokio::spawn(Self::drive(Arc::downgrade(&coordinator), rx, shutdown));
        Ok(coordinator)
    }

    /// Apply reconciler updates one at a time
    async fn drive(
        coordinator: Weak<Self>,
        mut updates: mpsc::UnboundedReceiver<ReconcilerUpdate>,
        shutdown: CancellationToken,
    ) {
        loop {
            let update = tokio::select! {
                _ = shutdown.cancelled() => break,
                update = updates.recv() => match update {
                    Some(update) => update,
                    None => break,
                },
            };
            let Some(coordinator) = coordinator.upgrade() else {
                break;
            };
            coordinator.handle_update(update);
        }
        debug!("Reconciliation driver stopped");
    }

    fn handle_update(&self, update: ReconcilerUpdate) {
        let transfer_id = update.transfer_id();
        let reason = match update {
            ReconcilerUpdate::Status { snapshot, .. } => {
                self.apply_status(transfer_id, &snapshot);
                return;
            }
            ReconcilerUpdate::QueryFailed { error, .. } => FailureReason::QueryError(error.to_string()),
            ReconcilerUpdate::TimedOut { .. } => FailureReason::ConfirmationTimeout,
        };
        if let Err(e) = self.fail(transfer_id, reason) {
            debug!(transfer_id = %transfer_id, error = %e, "Reconciler failure not applied");
        }
    }

    pub fn validator(&self) -> &RequestValidator {
        &self.validator
    }

    pub fn reconciler(&self) -> &StatusReconciler {
        &self.reconciler
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransferEvent> {
        self.events.subscribe()
    }

    pub fn pause(&self) {
        if !self.paused.swap(true, Ordering::SeqCst) {
            warn!("Bridge paused, new transfers rejected");
        }
    }

    pub fn resume(&self) {
        if self.paused.swap(false, Ordering::SeqCst) {
            info!("Bridge resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Validate `request` and record a new transfer in `slot`.
    pub fn create_transfer(
        &self,
        slot: &str,
        request: &TransferRequest,
    ) -> Result<TransferId, ControllerError> {
        if self.shutdown.is_cancelled() {
            return Err(ControllerError::ShutDown);
        }
        if self.is_paused() {
            return Err(ControllerError::BridgePaused);
        }

        let validated = self.validator.validate(request).inspect_err(|e| {
            debug!(slot = slot, code = e.code(), error = %e, "Transfer request rejected");
        })?;

        let id = TransferId::new();
        match self.slots.entry(slot.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(held) => {
                debug!(slot = slot, held_by = %held.get(), "Slot busy");
                return Err(ControllerError::SlotBusy(slot.to_string()));
            }
            dashmap::mapref::entry::Entry::Vacant(free) => {
                free.insert(id);
            }
        }

        let transfer = Transfer::new(id, slot, &validated);
        info!(
            transfer_id = %id,
            slot = slot,
            direction = %transfer.direction,
            amount = transfer.amount,
            fee = transfer.fee,
            network_fee = transfer.network_fee,
            "Transfer created"
        );
        self.transfers.insert(id, transfer);
        Ok(id)
    }

    /// Sign and submit a `Created` transfer.
    ///
    /// Signing and the service call share the submit timeout. Any error or a
    /// timeout fails the transfer; the returned state says which.
    pub async fn submit(&self, id: TransferId) -> Result<TransferState, ControllerError> {
        if self.shutdown.is_cancelled() {
            return Err(ControllerError::ShutDown);
        }
        if !self.submitting.insert(id) {
            return Err(ControllerError::InvalidStateTransition {
                id,
                from: TransferState::Created,
                to: TransferState::Submitted,
            });
        }
        let result = self.submit_inner(id).await;
        self.submitting.remove(&id);
        result
    }

    async fn submit_inner(&self, id: TransferId) -> Result<TransferState, ControllerError> {
        let payload = {
            let mut transfer = self
                .transfers
                .get_mut(&id)
                .ok_or(ControllerError::TransferNotFound(id))?;
            if transfer.state != TransferState::Created {
                return Err(ControllerError::InvalidStateTransition {
                    id,
                    from: transfer.state,
                    to: TransferState::Submitted,
                });
            }

            let network = transfer.direction.source();
            match self.wallet.source_address(network) {
                Some(address) => {
                    transfer.source_address = Some(address.clone());
                    SubmissionPayload {
                        transfer_id: id,
                        direction: transfer.direction,
                        amount: transfer.amount,
                        fee: transfer.fee,
                        network_fee: transfer.network_fee,
                        source_address: address,
                        destination_address: transfer.destination_address.clone(),
                    }
                }
                None => {
                    drop(transfer);
                    let err = SubmissionError::Signing(format!("no {} wallet connected", network));
                    return self.fail_submission(id, err);
                }
            }
        };

        let timeout = self.validator.config().submit_timeout();
        let submitted = tokio::time::timeout(timeout, async {
            let signed = self.wallet.sign(payload).await?;
            self.service.submit(&signed).await
        })
        .await;

        let external_ref = match submitted {
            Ok(Ok(external_ref)) => external_ref,
            Ok(Err(e)) => return self.fail_submission(id, e),
            Err(_) => {
                let err = SubmissionError::Timeout(timeout.as_millis() as u64);
                return self.fail_submission(id, err);
            }
        };

        let Some(mut transfer) = self.transfers.get_mut(&id) else {
            // Failed and retired while the call was in flight
            return self.orphaned_submission(id, &external_ref);
        };
        if transfer.state != TransferState::Created {
            warn!(
                transfer_id = %id,
                external_ref = %external_ref,
                state = %transfer.state,
                "Submission accepted after transfer left CREATED"
            );
            return Ok(transfer.state);
        }

        transfer.assign_external_ref(external_ref.clone())?;
        let event = transfer.transition(TransferState::Submitted, None)?;
        info!(
            transfer_id = %id,
            external_ref = %external_ref,
            service = self.service.name(),
            "Transfer submitted"
        );
        self.events.publish(event);

        // Attached under the entry lock so a concurrent terminal transition
        // cannot run its detach first.
        let deadline = Instant::now() + self.validator.config().confirmation_timeout();
        self.reconciler.attach(id, external_ref, deadline);
        Ok(TransferState::Submitted)
    }

    /// The service accepted a transfer that is no longer live. Its handle is
    /// logged and dropped; the recorded outcome stands.
    fn orphaned_submission(
        &self,
        id: TransferId,
        external_ref: &ExternalRef,
    ) -> Result<TransferState, ControllerError> {
        let archived = self
            .archive
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .map(|s| s.state);
        warn!(
            transfer_id = %id,
            external_ref = %external_ref,
            archived = archived.is_some(),
            "Submission accepted for a retired transfer, handle dropped"
        );
        archived.ok_or(ControllerError::TransferNotFound(id))
    }

    fn fail_submission(
        &self,
        id: TransferId,
        err: SubmissionError,
    ) -> Result<TransferState, ControllerError> {
        warn!(transfer_id = %id, code = err.code(), error = %err, "Submission failed");
        self.fail(id, FailureReason::SubmissionError(err.to_string()))?;
        Ok(TransferState::Failed)
    }

    /// Create a transfer and submit it in the background
    pub fn start_transfer(
        self: &Arc<Self>,
        slot: &str,
        request: &TransferRequest,
    ) -> Result<TransferId, ControllerError> {
        let id = self.create_transfer(slot, request)?;
        let coordinator = self.clone();
        tokio::spawn(async move {
            if let Err(e) = coordinator.submit(id).await {
                error!(transfer_id = %id, error = %e, "Background submission failed");
            }
        });
        Ok(id)
    }

    /// Apply one status observation for `id`.
    ///
    /// Duplicates and observations the transfer has already passed are
    /// no-ops; anything implying a backward move is refused and logged.
    pub fn apply_status(&self, id: TransferId, snapshot: &StatusSnapshot) -> ApplyOutcome {
        let threshold = self.validator.config().confirmation_threshold();
        if snapshot.phase == RemotePhase::Confirmed && snapshot.confirmations < threshold {
            warn!(
                transfer_id = %id,
                confirmations = snapshot.confirmations,
                threshold = threshold,
                "Confirmed below threshold, treated as acknowledgment"
            );
        }
        let mut emitted = Vec::new();

        let outcome = match self.transfers.get_mut(&id) {
            Some(mut transfer) => {
                let plan = plan(transfer.state, transfer.confirmations, snapshot, threshold);
                self.execute(&mut transfer, plan, &mut emitted)
            }
            None => {
                let archived = self
                    .archive
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get(id)
                    .map(|s| (s.state, s.confirmations));
                match archived {
                    Some((state, recorded)) => match plan(state, recorded, snapshot, threshold) {
                        Plan::Stale => ApplyOutcome::Stale,
                        Plan::Ignore => ApplyOutcome::Ignored,
                        other => {
                            warn!(transfer_id = %id, state = %state, plan = ?other, "Observation contradicts terminal transfer");
                            ApplyOutcome::Rejected
                        }
                    },
                    None => {
                        warn!(transfer_id = %id, "Observation for unknown transfer");
                        ApplyOutcome::Ignored
                    }
                }
            }
        };

        if emitted.last().is_some_and(TransferEvent::is_terminal) {
            self.retire(id);
        }
        outcome
    }

    fn execute(&self, transfer: &mut Transfer, plan: Plan, emitted: &mut Vec<TransferEvent>) -> ApplyOutcome {
        match plan {
            Plan::Advance {
                path,
                confirmations,
            } => {
                transfer.confirmations = confirmations;
                for to in path {
                    match self.commit(transfer, to, None) {
                        Ok(event) => emitted.push(event),
                        Err(e) => {
                            error!(transfer_id = %transfer.id, error = %e, "Planned transition refused");
                            break;
                        }
                    }
                }
                ApplyOutcome::Applied(emitted.len())
            }
            Plan::Fail(reason) => match self.commit(transfer, TransferState::Failed, Some(reason)) {
                Ok(event) => {
                    emitted.push(event);
                    ApplyOutcome::Applied(1)
                }
                Err(e) => {
                    error!(transfer_id = %transfer.id, error = %e, "Failure transition refused");
                    ApplyOutcome::Rejected
                }
            },
            Plan::Progress(confirmations) => {
                debug!(
                    transfer_id = %transfer.id,
                    confirmations = confirmations,
                    "Confirmations updated"
                );
                transfer.confirmations = confirmations;
                transfer.updated_at = chrono::Utc::now().timestamp_millis();
                ApplyOutcome::Updated
            }
            Plan::Stale => {
                debug!(transfer_id = %transfer.id, state = %transfer.state, "Stale observation");
                ApplyOutcome::Stale
            }
            Plan::Reject(why) => {
                warn!(
                    transfer_id = %transfer.id,
                    state = %transfer.state,
                    confirmations = transfer.confirmations,
                    "Observation rejected: {}", why
                );
                ApplyOutcome::Rejected
            }
            Plan::Ignore => {
                warn!(transfer_id = %transfer.id, "Unrecognised status ignored");
                ApplyOutcome::Ignored
            }
        }
    }

    /// Transition, log and publish. Caller holds the entry lock.
    fn commit(
        &self,
        transfer: &mut Transfer,
        to: TransferState,
        reason: Option<FailureReason>,
    ) -> Result<TransferEvent, ControllerError> {
        let event = transfer.transition(to, reason)?;
        match &event.reason {
            Some(reason) => warn!(
                transfer_id = %event.transfer_id,
                from = %event.from_state,
                code = reason.code(),
                "Transfer failed: {}", reason
            ),
            None => info!(
                transfer_id = %event.transfer_id,
                from = %event.from_state,
                to = %event.to_state,
                confirmations = transfer.confirmations,
                "Transfer state changed"
            ),
        }
        self.events.publish(event.clone());
        Ok(event)
    }

    /// Move a live transfer to `Failed`
    pub fn fail(&self, id: TransferId, reason: FailureReason) -> Result<TransferEvent, ControllerError> {
        let event = {
            let mut transfer = self
                .transfers
                .get_mut(&id)
                .ok_or(ControllerError::TransferNotFound(id))?;
            self.commit(&mut transfer, TransferState::Failed, Some(reason))?
        };
        self.retire(id);
        Ok(event)
    }

    /// Release everything a terminal transfer holds and archive it
    fn retire(&self, id: TransferId) {
        let Some((_, transfer)) = self.transfers.remove(&id) else {
            return;
        };
        self.slots.remove_if(&transfer.slot, |_, held| *held == id);
        self.reconciler.detach(id);

        match transfer.state {
            TransferState::Finalized => {
                self.finalized.fetch_add(1, Ordering::Relaxed);
                self.total_bridged.fetch_add(transfer.amount, Ordering::Relaxed);
                self.total_fees.fetch_add(transfer.fee, Ordering::Relaxed);
            }
            TransferState::Failed => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
            state => {
                error!(transfer_id = %id, state = %state, "Retired a non-terminal transfer");
            }
        }

        debug!(transfer_id = %id, state = %transfer.state, "Transfer archived");
        self.archive
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(transfer.snapshot());
    }

    /// Active or archived record
    pub fn snapshot(&self, id: TransferId) -> Option<TransferSnapshot> {
        if let Some(transfer) = self.transfers.get(&id) {
            return Some(transfer.snapshot());
        }
        self.archive
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn active_transfers(&self) -> Vec<TransferSnapshot> {
        let mut active: Vec<_> = self.transfers.iter().map(|t| t.snapshot()).collect();
        active.sort_by_key(|s| s.id);
        active
    }

    /// Most recent terminal transfers, newest first
    pub fn history(&self, limit: usize) -> Vec<TransferSnapshot> {
        self.archive
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recent(limit)
    }

    /// Transfer currently holding `slot`
    pub fn slot_holder(&self, slot: &str) -> Option<TransferId> {
        self.slots.get(slot).map(|id| *id)
    }

    pub fn stats(&self) -> ControllerStats {
        ControllerStats {
            active: self.transfers.len(),
            finalized: self.finalized.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            total_bridged: self.total_bridged.load(Ordering::Relaxed),
            total_fees: self.total_fees.load(Ordering::Relaxed),
        }
    }

    /// Stop the driver and every status watch. Active transfers stay as they
    /// are; new requests are refused.
    pub fn shutdown(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        info!(active = self.transfers.len(), "Transfer coordinator shutting down");
        self.reconciler.shutdown();
        self.shutdown.cancel();
    }
}

impl Drop for TransferCoordinator {
    fn drop(&mut self) {
        // Watch tokens are children of this one
        self.shutdown.cancel();
    }
}
