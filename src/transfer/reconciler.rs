//! Status Reconciler
//!
//! Turns the bridge service's pull-based status API into discrete updates for
//! the coordinator. One polling task per submitted transfer:
//!
//! ```text
//! attach(id, ref, deadline)
//!   └─ loop: tick ── get_status ──> Update::Status
//!            deadline ───────────> Update::TimedOut
//!            cancelled ──────────> exit
//! ```
//!
//! The reconciler never mutates a transfer. It only proposes updates; the
//! coordinator decides what they mean.

use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::adapters::BridgeService;
use super::error::QueryError;
use super::types::{ExternalRef, StatusSnapshot, TransferId};

/// Observation proposed to the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcilerUpdate {
    Status {
        transfer_id: TransferId,
        snapshot: StatusSnapshot,
    },
    QueryFailed {
        transfer_id: TransferId,
        error: QueryError,
    },
    TimedOut {
        transfer_id: TransferId,
    },
}

impl ReconcilerUpdate {
    pub fn transfer_id(&self) -> TransferId {
        match self {
            ReconcilerUpdate::Status { transfer_id, .. }
            | ReconcilerUpdate::QueryFailed { transfer_id, .. }
            | ReconcilerUpdate::TimedOut { transfer_id } => *transfer_id,
        }
    }
}

pub struct StatusReconciler {
    service: Arc<dyn BridgeService>,
    updates: mpsc::UnboundedSender<ReconcilerUpdate>,
    poll_interval: Duration,
    watches: DashMap<TransferId, CancellationToken>,
    /// Parent of every watch token
    shutdown: CancellationToken,
    attached_total: AtomicU64,
    detached_total: AtomicU64,
}

impl StatusReconciler {
    pub fn new(
        service: Arc<dyn BridgeService>,
        updates: mpsc::UnboundedSender<ReconcilerUpdate>,
        poll_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            service,
            updates,
            poll_interval,
            watches: DashMap::new(),
            shutdown,
            attached_total: AtomicU64::new(0),
            detached_total: AtomicU64::new(0),
        }
    }

    /// Start watching `external_ref` until detached or `deadline` passes.
    ///
    /// Returns false if the transfer is already watched.
    pub fn attach(&self, transfer_id: TransferId, external_ref: ExternalRef, deadline: Instant) -> bool {
        if self.shutdown.is_cancelled() {
            warn!(transfer_id = %transfer_id, "Reconciler shut down, not attaching");
            return false;
        }

        let token = self.shutdown.child_token();
        match self.watches.entry(transfer_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                warn!(transfer_id = %transfer_id, "Transfer already attached");
                return false;
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(token.clone());
            }
        }
        self.attached_total.fetch_add(1, Ordering::Relaxed);

        info!(
            transfer_id = %transfer_id,
            external_ref = %external_ref,
            service = self.service.name(),
            "Attached status watch"
        );

        let watch = Watch {
            transfer_id,
            external_ref,
            service: self.service.clone(),
            updates: self.updates.clone(),
            poll_interval: self.poll_interval,
            deadline,
            token,
        };
        tokio::spawn(watch.run());
        true
    }

    /// Stop watching. Returns false if the transfer was not attached.
    pub fn detach(&self, transfer_id: TransferId) -> bool {
        match self.watches.remove(&transfer_id) {
            Some((_, token)) => {
                token.cancel();
                self.detached_total.fetch_add(1, Ordering::Relaxed);
                debug!(transfer_id = %transfer_id, "Detached status watch");
                true
            }
            None => false,
        }
    }

    pub fn is_attached(&self, transfer_id: TransferId) -> bool {
        self.watches.contains_key(&transfer_id)
    }

    pub fn active_watches(&self) -> usize {
        self.watches.len()
    }

    pub fn attached_total(&self) -> u64 {
        self.attached_total.load(Ordering::Relaxed)
    }

    pub fn detached_total(&self) -> u64 {
        self.detached_total.load(Ordering::Relaxed)
    }

    /// Cancel every watch
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.watches.clear();
    }
}

struct Watch {
    transfer_id: TransferId,
    external_ref: ExternalRef,
    service: Arc<dyn BridgeService>,
    updates: mpsc::UnboundedSender<ReconcilerUpdate>,
    poll_interval: Duration,
    deadline: Instant,
    token: CancellationToken,
}

impl Watch {
    async fn run(self) {
        let transfer_id = self.transfer_id;
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let expiry = tokio::time::sleep_until(self.deadline);
        tokio::pin!(expiry);

        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                _ = &mut expiry => {
                    self.send(ReconcilerUpdate::TimedOut { transfer_id });
                    break;
                }
                _ = ticker.tick() => {}
            }

            // The query itself is a suspension point: it must not outlive
            // cancellation or the deadline.
            let result = tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                _ = &mut expiry => {
                    self.send(ReconcilerUpdate::TimedOut { transfer_id });
                    break;
                }
                result = self.service.get_status(&self.external_ref) => result,
            };

            match result {
                Ok(snapshot) => {
                    if !self.send(ReconcilerUpdate::Status {
                        transfer_id,
                        snapshot,
                    }) {
                        break;
                    }
                }
                Err(e) if e.is_transient() => {
                    warn!(
                        transfer_id = %transfer_id,
                        external_ref = %self.external_ref,
                        error = %e,
                        "Status query failed, retrying next poll"
                    );
                }
                Err(e) => {
                    warn!(
                        transfer_id = %transfer_id,
                        external_ref = %self.external_ref,
                        error = %e,
                        "Status query failed permanently"
                    );
                    self.send(ReconcilerUpdate::QueryFailed {
                        transfer_id,
                        error: e,
                    });
                    break;
                }
            }
        }

        debug!(transfer_id = %transfer_id, "Status watch stopped");
    }

    fn send(&self, update: ReconcilerUpdate) -> bool {
        if self.updates.send(update).is_err() {
            debug!(transfer_id = %self.transfer_id, "Update channel closed");
            return false;
        }
        true
    }
}
