//! Lifecycle events delivered to observers (UI collaborator, exporters).

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use super::state::TransferState;
use super::types::{FailureReason, TransferId};

/// Default observer queue depth; slow observers see `Lagged`
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// One state transition of one transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferEvent {
    pub transfer_id: TransferId,
    pub from_state: TransferState,
    pub to_state: TransferState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,
    /// Transition time (millis)
    pub at: i64,
}

impl TransferEvent {
    pub fn is_terminal(&self) -> bool {
        self.to_state.is_terminal()
    }
}

/// Fan-out of transfer events to any number of observers
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TransferEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransferEvent> {
        self.tx.subscribe()
    }

    /// Deliver to current observers. Having none is not an error.
    pub fn publish(&self, event: TransferEvent) {
        let transfer_id = event.transfer_id;
        if self.tx.send(event).is_err() {
            debug!(transfer_id = %transfer_id, "No observers for transfer event");
        }
    }

    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
