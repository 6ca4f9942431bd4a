//! Transfer Lifecycle
//!
//! Drives a cross-network transfer from request to a terminal state.
//!
//! # Architecture
//!
//! - **Validator**: pure request checks, runs before a transfer exists
//! - **Coordinator**: single owner of every active transfer; the only
//!   component that changes a transfer's state
//! - **Reconciler**: one cancellable polling task per submitted transfer,
//!   proposing status updates to the coordinator
//!
//! # State Machine
//!
//! ```text
//! CREATED → SUBMITTED → CONFIRMING → FINALIZED
//!    ↓          ↓            ↓
//!    └──────→ FAILED ←───────┘
//! ```
//!
//! # Invariants
//!
//! 1. **Monotonic**: no backward transitions; terminal states never move
//! 2. **Single Ref**: `external_ref` is set once, at submission
//! 3. **Idempotent Updates**: duplicate or stale observations are no-ops
//! 4. **Bounded Resources**: reaching a terminal state detaches the status
//!    watch exactly once and evicts the transfer to the archive

pub mod adapters;
pub mod archive;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod reconciler;
pub mod state;
pub mod types;
pub mod validator;

#[cfg(test)]
mod integration_tests;

// Re-exports for convenience
pub use adapters::{BridgeService, SimulatedBridgeService, SimulationConfig, StaticWallet, WalletProvider};
pub use coordinator::{ApplyOutcome, ControllerStats, TransferCoordinator};
pub use error::{ControllerError, QueryError, SubmissionError, ValidationError};
pub use events::{EventBus, TransferEvent};
pub use reconciler::{ReconcilerUpdate, StatusReconciler};
pub use state::TransferState;
pub use types::{
    ExternalRef, FailureReason, RemotePhase, SignedSubmission, StatusSnapshot, SubmissionPayload,
    Transfer, TransferId, TransferRequest, TransferSnapshot, ValidatedRequest,
};
pub use validator::RequestValidator;
