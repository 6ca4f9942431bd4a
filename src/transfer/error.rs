//! Transfer Error Types

use thiserror::Error;

use super::state::TransferState;
use super::types::TransferId;
use crate::network::Network;

/// Request rejections, raised before any transfer exists
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Amount must be a finite positive number")]
    InvalidAmount,

    #[error("Amount {amount} outside allowed range [{min}, {max}]")]
    AmountOutOfRange { amount: u64, min: u64, max: u64 },

    #[error("Invalid {network} address: {address}")]
    InvalidAddress { network: Network, address: String },

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: u64, available: u64 },
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::InvalidAmount => "INVALID_AMOUNT",
            ValidationError::AmountOutOfRange { .. } => "AMOUNT_OUT_OF_RANGE",
            ValidationError::InvalidAddress { .. } => "INVALID_ADDRESS",
            ValidationError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
        }
    }
}

/// Errors from signing or submitting a transfer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("Bridge service rejected submission: {0}")]
    Rejected(String),

    #[error("Bridge service unavailable: {0}")]
    Unavailable(String),

    #[error("Submission timed out after {0} ms")]
    Timeout(u64),

    #[error("Signing failed: {0}")]
    Signing(String),
}

impl SubmissionError {
    pub fn code(&self) -> &'static str {
        match self {
            SubmissionError::Rejected(_) => "SUBMISSION_REJECTED",
            SubmissionError::Unavailable(_) => "SERVICE_UNAVAILABLE",
            SubmissionError::Timeout(_) => "SUBMISSION_TIMEOUT",
            SubmissionError::Signing(_) => "SIGNING_FAILED",
        }
    }
}

/// Errors from status queries
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Status service unavailable: {0}")]
    Unavailable(String),

    #[error("External reference not found: {0}")]
    NotFound(String),

    #[error("Status query failed: {0}")]
    Fatal(String),
}

impl QueryError {
    /// Transient errors are retried on the next poll
    #[inline]
    pub fn is_transient(&self) -> bool {
        matches!(self, QueryError::Unavailable(_))
    }

    pub fn code(&self) -> &'static str {
        match self {
            QueryError::Unavailable(_) => "SERVICE_UNAVAILABLE",
            QueryError::NotFound(_) => "EXTERNAL_REF_NOT_FOUND",
            QueryError::Fatal(_) => "QUERY_FAILED",
        }
    }
}

/// Errors returned by the lifecycle controller API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Bridge is paused")]
    BridgePaused,

    #[error("Slot {0} already holds an active transfer")]
    SlotBusy(String),

    #[error("Transfer not found: {0}")]
    TransferNotFound(TransferId),

    #[error("Invalid state transition for {id}: {from} -> {to}")]
    InvalidStateTransition {
        id: TransferId,
        from: TransferState,
        to: TransferState,
    },

    #[error("External reference already assigned for {0}")]
    ExternalRefAlreadySet(TransferId),

    #[error("Controller is shut down")]
    ShutDown,
}

impl ControllerError {
    pub fn code(&self) -> &'static str {
        match self {
            ControllerError::Validation(e) => e.code(),
            ControllerError::BridgePaused => "BRIDGE_PAUSED",
            ControllerError::SlotBusy(_) => "SLOT_BUSY",
            ControllerError::TransferNotFound(_) => "TRANSFER_NOT_FOUND",
            ControllerError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            ControllerError::ExternalRefAlreadySet(_) => "EXTERNAL_REF_ALREADY_SET",
            ControllerError::ShutDown => "SHUT_DOWN",
        }
    }
}
