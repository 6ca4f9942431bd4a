//! Transfer Core Types

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::error::{ControllerError, ValidationError};
use super::events::TransferEvent;
use super::state::TransferState;
use crate::fee::FeeQuote;
use crate::money;
use crate::network::Direction;

/// Transfer ID - ULID-based unique identifier
///
/// Sortable by creation time, no coordination needed between controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransferId(ulid::Ulid);

impl TransferId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }
}

impl Default for TransferId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TransferId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(ulid::Ulid::from_string(s)?))
    }
}

impl Serialize for TransferId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

/// Opaque handle returned by the bridge service for a submitted transfer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalRef(String);

impl ExternalRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExternalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transfer request from the UI collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub direction: Direction,
    /// Amount in base units of the source network
    pub amount: u64,
    pub destination_address: String,
    /// Spendable balance of the source wallet, in the same units
    pub available_balance: u64,
}

impl TransferRequest {
    pub fn new(
        direction: Direction,
        amount: u64,
        destination_address: impl Into<String>,
        available_balance: u64,
    ) -> Self {
        Self {
            direction,
            amount,
            destination_address: destination_address.into(),
            available_balance,
        }
    }

    /// Build a request from form text (e.g. `"2.5"` SOL).
    ///
    /// Anything that is not a finite positive decimal in the source asset's
    /// precision is `InvalidAmount`.
    pub fn from_display(
        direction: Direction,
        amount: &str,
        destination_address: impl Into<String>,
        available_balance: u64,
    ) -> Result<Self, ValidationError> {
        let amount = money::parse_native(amount, direction.source())
            .map_err(|_| ValidationError::InvalidAmount)?;
        Ok(Self::new(
            direction,
            amount,
            destination_address,
            available_balance,
        ))
    }
}

/// A request that passed every validation check.
///
/// Only the validator constructs these, so holding one means the amount,
/// range, address and balance checks all succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    direction: Direction,
    destination_address: String,
    quote: FeeQuote,
}

impl ValidatedRequest {
    pub(crate) fn new(direction: Direction, destination_address: String, quote: FeeQuote) -> Self {
        Self {
            direction,
            destination_address,
            quote,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn amount(&self) -> u64 {
        self.quote.amount
    }

    pub fn destination_address(&self) -> &str {
        &self.destination_address
    }

    pub fn quote(&self) -> &FeeQuote {
        &self.quote
    }
}

/// Why a transfer ended in `Failed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    /// Signing, submit error or submit timeout
    SubmissionError(String),
    /// No finalization within the confirmation timeout
    ConfirmationTimeout,
    /// Explicit rejection by the bridge service
    Rejected(String),
    /// Unrecoverable status query error
    QueryError(String),
}

impl FailureReason {
    pub fn code(&self) -> &'static str {
        match self {
            FailureReason::SubmissionError(_) => "SUBMISSION_ERROR",
            FailureReason::ConfirmationTimeout => "CONFIRMATION_TIMEOUT",
            FailureReason::Rejected(_) => "REJECTED",
            FailureReason::QueryError(_) => "QUERY_ERROR",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::SubmissionError(e) => write!(f, "submission error: {}", e),
            FailureReason::ConfirmationTimeout => write!(f, "confirmation timeout"),
            FailureReason::Rejected(e) => write!(f, "rejected: {}", e),
            FailureReason::QueryError(e) => write!(f, "query error: {}", e),
        }
    }
}

/// Phase reported by the bridge service for a submitted transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemotePhase {
    /// Received, not yet seen on the source network
    Pending,
    /// Included on the source network (first acknowledgment)
    Included,
    /// Service considers the transfer complete
    Confirmed,
    /// Service refused the transfer
    Rejected(String),
    /// Anything the client could not classify
    Unknown(String),
}

/// One status observation from the bridge service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub phase: RemotePhase,
    /// Validator confirmations collected so far
    pub confirmations: u32,
}

impl StatusSnapshot {
    pub fn new(phase: RemotePhase, confirmations: u32) -> Self {
        Self {
            phase,
            confirmations,
        }
    }

    pub fn pending() -> Self {
        Self::new(RemotePhase::Pending, 0)
    }

    pub fn included(confirmations: u32) -> Self {
        Self::new(RemotePhase::Included, confirmations)
    }

    pub fn confirmed(confirmations: u32) -> Self {
        Self::new(RemotePhase::Confirmed, confirmations)
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::new(RemotePhase::Rejected(reason.into()), 0)
    }
}

/// What the wallet signs and the bridge service receives
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionPayload {
    pub transfer_id: TransferId,
    pub direction: Direction,
    pub amount: u64,
    pub fee: u64,
    pub network_fee: u64,
    pub source_address: String,
    pub destination_address: String,
}

impl SubmissionPayload {
    /// Canonical bytes for signing
    pub fn to_bytes(&self) -> Vec<u8> {
        // A derived Serialize over plain fields cannot fail
        serde_json::to_vec(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedSubmission {
    pub payload: SubmissionPayload,
    pub signature: Vec<u8>,
}

/// One cross-network transfer and its tracked lifecycle.
///
/// Owned by the coordinator; everything else sees snapshots.
#[derive(Debug, Clone)]
pub struct Transfer {
    pub id: TransferId,
    /// UI slot the transfer occupies until it is terminal
    pub slot: String,
    pub direction: Direction,
    pub amount: u64,
    pub fee: u64,
    pub network_fee: u64,
    pub source_address: Option<String>,
    pub destination_address: String,
    pub state: TransferState,
    pub external_ref: Option<ExternalRef>,
    /// Highest confirmation count observed
    pub confirmations: u32,
    pub failure_reason: Option<FailureReason>,
    /// Created timestamp (millis)
    pub created_at: i64,
    pub submitted_at: Option<i64>,
    pub confirmed_at: Option<i64>,
    pub finalized_at: Option<i64>,
    /// Last updated timestamp (millis)
    pub updated_at: i64,
    pub history: Vec<TransferEvent>,
}

impl Transfer {
    /// Create a new transfer in CREATED state
    pub fn new(id: TransferId, slot: impl Into<String>, request: &ValidatedRequest) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        let quote = request.quote();
        Self {
            id,
            slot: slot.into(),
            direction: request.direction(),
            amount: quote.amount,
            fee: quote.fee,
            network_fee: quote.network_fee,
            source_address: None,
            destination_address: request.destination_address().to_string(),
            state: TransferState::Created,
            external_ref: None,
            confirmations: 0,
            failure_reason: None,
            created_at: now,
            submitted_at: None,
            confirmed_at: None,
            finalized_at: None,
            updated_at: now,
            history: Vec::new(),
        }
    }

    /// Record the bridge service handle. Assigned once, never replaced.
    pub fn assign_external_ref(&mut self, external_ref: ExternalRef) -> Result<(), ControllerError> {
        if self.external_ref.is_some() {
            return Err(ControllerError::ExternalRefAlreadySet(self.id));
        }
        self.external_ref = Some(external_ref);
        Ok(())
    }

    /// Move to `to`, stamping the matching timestamp and appending the event
    /// to history. Edges outside the lifecycle graph are refused untouched.
    pub fn transition(
        &mut self,
        to: TransferState,
        reason: Option<FailureReason>,
    ) -> Result<TransferEvent, ControllerError> {
        let from = self.state;
        if !from.can_transition_to(to) {
            return Err(ControllerError::InvalidStateTransition {
                id: self.id,
                from,
                to,
            });
        }
        if to == TransferState::Submitted && self.external_ref.is_none() {
            return Err(ControllerError::InvalidStateTransition {
                id: self.id,
                from,
                to,
            });
        }

        let now = chrono::Utc::now().timestamp_millis();
        match to {
            TransferState::Submitted => self.submitted_at = Some(now),
            TransferState::Confirming => self.confirmed_at = Some(now),
            TransferState::Finalized => self.finalized_at = Some(now),
            TransferState::Failed => self.failure_reason = reason.clone(),
            TransferState::Created => {}
        }
        self.state = to;
        self.updated_at = now;

        let event = TransferEvent {
            transfer_id: self.id,
            from_state: from,
            to_state: to,
            reason,
            at: now,
        };
        self.history.push(event.clone());
        Ok(event)
    }

    pub fn snapshot(&self) -> TransferSnapshot {
        TransferSnapshot {
            id: self.id,
            direction: self.direction,
            amount: self.amount,
            fee: self.fee,
            network_fee: self.network_fee,
            source_address: self.source_address.clone(),
            destination_address: self.destination_address.clone(),
            state: self.state,
            external_ref: self.external_ref.clone(),
            confirmations: self.confirmations,
            created_at: self.created_at,
            submitted_at: self.submitted_at,
            confirmed_at: self.confirmed_at,
            finalized_at: self.finalized_at,
            failure_reason: self.failure_reason.clone(),
            history: self.history.clone(),
        }
    }
}

impl fmt::Display for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Transfer[{}] {} amount={} fee={} network_fee={} state={}",
            self.id, self.direction, self.amount, self.fee, self.network_fee, self.state
        )
    }
}

/// Flat record of a transfer for logging and export
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferSnapshot {
    pub id: TransferId,
    pub direction: Direction,
    pub amount: u64,
    pub fee: u64,
    pub network_fee: u64,
    pub source_address: Option<String>,
    pub destination_address: String,
    pub state: TransferState,
    pub external_ref: Option<ExternalRef>,
    pub confirmations: u32,
    pub created_at: i64,
    pub submitted_at: Option<i64>,
    pub confirmed_at: Option<i64>,
    pub finalized_at: Option<i64>,
    pub failure_reason: Option<FailureReason>,
    pub history: Vec<TransferEvent>,
}

impl TransferSnapshot {
    /// One JSON line for export
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
