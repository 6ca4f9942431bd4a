//! Transfer Lifecycle States

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transfer lifecycle states
///
/// ```text
/// CREATED → SUBMITTED → CONFIRMING → FINALIZED
///               ↓            ↓
///             FAILED ←───────┘
/// ```
///
/// Terminal states: FINALIZED (30), FAILED (-10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum TransferState {
    /// Validated and recorded, nothing sent yet
    Created = 0,

    /// Accepted by the bridge service, `external_ref` assigned
    Submitted = 10,

    /// Acknowledged on the source network, collecting validator confirmations
    Confirming = 20,

    /// Terminal: confirmation threshold reached
    Finalized = 30,

    /// Terminal: submission error, rejection, timeout or unrecoverable query error
    Failed = -10,
}

impl TransferState {
    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferState::Finalized | TransferState::Failed)
    }

    /// Edges of the lifecycle graph. Every non-terminal state may fail.
    pub fn can_transition_to(&self, next: TransferState) -> bool {
        use TransferState::*;
        match (self, next) {
            (Created, Submitted) | (Submitted, Confirming) | (Confirming, Finalized) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Position on the success path; `None` for `Failed`
    #[inline]
    pub fn progress(&self) -> Option<u8> {
        match self {
            TransferState::Created => Some(0),
            TransferState::Submitted => Some(1),
            TransferState::Confirming => Some(2),
            TransferState::Finalized => Some(3),
            TransferState::Failed => None,
        }
    }

    /// Numeric state ID for compact export
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(TransferState::Created),
            10 => Some(TransferState::Submitted),
            20 => Some(TransferState::Confirming),
            30 => Some(TransferState::Finalized),
            -10 => Some(TransferState::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferState::Created => "CREATED",
            TransferState::Submitted => "SUBMITTED",
            TransferState::Confirming => "CONFIRMING",
            TransferState::Finalized => "FINALIZED",
            TransferState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<i16> for TransferState {
    type Error = ();

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        TransferState::from_id(value).ok_or(())
    }
}
