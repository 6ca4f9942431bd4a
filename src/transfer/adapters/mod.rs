//! External Collaborators
//!
//! The controller never talks to a chain directly. It goes through a
//! [`BridgeService`] (submission and status of bridge transfers) and a
//! [`WalletProvider`] (source address and payload signing).

pub mod simulated;
pub mod wallet;

pub use simulated::{SimulatedBridgeService, SimulationConfig};
pub use wallet::StaticWallet;

use async_trait::async_trait;

use super::error::{QueryError, SubmissionError};
use super::types::{ExternalRef, SignedSubmission, StatusSnapshot, SubmissionPayload};
use crate::network::Network;

/// Client of the external bridge validator/relayer service
#[async_trait]
pub trait BridgeService: Send + Sync {
    /// Get service name for logging
    fn name(&self) -> &'static str;

    /// Hand a signed transfer to the bridge. Returns the service's handle.
    async fn submit(&self, submission: &SignedSubmission) -> Result<ExternalRef, SubmissionError>;

    /// Current status of a submitted transfer
    async fn get_status(&self, external_ref: &ExternalRef) -> Result<StatusSnapshot, QueryError>;
}

/// Wallet connection for the source network
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Connected address on `network`, `None` when not connected
    fn source_address(&self, network: Network) -> Option<String>;

    /// Sign a submission payload
    async fn sign(&self, payload: SubmissionPayload) -> Result<SignedSubmission, SubmissionError>;
}


#[cfg(test)]
pub use mock::{MockBridgeService, MockWallet, SubmitBehavior};
