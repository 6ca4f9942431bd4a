//! Fixed-address wallet for the demo binary and simulation runs.

use async_trait::async_trait;

use super::WalletProvider;
use crate::network::Network;
use crate::transfer::error::SubmissionError;
use crate::transfer::types::{SignedSubmission, SubmissionPayload};

/// Wallet with one preconfigured address per network.
///
/// Signatures are a digest of the payload bytes; the simulated bridge
/// service does not verify them.
#[derive(Debug, Clone, Default)]
pub struct StaticWallet {
    solana: Option<String>,
    qubic: Option<String>,
}

impl StaticWallet {
    pub fn new(solana: Option<String>, qubic: Option<String>) -> Self {
        Self { solana, qubic }
    }

    /// Deterministic demo addresses derived from a label
    pub fn demo(label: &str) -> Self {
        let sol = md5::compute(format!("sol_{}", label));
        let qubic = md5::compute(format!("qubic_{}", label));

        let mut pubkey = [0u8; 32];
        pubkey[..16].copy_from_slice(&sol.0);
        pubkey[16..].copy_from_slice(&sol.0);

        let identity: String = qubic
            .0
            .iter()
            .cycle()
            .take(crate::network::QUBIC_IDENTITY_LEN)
            .map(|b| (b'A' + b % 26) as char)
            .collect();

        Self {
            solana: Some(bs58::encode(pubkey).into_string()),
            qubic: Some(identity),
        }
    }
}

#[async_trait]
impl WalletProvider for StaticWallet {
    fn source_address(&self, network: Network) -> Option<String> {
        match network {
            Network::Solana => self.solana.clone(),
            Network::Qubic => self.qubic.clone(),
        }
    }

    async fn sign(&self, payload: SubmissionPayload) -> Result<SignedSubmission, SubmissionError> {
        let network = payload.direction.source();
        match self.source_address(network) {
            Some(address) if address == payload.source_address => {}
            _ => {
                return Err(SubmissionError::Signing(format!(
                    "no {} key for {}",
                    network, payload.source_address
                )));
            }
        }
        let digest = md5::compute(payload.to_bytes());
        Ok(SignedSubmission {
            payload,
            signature: digest.0.to_vec(),
        })
    }
}
