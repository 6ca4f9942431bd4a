//! In-process bridge service for demos and offline runs.
//!
//! Submissions are accepted after a random latency; each status query moves
//! a transfer one step further: pending, included, then one more validator
//! confirmation per poll until every validator has signed. A transfer is
//! forgotten once it has reported confirmed or rejected.

use async_trait::async_trait;
use dashmap::DashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::RangeInclusive;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

use super::BridgeService;
use crate::transfer::error::{QueryError, SubmissionError};
use crate::transfer::types::{ExternalRef, RemotePhase, SignedSubmission, StatusSnapshot};

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub validator_count: u32,
    /// Confirmations at which the service reports confirmed; every
    /// validator when unset
    pub quorum: Option<u32>,
    pub submit_latency_ms: RangeInclusive<u64>,
    /// Probability that `submit` reports the service unavailable
    pub submit_failure_rate: f64,
    /// Probability that an accepted transfer is later rejected
    pub rejection_rate: f64,
    /// Probability that a single status query fails transiently
    pub query_outage_rate: f64,
    /// Fixed seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            validator_count: 3,
            quorum: None,
            submit_latency_ms: 200..=2_000,
            submit_failure_rate: 0.1,
            rejection_rate: 0.05,
            query_outage_rate: 0.05,
            seed: None,
        }
    }
}

impl SimulationConfig {
    /// Never fails, no latency
    pub fn reliable(validator_count: u32) -> Self {
        Self {
            validator_count,
            quorum: None,
            submit_latency_ms: 0..=0,
            submit_failure_rate: 0.0,
            rejection_rate: 0.0,
            query_outage_rate: 0.0,
            seed: Some(0),
        }
    }
}

#[derive(Debug, Clone)]
struct SimulatedTransfer {
    polls: u32,
    rejected: bool,
}

pub struct SimulatedBridgeService {
    config: SimulationConfig,
    rng: Mutex<StdRng>,
    /// Transfers that have not reported a terminal phase yet
    transfers: DashMap<ExternalRef, SimulatedTransfer>,
    accepted: AtomicUsize,
    next_lock_id: AtomicU64,
}

impl SimulatedBridgeService {
    pub fn new(config: SimulationConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let first_lock_id = rng.gen_range(100_000..1_100_000);
        Self {
            config,
            rng: Mutex::new(rng),
            transfers: DashMap::new(),
            accepted: AtomicUsize::new(0),
            next_lock_id: AtomicU64::new(first_lock_id),
        }
    }

    /// Number of transfers the service has accepted
    pub fn accepted_count(&self) -> usize {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Accepted transfers still progressing
    pub fn in_flight(&self) -> usize {
        self.transfers.len()
    }

    fn roll(&self, probability: f64) -> bool {
        if probability <= 0.0 {
            return false;
        }
        match self.rng.lock() {
            Ok(mut rng) => rng.gen_bool(probability.min(1.0)),
            Err(_) => false,
        }
    }

    fn latency(&self) -> Duration {
        let range = self.config.submit_latency_ms.clone();
        let ms = match self.rng.lock() {
            Ok(mut rng) if !range.is_empty() => rng.gen_range(range),
            _ => 0,
        };
        Duration::from_millis(ms)
    }

    fn progress(transfer: &SimulatedTransfer, quorum: u32) -> StatusSnapshot {
        match transfer.polls {
            1 => StatusSnapshot::pending(),
            _ if transfer.rejected => StatusSnapshot::rejected("simulated validator rejection"),
            polls => {
                let confirmations = (polls - 1).min(quorum);
                if confirmations >= quorum {
                    StatusSnapshot::confirmed(confirmations)
                } else {
                    StatusSnapshot::included(confirmations)
                }
            }
        }
    }
}

#[async_trait]
impl BridgeService for SimulatedBridgeService {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn submit(&self, submission: &SignedSubmission) -> Result<ExternalRef, SubmissionError> {
        let latency = self.latency();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if self.roll(self.config.submit_failure_rate) {
            return Err(SubmissionError::Unavailable(
                "simulated bridge service outage".into(),
            ));
        }

        let lock_id = self.next_lock_id.fetch_add(1, Ordering::SeqCst);
        let external_ref = ExternalRef::new(format!("lock-{}", lock_id));
        let rejected = self.roll(self.config.rejection_rate);
        self.transfers.insert(
            external_ref.clone(),
            SimulatedTransfer { polls: 0, rejected },
        );
        self.accepted.fetch_add(1, Ordering::Relaxed);

        debug!(
            transfer_id = %submission.payload.transfer_id,
            external_ref = %external_ref,
            "Simulated submission accepted"
        );
        Ok(external_ref)
    }

    async fn get_status(&self, external_ref: &ExternalRef) -> Result<StatusSnapshot, QueryError> {
        if self.roll(self.config.query_outage_rate) {
            return Err(QueryError::Unavailable("simulated query outage".into()));
        }

        let snapshot = {
            let mut entry = self
                .transfers
                .get_mut(external_ref)
                .ok_or_else(|| QueryError::NotFound(external_ref.to_string()))?;
            entry.polls += 1;
            let quorum = self
                .config
                .quorum
                .unwrap_or(self.config.validator_count)
                .min(self.config.validator_count);
            Self::progress(&entry, quorum)
        };

        if matches!(snapshot.phase, RemotePhase::Confirmed | RemotePhase::Rejected(_)) {
            self.transfers.remove(external_ref);
            debug!(external_ref = %external_ref, "Simulated transfer settled");
        }
        Ok(snapshot)
    }
}
