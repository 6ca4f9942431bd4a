//! Fee calculation utilities
//!
//! Bridge fee rates are expressed in basis points: 100 = 1.00%.

use serde::Serialize;

/// Basis-point precision (10^4 = 10,000)
pub const BPS_PRECISION: u64 = 10_000;

/// Highest bridge fee rate a config may carry (1000 = 10.00%)
pub const MAX_FEE_RATE_BPS: u64 = 1_000;

/// Calculate the bridge fee from amount and rate.
///
/// Uses u128 intermediate to prevent overflow.
///
/// # Example
/// ```
/// use bridge_controller::fee::calculate_fee;
/// // 5B QU * 1.00% = 50M QU
/// assert_eq!(calculate_fee(5_000_000_000, 100), 50_000_000);
/// ```
#[inline]
pub fn calculate_fee(amount: u64, rate_bps: u64) -> u64 {
    let fee = (amount as u128 * rate_bps as u128) / BPS_PRECISION as u128;
    // Minimum fee is 1 if amount > 0 and rate > 0
    if fee == 0 && amount > 0 && rate_bps > 0 {
        1
    } else {
        fee as u64
    }
}

/// Fee breakdown for one transfer, fixed at submission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeQuote {
    pub amount: u64,
    /// Bridge fee, kept by the bridge
    pub fee: u64,
    /// Source-network transaction fee
    pub network_fee: u64,
}

impl FeeQuote {
    pub fn new(amount: u64, rate_bps: u64, network_fee: u64) -> Self {
        Self {
            amount,
            fee: calculate_fee(amount, rate_bps),
            network_fee,
        }
    }

    /// Fee total charged on top of the amount
    #[inline]
    pub fn estimated_fee(&self) -> u64 {
        self.fee.saturating_add(self.network_fee)
    }

    /// Amount + all fees, i.e. what the source balance must cover
    #[inline]
    pub fn total(&self) -> u64 {
        self.amount.saturating_add(self.estimated_fee())
    }

    /// Amount released on the destination network
    #[inline]
    pub fn net_amount(&self) -> u64 {
        self.amount.saturating_sub(self.fee)
    }
}
