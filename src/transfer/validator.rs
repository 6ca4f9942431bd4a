//! Request Validator
//!
//! Pure checks run before a transfer exists. Order matters: the first
//! failing check decides the error.
//!
//! 1. amount is positive (`InvalidAmount`)
//! 2. amount within `[min_amount, max_amount]` (`AmountOutOfRange`)
//! 3. destination matches the target network format (`InvalidAddress`)
//! 4. `amount + fee + network_fee <= available_balance` (`InsufficientBalance`)

use super::error::ValidationError;
use super::types::{TransferRequest, ValidatedRequest};
use crate::config::BridgeConfig;
use crate::fee::FeeQuote;
use crate::network::Direction;

#[derive(Debug, Clone)]
pub struct RequestValidator {
    config: BridgeConfig,
}

impl RequestValidator {
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Fee quote for `amount` sent in `direction`
    pub fn quote(&self, direction: Direction, amount: u64) -> FeeQuote {
        FeeQuote::new(
            amount,
            self.config.fee_rate_bps,
            self.config.network_fee(direction.source()),
        )
    }

    /// Largest amount the balance can cover including fees (the "max" button).
    /// Returns 0 when nothing valid fits.
    pub fn max_transferable(&self, direction: Direction, available_balance: u64) -> u64 {
        let network_fee = self.config.network_fee(direction.source());
        let Some(budget) = available_balance.checked_sub(network_fee) else {
            return 0;
        };
        // amount * (1 + bps/10_000) <= budget, then settle the fee rounding
        let scale = crate::fee::BPS_PRECISION as u128;
        let mut amount = ((budget as u128 * scale) / (scale + self.config.fee_rate_bps as u128))
            .min(self.config.max_amount as u128) as u64;
        while amount < self.config.max_amount
            && self.quote(direction, amount + 1).total() <= available_balance
        {
            amount += 1;
        }
        while amount > 0 && self.quote(direction, amount).total() > available_balance {
            amount -= 1;
        }
        if amount < self.config.min_amount {
            0
        } else {
            amount
        }
    }

    pub fn validate(&self, request: &TransferRequest) -> Result<ValidatedRequest, ValidationError> {
        if request.amount == 0 {
            return Err(ValidationError::InvalidAmount);
        }

        if request.amount < self.config.min_amount || request.amount > self.config.max_amount {
            return Err(ValidationError::AmountOutOfRange {
                amount: request.amount,
                min: self.config.min_amount,
                max: self.config.max_amount,
            });
        }

        let target = request.direction.target();
        let address = request.destination_address.trim();
        if !target.is_valid_address(address) {
            return Err(ValidationError::InvalidAddress {
                network: target,
                address: request.destination_address.clone(),
            });
        }

        let quote = self.quote(request.direction, request.amount);
        let required = request
            .amount
            .checked_add(quote.estimated_fee())
            .unwrap_or(u64::MAX);
        if required > request.available_balance {
            return Err(ValidationError::InsufficientBalance {
                required,
                available: request.available_balance,
            });
        }

        Ok(ValidatedRequest::new(
            request.direction,
            address.to_string(),
            quote,
        ))
    }
}
