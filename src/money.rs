//! Amount Conversion
//!
//! Conversion between the internal `u64` base-unit representation and the
//! display strings the UI collaborator works with. All amounts inside the
//! controller are `u64` in the smallest unit of the source network
//! (lamports for SOL, QU for Qubic).
//!
//! ```rust
//! use bridge_controller::money::{format_amount, parse_amount};
//!
//! let internal = parse_amount("2.5", 9).unwrap();
//! assert_eq!(internal, 2_500_000_000);
//! assert_eq!(format_amount(internal, 9, 4), "2.5000");
//! ```

use rust_decimal::prelude::*;
use thiserror::Error;

use crate::network::Network;

/// Amount conversion errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Precision overflow: provided {provided} decimals, max allowed {max}")]
    PrecisionOverflow { provided: u32, max: u32 },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Amount too large, would overflow")]
    Overflow,

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

impl MoneyError {
    pub fn code(&self) -> &'static str {
        match self {
            MoneyError::PrecisionOverflow { .. } => "PRECISION_OVERFLOW",
            MoneyError::InvalidAmount => "INVALID_AMOUNT",
            MoneyError::Overflow => "OVERFLOW",
            MoneyError::InvalidFormat(_) => "INVALID_FORMAT",
        }
    }
}

/// Convert a display string to base units.
///
/// Rejects empty input, signs, `NaN`/`inf` and any other non-digit text,
/// more fractional digits than `decimals`, zero, and values above `u64::MAX`.
pub fn parse_amount(amount_str: &str, decimals: u32) -> Result<u64, MoneyError> {
    let amount_str = amount_str.trim();
    if amount_str.is_empty() {
        return Err(MoneyError::InvalidFormat("empty string".into()));
    }

    if amount_str.starts_with('-') || amount_str.starts_with('+') {
        return Err(MoneyError::InvalidAmount);
    }

    let (whole, frac) = match amount_str.split_once('.') {
        None => (amount_str, ""),
        Some((whole, frac)) => {
            // ".5" and "5." are ambiguous in a form field, require both sides
            if whole.is_empty() {
                return Err(MoneyError::InvalidFormat(
                    "missing leading zero (e.g., use 0.5 instead of .5)".into(),
                ));
            }
            if frac.is_empty() {
                return Err(MoneyError::InvalidFormat(
                    "missing fractional part (e.g., use 5.0 instead of 5.)".into(),
                ));
            }
            if frac.contains('.') {
                return Err(MoneyError::InvalidFormat("multiple decimal points".into()));
            }
            if decimals == 0 {
                return Err(MoneyError::InvalidFormat(
                    "decimals is 0, but dot provided".into(),
                ));
            }
            (whole, frac)
        }
    };

    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MoneyError::InvalidFormat(format!(
            "not a finite decimal number: {}",
            amount_str
        )));
    }

    // No silent truncation
    if frac.len() > decimals as usize {
        return Err(MoneyError::PrecisionOverflow {
            provided: frac.len() as u32,
            max: decimals,
        });
    }

    let whole_num: u64 = whole.parse::<u64>().map_err(|_| MoneyError::Overflow)?;

    let frac_num: u64 = if frac.is_empty() {
        0
    } else {
        let frac_padded = format!("{:0<width$}", frac, width = decimals as usize);
        frac_padded
            .parse::<u64>()
            .map_err(|_| MoneyError::InvalidFormat("invalid fractional part".into()))?
    };

    let multiplier = 10u64.checked_pow(decimals).ok_or(MoneyError::Overflow)?;
    let amount = whole_num
        .checked_mul(multiplier)
        .and_then(|v| v.checked_add(frac_num))
        .ok_or(MoneyError::Overflow)?;

    if amount == 0 {
        return Err(MoneyError::InvalidAmount);
    }

    Ok(amount)
}

/// Convert an already-parsed `Decimal` to base units.
pub fn parse_decimal(decimal: Decimal, decimals: u32) -> Result<u64, MoneyError> {
    if decimal.is_sign_negative() || decimal.is_zero() {
        return Err(MoneyError::InvalidAmount);
    }

    if decimal.scale() > decimals {
        return Err(MoneyError::PrecisionOverflow {
            provided: decimal.scale(),
            max: decimals,
        });
    }

    let multiplier = Decimal::from(10u64.checked_pow(decimals).ok_or(MoneyError::Overflow)?);
    let result = decimal
        .checked_mul(multiplier)
        .ok_or(MoneyError::Overflow)?;

    result.to_u64().ok_or(MoneyError::Overflow)
}

/// Convert base units to a display string with `display_decimals` places.
pub fn format_amount(value: u64, decimals: u32, display_decimals: u32) -> String {
    let decimal_value = Decimal::from(value) / Decimal::from(10u64.pow(decimals));
    format!("{:.prec$}", decimal_value, prec = display_decimals as usize)
}

/// Parse a display amount in the native asset of `network`.
pub fn parse_native(amount_str: &str, network: Network) -> Result<u64, MoneyError> {
    parse_amount(amount_str, network.decimals())
}

/// Format base units of `network`'s native asset, e.g. `"2.456789000 SOL"`.
pub fn format_native(value: u64, network: Network) -> String {
    let decimals = network.decimals();
    format!(
        "{} {}",
        format_amount(value, decimals, decimals),
        network.native_asset()
    )
}
