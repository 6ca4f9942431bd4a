//! Networks, transfer direction and address formats

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length of a Qubic identity (uppercase A-Z only)
pub const QUBIC_IDENTITY_LEN: usize = 60;

/// Size of a decoded Solana public key
pub const SOLANA_PUBKEY_LEN: usize = 32;

/// One side of the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Solana,
    Qubic,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Solana => "SOLANA",
            Network::Qubic => "QUBIC",
        }
    }

    /// Symbol of the network's native asset
    pub fn native_asset(&self) -> &'static str {
        match self {
            Network::Solana => "SOL",
            Network::Qubic => "QU",
        }
    }

    /// Decimal places of the native asset (lamports, whole QU)
    pub fn decimals(&self) -> u32 {
        match self {
            Network::Solana => 9,
            Network::Qubic => 0,
        }
    }

    /// Address-format predicate for this network.
    pub fn is_valid_address(&self, address: &str) -> bool {
        match self {
            Network::Solana => is_solana_address(address),
            Network::Qubic => is_qubic_identity(address),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Base58 text decoding to exactly 32 bytes.
fn is_solana_address(address: &str) -> bool {
    // 32 bytes encode to 32..=44 base58 chars
    if !(32..=44).contains(&address.len()) {
        return false;
    }
    matches!(bs58::decode(address).into_vec(), Ok(bytes) if bytes.len() == SOLANA_PUBKEY_LEN)
}

fn is_qubic_identity(address: &str) -> bool {
    address.len() == QUBIC_IDENTITY_LEN && address.bytes().all(|b| b.is_ascii_uppercase())
}

/// Transfer direction, fixed when a transfer is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "sol-to-qubic")]
    SolanaToQubic,
    #[serde(rename = "qubic-to-sol")]
    QubicToSolana,
}

impl Direction {
    pub fn source(&self) -> Network {
        match self {
            Direction::SolanaToQubic => Network::Solana,
            Direction::QubicToSolana => Network::Qubic,
        }
    }

    pub fn target(&self) -> Network {
        match self {
            Direction::SolanaToQubic => Network::Qubic,
            Direction::QubicToSolana => Network::Solana,
        }
    }

    pub fn reversed(&self) -> Self {
        match self {
            Direction::SolanaToQubic => Direction::QubicToSolana,
            Direction::QubicToSolana => Direction::SolanaToQubic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::SolanaToQubic => "sol-to-qubic",
            Direction::QubicToSolana => "qubic-to-sol",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sol-to-qubic" => Ok(Direction::SolanaToQubic),
            "qubic-to-sol" => Ok(Direction::QubicToSolana),
            other => Err(format!("unknown direction: {}", other)),
        }
    }
}
