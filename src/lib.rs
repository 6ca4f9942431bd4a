//! Bridge Controller - Cross-Chain Transfer Lifecycle
//!
//! Validates transfer requests between Solana and Qubic, submits them to an
//! external bridge service and tracks each one to a terminal state.
//!
//! # Modules
//!
//! - [`network`] - Networks, directions and address formats
//! - [`money`] - Decimal amount parsing and formatting
//! - [`fee`] - Bridge fee computation
//! - [`config`] - YAML configuration
//! - [`logging`] - tracing setup
//! - [`transfer`] - Validator, lifecycle coordinator and status reconciler

pub mod config;
pub mod fee;
pub mod logging;
pub mod money;
pub mod network;
pub mod transfer;

// Convenient re-exports at crate root
pub use config::{AppConfig, BridgeConfig, ConfigError};
pub use fee::FeeQuote;
pub use network::{Direction, Network};
pub use transfer::{
    ApplyOutcome, BridgeService, ControllerError, ControllerStats, TransferCoordinator,
    TransferEvent, TransferId, TransferRequest, TransferSnapshot, TransferState, WalletProvider,
};
