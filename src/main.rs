//! Bridge controller demo
//!
//! Runs a handful of transfers against the in-process simulated bridge
//! service and prints every lifecycle event and final record as JSON lines.
//!
//! ```text
//! bridge-controller [--env dev] [--transfers 4] [--seed 42]
//! ```

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use bridge_controller::config::AppConfig;
use bridge_controller::network::{Direction, Network};
use bridge_controller::transfer::{
    SimulatedBridgeService, SimulationConfig, StaticWallet, TransferCoordinator, TransferRequest,
    WalletProvider,
};

/// Demo wallet balances (base units)
const SOL_BALANCE: u64 = 25_000_000_000;
const QU_BALANCE: u64 = 40_000_000_000;

fn get_arg(names: &[&str]) -> Option<String> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if names.contains(&args[i].as_str()) && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
    }
    None
}

fn get_env() -> String {
    get_arg(&["--env", "-e"]).unwrap_or_else(|| "dev".to_string())
}

fn get_transfer_count() -> Result<usize> {
    match get_arg(&["--transfers", "-n"]) {
        Some(n) => n.parse().context("--transfers must be a number"),
        None => Ok(4),
    }
}

fn get_seed() -> Result<Option<u64>> {
    get_arg(&["--seed"])
        .map(|s| s.parse().context("--seed must be a number"))
        .transpose()
}

#[tokio::main]
async fn main() -> Result<()> {
    let env = get_env();
    let transfer_count = get_transfer_count()?;
    let seed = get_seed()?;

    let app_config =
        AppConfig::load(&env).with_context(|| format!("loading config for env '{}'", env))?;
    let _log_guard = bridge_controller::logging::init_logging(&app_config);

    tracing::info!("Starting bridge controller demo in {} mode", env);

    let bridge = app_config.bridge.clone();
    let service = Arc::new(SimulatedBridgeService::new(SimulationConfig {
        validator_count: bridge.validator_count,
        quorum: Some(bridge.confirmation_threshold()),
        seed,
        ..SimulationConfig::default()
    }));
    let wallet = Arc::new(StaticWallet::demo("demo-sender"));
    let recipient = StaticWallet::demo("demo-recipient");

    let coordinator = TransferCoordinator::new(bridge, service, wallet.clone())
        .context("starting transfer coordinator")?;
    let mut events = coordinator.subscribe();

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut pending = HashSet::new();
    for i in 0..transfer_count {
        let direction = if i % 2 == 0 {
            Direction::SolanaToQubic
        } else {
            Direction::QubicToSolana
        };
        let balance = match direction.source() {
            Network::Solana => SOL_BALANCE,
            Network::Qubic => QU_BALANCE,
        };
        let max = coordinator
            .validator()
            .max_transferable(direction, balance / transfer_count.max(1) as u64);
        let min = coordinator.validator().config().min_amount;
        if max < min {
            tracing::warn!(direction = %direction, "Balance too small for a demo transfer");
            continue;
        }
        let amount = rng.gen_range(min..=max);
        let destination = recipient
            .source_address(direction.target())
            .context("demo recipient has no address")?;

        let request = TransferRequest::new(direction, amount, destination, balance);
        match coordinator.start_transfer(&format!("demo-{}", i), &request) {
            Ok(id) => {
                pending.insert(id);
            }
            Err(e) => tracing::warn!(code = e.code(), "Demo transfer refused: {}", e),
        }
    }

    while !pending.is_empty() {
        match events.recv().await {
            Ok(event) => {
                println!("{}", serde_json::to_string(&event)?);
                if event.is_terminal() {
                    pending.remove(&event.transfer_id);
                }
            }
            Err(RecvError::Lagged(n)) => tracing::warn!("Event printer lagged by {} events", n),
            Err(RecvError::Closed) => break,
        }
    }

    for snapshot in coordinator.history(transfer_count) {
        println!("{}", snapshot.to_json_line()?);
    }
    println!("{}", serde_json::to_string(&coordinator.stats())?);

    coordinator.shutdown();
    tracing::info!("Bridge controller demo finished");
    Ok(())
}
