//! aegis-agentd — the Aegis402 clearinghouse agent binary.
//!
//! Startup sequence:
//!   1. Load the agent key and build the ledger adapters
//!   2. Rebuild the registry from credit-contract history (recovery)
//!   3. Start the single-writer clearing loop
//!   4. Start the chain watcher and pipe attributed transfers into the core
//!   5. Start the deadline sweeper
//!   6. Serve the HTTP surface

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use aegis_clearing::{spawn_writer, ClearingConfig, ClearingCore, DeadlineSweeper};
use aegis_core::constants::{
    CREDIT_SETTLE_DELAY_MS, DEFAULT_DEADLINE_SECS, DEFAULT_MIN_STAKE_UNITS,
    DEFAULT_SLASH_BOND_UNITS, POLL_INTERVAL_MS, SWEEP_INTERVAL_SECS,
};
use aegis_core::types::Address;
use aegis_crypto::AgentKey;
use aegis_facilitator::{Facilitator, HttpFacilitator};
use aegis_http::{App, GateConfig};
use aegis_ledger::{
    AssetAdapter, CreditManagerAdapter, CreditOps, LedgerView, RpcClient, Transfer,
};
use aegis_registry::Registry;
use aegis_reputation::{FixedReputation, HttpReputation, ReputationReader};
use aegis_watcher::{ChainWatcher, WatchSet};

#[derive(Parser, Debug)]
#[command(
    name = "aegis-agentd",
    version,
    about = "Aegis402 clearinghouse — credit clearing for x402 service agents"
)]
struct Args {
    /// HTTP listen port.
    #[arg(long, env = "AEGIS_PORT", default_value_t = 8402)]
    port: u16,

    /// Hex-encoded 32-byte agent key seed. All credit-contract writes are
    /// signed with this key.
    #[arg(long, env = "AEGIS_PRIVATE_KEY")]
    private_key: String,

    /// JSON-RPC endpoint of the value-ledger node.
    #[arg(long, env = "AEGIS_RPC_URL", default_value = "http://127.0.0.1:8545")]
    rpc_url: String,

    /// Credit-manager contract address.
    #[arg(long, env = "AEGIS_CREDIT_MANAGER_ADDRESS")]
    credit_manager_address: String,

    /// Value-asset contract address.
    #[arg(long, env = "AEGIS_ASSET_ADDRESS")]
    asset_address: String,

    /// Network identifier advertised in x402 payment requirements.
    #[arg(long, env = "AEGIS_NETWORK", default_value = "local")]
    network: String,

    /// Minimum merchant stake (atomic units).
    #[arg(long, env = "AEGIS_MIN_STAKE_AMOUNT", default_value_t = DEFAULT_MIN_STAKE_UNITS)]
    min_stake_amount: u128,

    /// Anti-griefing bond required to invoke /slash (atomic units).
    #[arg(long, env = "AEGIS_SLASH_BOND_AMOUNT", default_value_t = DEFAULT_SLASH_BOND_UNITS)]
    slash_bond_amount: u128,

    /// Delivery deadline added to each detected payment (seconds).
    #[arg(long, env = "AEGIS_DEFAULT_DEADLINE_SECONDS", default_value_t = DEFAULT_DEADLINE_SECS)]
    default_deadline_seconds: i64,

    /// Lower bound block for start-up recovery queries.
    #[arg(long, env = "AEGIS_START_BLOCK", default_value_t = 0)]
    start_block: u64,

    /// Transfer-log poll period (milliseconds).
    #[arg(long, env = "AEGIS_POLL_INTERVAL_MS", default_value_t = POLL_INTERVAL_MS)]
    poll_interval_ms: u64,

    /// x402 facilitator base URL.
    #[arg(long, env = "AEGIS_FACILITATOR_URL", default_value = "http://127.0.0.1:8403")]
    facilitator_url: String,

    /// Optional facilitator API key (sent as a bearer token).
    #[arg(long, env = "AEGIS_FACILITATOR_API_KEY")]
    facilitator_api_key: Option<String>,

    /// Optional reputation oracle base URL; ρ = 1.0 for everyone when unset.
    #[arg(long, env = "AEGIS_REPUTATION_URL")]
    reputation_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,aegis=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    info!("Aegis402 clearinghouse starting");

    // ── Agent identity and adapters ───────────────────────────────────────────
    let key = Arc::new(AgentKey::from_hex(&args.private_key).context("loading agent key")?);
    info!(agent = %key.address(), "agent identity");

    let asset_address = Address::new(&args.asset_address).context("parsing asset address")?;
    let credit_manager =
        Address::new(&args.credit_manager_address).context("parsing credit manager address")?;

    let rpc = Arc::new(
        RpcClient::new(&args.rpc_url, Duration::from_secs(10)).context("building RPC client")?,
    );
    let ledger: Arc<dyn LedgerView> = Arc::new(AssetAdapter::new(
        Arc::clone(&rpc),
        asset_address.clone(),
        Arc::clone(&key),
    ));
    let credit: Arc<dyn CreditOps> = Arc::new(CreditManagerAdapter::new(
        Arc::clone(&rpc),
        credit_manager.clone(),
        Arc::clone(&key),
    ));
    let reputation: Arc<dyn ReputationReader> = match &args.reputation_url {
        Some(url) => Arc::new(
            HttpReputation::new(url, Duration::from_secs(10))
                .context("building reputation client")?,
        ),
        None => Arc::new(FixedReputation::neutral()),
    };

    // ── Clearing core ─────────────────────────────────────────────────────────
    let registry = Arc::new(Registry::new());
    let watch = WatchSet::new();
    let core = Arc::new(ClearingCore::new(
        Arc::clone(&registry),
        Arc::clone(&ledger),
        Arc::clone(&credit),
        reputation,
        watch.clone(),
        ClearingConfig {
            agent_address: key.address().clone(),
            credit_manager: credit_manager.clone(),
            default_deadline_secs: args.default_deadline_seconds,
            settle_delay_ms: CREDIT_SETTLE_DELAY_MS,
        },
    ));

    // ── Recovery (never fatal) ────────────────────────────────────────────────
    let report = core.recover(args.start_block).await;
    info!(
        merchants = report.merchants_loaded,
        payments = report.payments_loaded,
        "registry rebuilt from ledger history"
    );

    // ── Single-writer loop ────────────────────────────────────────────────────
    let clearing = spawn_writer(Arc::clone(&core), 256);

    // ── Chain watcher → clearing core ─────────────────────────────────────────
    let (transfer_tx, mut transfer_rx) = tokio::sync::mpsc::channel::<Transfer>(256);
    let watcher = ChainWatcher::new(
        Arc::clone(&ledger),
        watch.clone(),
        transfer_tx,
        Duration::from_millis(args.poll_interval_ms),
    );
    tokio::spawn(watcher.run());

    let pipe = clearing.clone();
    tokio::spawn(async move {
        while let Some(transfer) = transfer_rx.recv().await {
            if pipe.notify_payment(transfer).await.is_err() {
                break;
            }
        }
    });

    // ── Deadline sweeper ──────────────────────────────────────────────────────
    let sweeper = DeadlineSweeper::new(
        clearing.clone(),
        Duration::from_secs(SWEEP_INTERVAL_SECS),
    );
    tokio::spawn(sweeper.run());

    // ── HTTP surface ──────────────────────────────────────────────────────────
    let facilitator: Arc<dyn Facilitator> = Arc::new(
        HttpFacilitator::new(
            &args.facilitator_url,
            args.facilitator_api_key.clone(),
            Duration::from_secs(30),
        )
        .context("building facilitator client")?,
    );
    let app = App {
        clearing,
        registry,
        facilitator,
        gate: Arc::new(GateConfig {
            network: args.network,
            asset: asset_address,
            agent_address: key.address().clone(),
            credit_manager,
            min_stake: args.min_stake_amount,
            slash_bond: args.slash_bond_amount,
        }),
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "clearinghouse ready");
    axum::serve(listener, aegis_http::router(app))
        .await
        .context("serving HTTP")?;

    Ok(())
}
