//! flashclaim operator CLI
//!
//! Run modes:
//!   flashclaim watch                   - Watch and auto-claim deposits until Ctrl+C
//!   flashclaim claim-once              - One scan and claim pass
//!   flashclaim claim <txid|hex> [vout] - Claim a specific deposit
//!   flashclaim status                  - Deposit status report
//!   flashclaim snipe <target> --amount - Wait for a pool and swap into it
//!   flashclaim detect                  - Wait until the AMM serves pools
//!   flashclaim pools                   - List pools paired with the base asset

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing::{error, info};

use flashclaim::amm::{PoolRouteResolver, ReadinessDetector, SwapError, SwapMode, SwapPipeline, SwapRequest};
use flashclaim::common::{init_from_config, AppConfig, FlashclaimError, Shutdown, ShutdownTrigger};
use flashclaim::deposit_tracker::{DepositClaimPipeline, DepositRef, TrackerError};
use flashclaim::storage::MemorySeenStore;
use flashclaim::{BridgeClient, ChainDataClient};

const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(name = "flashclaim")]
#[command(about = "Deposit auto-claim and liquidity-routed swaps for layer-2 wallets")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch deposit addresses and claim matured deposits
    Watch,

    /// Scan once and claim everything that is already mature
    ClaimOnce,

    /// Claim one deposit by txid or raw transaction hex
    Claim {
        /// 64-char txid or raw transaction hex
        input: String,

        /// Output index of the deposit
        vout: Option<u32>,
    },

    /// Print every deposit on the watched addresses
    Status,

    /// Wait until a pool for the target is fundable, then swap
    Snipe {
        /// Pool id (66-hex) or token identifier
        target: String,

        /// Amount of the base asset to swap
        #[arg(short, long)]
        amount: u128,

        /// Slippage tolerance in basis points
        #[arg(short, long)]
        slippage: Option<u32>,

        /// Pre-resolved pool id
        #[arg(long, requires = "asset_out")]
        pool: Option<String>,

        /// Output asset of the pre-resolved pool
        #[arg(long, requires = "pool")]
        asset_out: Option<String>,

        /// Stop after resolving the route
        #[arg(long, conflicts_with = "dry_execute")]
        dry_resolve: bool,

        /// Stop after building the swap intent
        #[arg(long)]
        dry_execute: bool,

        #[arg(long)]
        skip_balance_check: bool,
    },

    /// Wait until the AMM answers with pools
    Detect,

    /// List pools paired with the base asset
    Pools {
        #[arg(short, long, default_value = "50")]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_from_config(&config) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }
    config.print_summary();

    let (trigger, shutdown) = Shutdown::channel();
    spawn_ctrl_c(trigger);

    let (success, payload) = match run(cli.command, &config, &shutdown).await {
        Ok(payload) => (true, payload),
        Err(e) => {
            error!(code = e.error_code(), error = %e, "command failed");
            (false, json!({ "error": e.to_string(), "code": e.error_code() }))
        }
    };
    print_result(success, payload);

    if shutdown.is_triggered() {
        ExitCode::from(EXIT_INTERRUPTED)
    } else if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn spawn_ctrl_c(trigger: ShutdownTrigger) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            trigger.trigger();
        }
    });
}

fn print_result(success: bool, payload: Value) {
    let mut out = json!({ "success": success });
    if let (Value::Object(out), Value::Object(fields)) = (&mut out, payload) {
        out.extend(fields);
    }
    println!("{}", serde_json::to_string_pretty(&out).unwrap_or_else(|_| out.to_string()));
}

fn deposit_pipeline(config: &AppConfig, bridge: Arc<BridgeClient>) -> DepositClaimPipeline {
    let chain = Arc::new(ChainDataClient::new(config.explorers.clone()));
    DepositClaimPipeline::new(config.tracker.clone(), bridge, chain, Arc::new(MemorySeenStore::new()))
        .with_network(config.network.as_str())
}

async fn run(command: Command, config: &AppConfig, shutdown: &Shutdown) -> Result<Value, FlashclaimError> {
    let bridge = Arc::new(BridgeClient::new(&config.bridge_url, &config.bridge_token));

    match command {
        Command::Watch => {
            let pipeline = deposit_pipeline(config, bridge);
            match pipeline.run(shutdown.clone()).await {
                Ok(()) | Err(TrackerError::Cancelled(_)) => {}
                Err(e) => return Err(e.into()),
            }
            Ok(json!({ "seen": pipeline.seen_store().count().await? }))
        }

        Command::ClaimOnce => {
            let report = deposit_pipeline(config, bridge).run_once().await?;
            Ok(json!({
                "claimed": report.claimed(),
                "failed": report.failed(),
                "pending": report.pending(),
                "report": report,
            }))
        }

        Command::Claim { input, vout } => {
            let deposit = DepositRef::parse_input(&input, vout).map_err(FlashclaimError::validation)?;
            let txid = deposit.txid.clone();
            let claimed = deposit_pipeline(config, bridge).claim_single(deposit).await?;
            Ok(json!({ "txid": txid, "claim": claimed }))
        }

        Command::Status => {
            let report = deposit_pipeline(config, bridge).status_report().await?;
            Ok(json!({ "status": report }))
        }

        Command::Snipe {
            target,
            amount,
            slippage,
            pool,
            asset_out,
            dry_resolve,
            dry_execute,
            skip_balance_check,
        } => {
            let mut request = SwapRequest::new(target, amount);
            request.slippage_bps = slippage;
            request.pinned_route = pool.zip(asset_out);
            request.skip_balance_check = skip_balance_check;
            request.mode = if dry_resolve {
                SwapMode::DryResolve
            } else if dry_execute {
                SwapMode::DryExecute
            } else {
                SwapMode::Execute
            };

            let pipeline = SwapPipeline::new(bridge, config.swap.clone());
            let outcome = pipeline.run(&request, shutdown).await?;
            Ok(json!({ "swap": outcome }))
        }

        Command::Detect => {
            let detector = ReadinessDetector::new(bridge, config.readiness);
            let report = detector
                .wait_until_ready(shutdown)
                .await
                .map_err(|c| FlashclaimError::from(SwapError::from(c)))?;
            Ok(json!({ "ready": report }))
        }

        Command::Pools { limit } => {
            let resolver = PoolRouteResolver::new(bridge, config.swap.base_asset.clone());
            let pools = resolver.list_pools(limit).await?;
            Ok(json!({ "count": pools.len(), "pools": pools }))
        }
    }
}
