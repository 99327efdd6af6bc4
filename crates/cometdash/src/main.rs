#![recursion_limit = "256"]
#![expect(
    clippy::multiple_crate_versions,
    reason = "transitive dependency duplication"
)]

use clap::{Args, Parser, Subcommand};
use eyre::Context as _;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::prelude::*;

mod actions;
mod amount;
mod config;
mod dashboard;
mod errors;
mod fetch;
mod governance;
mod health;
mod history;
mod paths;
mod registry;
mod state;
mod surface;
mod wallet;

#[cfg(test)]
mod test_support;

use actions::{ActionForm, ActionKind};
use config::DashConfig;
use dashboard::{Dashboard, WatchTiming};
use fetch::Ctx;
use governance::{ProposalDraft, VoteSupport};
use registry::Registry;
use state::ConnectionStore;
use surface::{Board, Surface};
use wallet::{
    rpc::{RpcWallet, RpcWalletOpts},
    WalletProvider,
};

#[derive(Parser, Debug)]
#[command(name = "cometdash", version)]
struct Cli {
    /// Chain whose configured RPC endpoint is used.
    #[arg(long, global = true)]
    chain_id: Option<u64>,

    /// RPC endpoint; overrides the configured one for the chain.
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Read-only account to show when no signing key is configured.
    #[arg(long, global = true)]
    account: Option<String>,

    /// Comet proxy to use instead of the built-in one for the connected chain.
    #[arg(long, global = true)]
    proxy: Option<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Args, Debug)]
struct ActionArgs {
    /// Market symbol, e.g. `cUSDC`.
    #[arg(long)]
    market: String,
    /// Amount in whole tokens, e.g. `1.5`.
    #[arg(long)]
    amount: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect and show the account and network.
    Status,
    /// Connect and run every fetcher once.
    Refresh,
    Markets,
    Prices,
    Balances,
    /// Total supply and total borrow of the active market.
    Totals,
    Gas,
    Positions,
    /// Health factor from live positions, or from a JSON snapshot file (offline).
    Health {
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    Supply(ActionArgs),
    Withdraw(ActionArgs),
    Borrow(ActionArgs),
    Repay(ActionArgs),
    /// COMP governance.
    Gov {
        #[command(subcommand)]
        cmd: GovCommand,
    },
    /// Supply, withdraw, collateral and transfer events of the account.
    History,
    /// Keep refreshing until interrupted.
    Watch,
    /// Print supported networks and their contract addresses.
    Networks,
    /// Print resolved paths (useful for debugging).
    Paths,
}

#[derive(Subcommand, Debug)]
enum GovCommand {
    /// COMP balance and voting power.
    Summary,
    /// One page of proposals; page 1 is the newest. Defaults to the last page.
    Proposals {
        #[arg(long)]
        page: Option<u64>,
    },
    Propose {
        #[arg(long = "target", required = true)]
        targets: Vec<String>,
        #[arg(long = "value", required = true)]
        values: Vec<String>,
        #[arg(long = "signature", required = true)]
        signatures: Vec<String>,
        #[arg(long = "calldata", required = true)]
        calldatas: Vec<String>,
        #[arg(long)]
        description: String,
    },
    Vote {
        #[arg(long)]
        id: u64,
        #[arg(long, value_enum)]
        support: VoteSupport,
    },
    Delegate {
        #[arg(long)]
        to: String,
    },
    Cancel {
        #[arg(long)]
        id: u64,
    },
}

fn init_logging(paths: &paths::DashPaths) -> tracing_appender::non_blocking::WorkerGuard {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();
    let file_name = paths
        .log_file
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("cometdash.log.jsonl");
    let file_appender = tracing_appender::rolling::never(&paths.data_dir, file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(std::io::stderr)
        .with_filter(env_filter.clone());
    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(file_writer)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}

fn print_json(v: &impl serde::Serialize) -> eyre::Result<()> {
    let s = serde_json::to_string_pretty(v).context("serialize output")?;
    writeln!(std::io::stdout().lock(), "{s}").context("write output")?;
    Ok(())
}

/// Shared handles for one invocation.
struct App {
    board: Arc<Board>,
    dash: Dashboard,
}

impl App {
    fn build(cli: &Cli, cfg: &DashConfig) -> eyre::Result<Self> {
        let chain_id = cli.chain_id.unwrap_or(cfg.rpc.default_chain_id);
        let rpc_url = match (&cli.rpc_url, cfg.rpc_url_for(chain_id)) {
            (Some(u), _) => u.clone(),
            (None, Some(u)) => u.to_owned(),
            (None, None) => eyre::bail!("no RPC endpoint configured for chain {chain_id}"),
        };
        let watch_address = match cli.account.as_deref().or(cfg.wallet.watch_address.as_deref()) {
            Some(raw) => Some(
                registry::parse_address(raw)
                    .ok_or_else(|| eyre::eyre!("invalid account address: {raw}"))?,
            ),
            None => None,
        };
        let wallet = RpcWallet::new(&RpcWalletOpts {
            rpc_url,
            rpc_timeout: cfg.rpc_timeout(),
            receipt_timeout: cfg.receipt_timeout(),
            private_key_env: cfg.wallet.private_key_env.clone(),
            watch_address,
        })?;
        tracing::debug!(chain_id, wallet = ?wallet, "wallet ready");

        let registry = Arc::new(Registry::builtin());
        let board = Arc::new(Board::dashboard());
        let surface: Arc<dyn Surface> = Arc::<Board>::clone(&board);
        let wallet: Arc<dyn WalletProvider> = Arc::new(wallet);
        let ctx = Ctx {
            wallet,
            store: Arc::new(ConnectionStore::new(Arc::clone(&registry))),
            registry,
            surface,
        };
        Ok(Self {
            board,
            dash: Dashboard::new(ctx, cfg.ui.proposals_per_page),
        })
    }

    fn print(&self, data: serde_json::Value) -> eyre::Result<()> {
        print_json(&serde_json::json!({
            "board": self.board.to_json(),
            "data": data,
        }))
    }
}

fn snapshot<T: serde::Serialize>(v: Option<T>) -> eyre::Result<serde_json::Value> {
    serde_json::to_value(v).context("serialize snapshot")
}

/// Run one wallet-backed command. Returns whether it completed and the data it produced.
async fn dispatch(
    d: &Dashboard,
    cmd: Command,
    cfg: &DashConfig,
) -> eyre::Result<(bool, serde_json::Value)> {
    let null = serde_json::Value::Null;
    Ok(match cmd {
        Command::Status | Command::Networks | Command::Paths => (true, null),
        Command::Refresh => {
            d.refresh_all().await;
            (true, null)
        }
        Command::Markets => {
            d.markets.fetch().await;
            (true, snapshot(d.markets.cached())?)
        }
        Command::Prices => {
            d.prices.fetch().await;
            (true, snapshot(d.prices.cached())?)
        }
        Command::Balances => {
            d.balances.fetch().await;
            (true, snapshot(d.balances.cached())?)
        }
        Command::Totals => {
            d.totals.fetch().await;
            (true, snapshot(d.totals.cached())?)
        }
        Command::Gas => {
            d.gas.fetch().await;
            (true, snapshot(d.gas.cached())?)
        }
        Command::Positions => {
            d.positions.fetch().await;
            (true, snapshot(d.positions.cached())?)
        }
        Command::Health { .. } => {
            d.positions.fetch().await;
            d.prices.fetch().await;
            let hf = d.health();
            (hf.is_some(), snapshot(hf)?)
        }
        Command::History => {
            d.history.fetch().await;
            (true, snapshot(d.history.cached())?)
        }
        Command::Supply(a) => (submit(d, ActionKind::Supply, a).await, null),
        Command::Withdraw(a) => (submit(d, ActionKind::Withdraw, a).await, null),
        Command::Borrow(a) => (submit(d, ActionKind::Borrow, a).await, null),
        Command::Repay(a) => (submit(d, ActionKind::Repay, a).await, null),
        Command::Gov { cmd } => governance_command(d, cmd).await?,
        Command::Watch => {
            let timing = WatchTiming {
                gas_every: cfg.gas_refresh(),
                poll_every: cfg.watch_poll(),
            };
            d.watch(timing, async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "ctrl-c handler failed");
                }
            })
            .await;
            (true, null)
        }
    })
}

async fn run_online(cli: Cli, cfg: &DashConfig) -> eyre::Result<()> {
    let app = App::build(&cli, cfg)?;
    if !app.dash.connect().await {
        app.print(serde_json::Value::Null)?;
        eyre::bail!("wallet connection failed");
    }
    if let Some(raw) = cli.proxy.as_deref() {
        app.dash
            .ctx()
            .store
            .set_proxy_address(raw)
            .with_context(|| format!("--proxy {raw}"))?;
    }
    let (done, data) = dispatch(&app.dash, cli.cmd, cfg).await?;
    app.print(data)?;
    if !done {
        eyre::bail!("command did not complete; see notices");
    }
    Ok(())
}

async fn submit(d: &Dashboard, kind: ActionKind, a: ActionArgs) -> bool {
    let form = ActionForm {
        market_symbol: a.market,
        amount: a.amount,
    };
    d.actions.submit(kind, &form).await.is_some()
}

async fn governance_command(d: &Dashboard, cmd: GovCommand) -> eyre::Result<(bool, serde_json::Value)> {
    let g = &d.governance;
    let null = serde_json::Value::Null;
    Ok(match cmd {
        GovCommand::Summary => {
            let done = g.summary().await == fetch::FetchOutcome::Committed;
            (done, snapshot(g.cached_summary())?)
        }
        GovCommand::Proposals { page } => {
            let done = d.proposals.show(page).await == fetch::FetchOutcome::Committed;
            (done, snapshot(d.proposals.cached())?)
        }
        GovCommand::Propose {
            targets,
            values,
            signatures,
            calldatas,
            description,
        } => match ProposalDraft::parse(&targets, &values, &signatures, &calldatas, &description) {
            Ok(draft) => (g.propose(&draft).await.is_some(), null),
            Err(e) => {
                d.ctx().surface.notify(errors::Notice::from(e));
                (false, null)
            }
        },
        GovCommand::Vote { id, support } => (g.cast_vote(id, support).await.is_some(), null),
        GovCommand::Delegate { to } => (g.delegate(&to).await.is_some(), null),
        GovCommand::Cancel { id } => (g.cancel(id).await.is_some(), null),
    })
}

/// `health --snapshot`: no wallet, no network.
fn health_from_snapshot(path: &std::path::Path) -> eyre::Result<()> {
    let inputs = health::HealthInputs::load(path)?;
    let hf = health::compute(&inputs, &Registry::builtin());
    let board = Board::dashboard();
    health::render(&board, &hf);
    print_json(&serde_json::json!({
        "health_factor": hf,
        "at_risk": hf.at_risk(),
        "board": board.to_json(),
    }))
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let paths = paths::DashPaths::discover()?;
    std::fs::create_dir_all(&paths.data_dir).context("create data dir")?;
    let _log_guard = init_logging(&paths);
    let cfg = DashConfig::load(&paths)?;

    match &cli.cmd {
        Command::Paths => print_json(&paths),
        Command::Networks => print_json(&Registry::builtin().overview()),
        Command::Health {
            snapshot: Some(path),
        } => health_from_snapshot(path),
        Command::Status
        | Command::Refresh
        | Command::Markets
        | Command::Prices
        | Command::Balances
        | Command::Totals
        | Command::Gas
        | Command::Positions
        | Command::Health { snapshot: None }
        | Command::Supply(_)
        | Command::Withdraw(_)
        | Command::Borrow(_)
        | Command::Repay(_)
        | Command::Gov { .. }
        | Command::History
        | Command::Watch => run_online(cli, &cfg).await,
    }
}
