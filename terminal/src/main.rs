//! # Swap Terminal
//!
//! Command line front end for the swap engine.
//!
//! ```text
//! terminal quote SOL USDC 1.5
//! terminal swap SOL USDC 1.5 100
//! terminal balance SOL USDC
//! terminal endpoints
//! ```

mod logger;
mod wallet;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use lib_core::config::{core_config, init_config};
use lib_core::{AppError, Config};
use lib_solana::{Asset, ConnectionHandle, JupiterClient, SolanaConnector};
use lib_swap::{Quote, SwapSession, TradeIntent};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use wallet::{default_keypair_path, load_keypair, KeypairWallet};

#[derive(Parser, Debug)]
#[command(name = "terminal", version, about = "Token swaps on Solana through the Jupiter aggregator")]
struct Cli {
    /// Use this RPC endpoint instead of the first healthy configured one
    #[arg(long, global = true)]
    rpc: Option<String>,

    /// Keypair file (defaults to WALLET_KEYPAIR_PATH or ~/.config/solana/id.json)
    #[arg(long, global = true)]
    keypair: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the best route for a trade
    Quote(TradeArgs),

    /// Quote, sign and submit a trade, then wait for confirmation
    Swap {
        #[command(flatten)]
        trade: TradeArgs,

        /// Sign without asking for approval
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Show wallet balances
    Balance {
        /// Token symbols or mint addresses
        #[arg(default_value = "SOL")]
        assets: Vec<String>,
    },

    /// Check the health of the configured RPC endpoints
    Endpoints,
}

#[derive(Args, Debug)]
struct TradeArgs {
    /// Token to sell (symbol or mint address)
    from: String,

    /// Token to buy (symbol or mint address)
    to: String,

    /// Amount of `from` in display units
    amount: f64,

    /// Maximum slippage in basis points (defaults to DEFAULT_SLIPPAGE_BPS)
    slippage_bps: Option<u16>,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let _log_guard = logger::init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        match e.downcast_ref::<AppError>() {
            Some(app) if app.is_user_visible() => {
                error!(code = app.code(), "{:#}", e);
                eprintln!("{}", app.user_message());
            }
            _ => {
                error!("{:#}", e);
                eprintln!("Error: {:#}", e);
            }
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    init_config()?;
    let config = core_config()?;
    let jupiter = Arc::new(JupiterClient::from_config(config)?);

    let needs_wallet = !matches!(cli.command, Command::Endpoints | Command::Quote(_));
    let wallet = open_wallet(cli.keypair.as_deref(), needs_wallet)?;
    let wallet = match &cli.command {
        Command::Swap { yes: true, .. } => wallet.auto_approve(),
        _ => wallet,
    };

    let session = SwapSession::new(
        config,
        Arc::new(SolanaConnector::new(config.commitment).with_timeout(config.rpc_request_timeout)),
        jupiter.clone(),
        Arc::new(wallet),
    );

    let connected = connect(&session, cli.rpc.as_deref()).await;

    // Health is printed even when no endpoint is reachable.
    if let Command::Endpoints = cli.command {
        for line in endpoint_lines(&session) {
            println!("{}", line);
        }
        return connected.map(|_| ()).map_err(Into::into);
    }

    let handle = connected?;
    info!(endpoint = %handle.endpoint(), "Connected");

    match cli.command {
        Command::Endpoints => {}
        Command::Balance { assets } => {
            for query in &assets {
                let asset = resolve(&jupiter, query).await?;
                let record = session.balance(&asset).await?;
                println!("{:>16.6} {}", record.quantity, asset.symbol);
            }
        }
        Command::Quote(trade) => {
            let quote = request_quote(&session, &jupiter, config, &trade).await?;
            print_quote(&quote);
        }
        Command::Swap { trade, .. } => {
            let quote = request_quote(&session, &jupiter, config, &trade).await?;
            print_quote(&quote);
            swap(&session, config).await?;
        }
    }

    Ok(())
}

async fn connect(session: &SwapSession, rpc: Option<&str>) -> lib_core::Result<Arc<ConnectionHandle>> {
    match rpc {
        Some(url) => session.select_endpoint(url).await,
        None => session.connect().await,
    }
}

fn open_wallet(path: Option<&std::path::Path>, required: bool) -> Result<KeypairWallet> {
    let path = path.map(PathBuf::from).unwrap_or_else(default_keypair_path);
    match load_keypair(&path) {
        Ok(keypair) => Ok(KeypairWallet::new(keypair)),
        Err(e) if required => Err(e).context("Could not load the wallet keypair"),
        Err(e) => {
            warn!("Continuing without a wallet: {}", e);
            Ok(KeypairWallet::disconnected())
        }
    }
}

async fn resolve(jupiter: &JupiterClient, query: &str) -> Result<Asset> {
    match jupiter.find_asset(query).await? {
        Some(asset) => Ok(asset),
        None => bail!("Unknown token: {}", query),
    }
}

async fn request_quote(
    session: &SwapSession,
    jupiter: &JupiterClient,
    config: &Config,
    trade: &TradeArgs,
) -> Result<Quote> {
    let from = resolve(jupiter, &trade.from).await?;
    let to = resolve(jupiter, &trade.to).await?;
    let slippage = trade.slippage_bps.unwrap_or(config.default_slippage_bps);

    print_balances(session, &[&from, &to]).await;

    let intent = TradeIntent::new(from, to, trade.amount, slippage);
    match session.update_intent(intent).await? {
        Some(quote) => Ok(quote),
        None => bail!("Quote request was replaced before it completed"),
    }
}

async fn swap(session: &SwapSession, config: &Config) -> Result<()> {
    let signature = session.swap().await?;
    println!("Submitted: {}", signature);
    println!("Waiting for confirmation...");

    session.wait_for_confirmation(&signature).await?;
    println!("Confirmed: {}", config.explorer_url(&signature.to_string()));
    Ok(())
}

/// Best effort; quoting works without a wallet.
async fn print_balances(session: &SwapSession, assets: &[&Asset]) {
    for asset in assets {
        match session.balance(asset).await {
            Ok(record) => println!("Balance: {:>16.6} {}", record.quantity, asset.symbol),
            Err(AppError::WalletNotConnected) => return,
            Err(e) => warn!(asset = %asset.symbol, "Balance unavailable: {}", e),
        }
    }
}

fn print_quote(quote: &Quote) {
    let intent = quote.intent();
    println!(
        "{} {} -> {:.6} {}",
        intent.amount,
        intent.source.symbol,
        quote.out_amount_display(),
        intent.destination.symbol
    );
    println!("  Price impact: {:.4}%", quote.price_impact_pct() * 100.0);
    println!("  Slippage:     {} bps", intent.effective_slippage_bps());
    println!("  Route:        {}", quote.route_labels().join(" -> "));
}

fn endpoint_lines(session: &SwapSession) -> Vec<String> {
    session
        .endpoints()
        .into_iter()
        .map(|endpoint| {
            let marker = if endpoint.active { "*" } else { " " };
            format!("{} {:<50} {:?}", marker, endpoint.url, endpoint.health)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_solana::mock::MockConnector;
    use lib_swap::WalletAdapter;

    #[test]
    fn test_cli_parses_swap() {
        let cli = Cli::try_parse_from([
            "terminal",
            "swap",
            "SOL",
            "USDC",
            "1.5",
            "100",
            "-y",
            "--rpc",
            "https://rpc.test",
        ])
        .unwrap();

        assert_eq!(cli.rpc.as_deref(), Some("https://rpc.test"));
        match cli.command {
            Command::Swap { trade, yes } => {
                assert!(yes);
                assert_eq!(trade.from, "SOL");
                assert_eq!(trade.amount, 1.5);
                assert_eq!(trade.slippage_bps, Some(100));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_balance_defaults_to_sol() {
        let cli = Cli::try_parse_from(["terminal", "balance"]).unwrap();
        assert!(matches!(cli.command, Command::Balance { assets } if assets == vec!["SOL".to_string()]));
    }

    #[test]
    fn test_disconnected_wallet_for_quotes() {
        let wallet = open_wallet(Some(std::path::Path::new("/nonexistent/id.json")), false).unwrap();
        assert!(wallet.public_key().is_none());
        assert!(open_wallet(Some(std::path::Path::new("/nonexistent/id.json")), true).is_err());
    }

    #[tokio::test]
    async fn test_endpoint_health_listed_when_all_down() {
        let config = Config {
            rpc_endpoints: vec!["https://a.rpc.test".to_string(), "https://b.rpc.test".to_string()],
            ..Config::default()
        };
        let connector = Arc::new(MockConnector::new());
        for url in &config.rpc_endpoints {
            connector.endpoint(url).set_healthy(false);
        }
        let session = SwapSession::new(
            &config,
            connector,
            Arc::new(JupiterClient::from_config(&config).unwrap()),
            Arc::new(KeypairWallet::disconnected()),
        );

        let connected = connect(&session, None).await;
        let lines = endpoint_lines(&session);

        assert!(matches!(connected, Err(AppError::Connectivity(_))));
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|line| line.contains("Unhealthy")));
        assert!(lines[0].contains("https://a.rpc.test"));
    }
}
