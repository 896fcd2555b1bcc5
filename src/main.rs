mod candidates;
mod config_store;
mod error;
mod peers;
mod platform;
mod probe;
mod rank;
mod shutdown;
mod types;
mod workers;

use clap::{Parser, Subcommand};
use config_store::ConfigStore;
use probe::{ProbeConfig, TcpDialer};
use rank::Summary;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use types::{Endpoint, RankedPeer};
use workers::SchedulerConfig;

const LONG_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_COMMIT_HASH"), ")");

#[derive(Parser, Debug, Clone)]
#[command(author, version, long_version = LONG_VERSION, about)]
struct Args {
    #[arg(
        long,
        global = true,
        help = "Path to the node configuration file (detected per platform when omitted)"
    )]
    config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the peers currently configured
    List,

    /// Add peer URIs to the configuration
    Add {
        #[arg(required = true)]
        uris: Vec<String>,
    },

    /// Remove peer URIs from the configuration
    Remove {
        #[arg(required = true)]
        uris: Vec<String>,
    },

    /// Probe candidate peers, rank them and optionally add the best ones
    Probe(ProbeOpts),
}

#[derive(clap::Args, Debug, Clone)]
pub struct ProbeOpts {
    /// File containing candidate peer URIs, or `-` for stdin
    #[arg(long)]
    candidates: PathBuf,

    #[arg(long, default_value = "100", help = "Maximum number of candidates to test")]
    limit: usize,

    #[arg(long, default_value = "5", help = "Connection attempts per peer")]
    attempts: u32,

    #[arg(long, default_value = "3000", help = "Per-attempt dial timeout, in milliseconds")]
    timeout_ms: u64,

    #[arg(long, default_value = "150", help = "Delay between attempts, in milliseconds")]
    delay_ms: u64,

    #[arg(long, default_value = "20", help = "Peers probed concurrently")]
    concurrency: usize,

    #[arg(
        long,
        default_value_t = rank::DEFAULT_ACCEPT_CEILING.as_millis() as u64,
        help = "Peers averaging at or above this latency are rejected, in milliseconds"
    )]
    ceiling_ms: u64,

    #[arg(long, default_value = "10", help = "Number of ranked peers to display")]
    show: usize,

    /// Add this many of the best peers to the configuration
    #[arg(long)]
    add: Option<usize>,

    /// Print the full ranking as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| platform::current().find_config_path());
    let store = ConfigStore::new(config_path);
    info!("Config: {}", store.path().display());

    match args.command {
        Command::List => list_peers(&store),
        Command::Add { uris } => add_peers(&store, &uris)?,
        Command::Remove { uris } => {
            let endpoints: Vec<Endpoint> = uris.into_iter().map(Endpoint::from).collect();
            if store.remove_peers(&endpoints)? {
                info!("Peers removed");
            } else {
                info!("None of the given peers were configured");
            }
        }
        Command::Probe(opts) => probe_peers(&store, opts).await?,
    }

    Ok(())
}

fn list_peers(store: &ConfigStore) {
    if !store.exists() {
        warn!("Config file not found ({})", store.path().display());
    }
    let peers = store.read_peers();
    if peers.is_empty() {
        info!("No peers found in config");
        return;
    }
    info!("Active peers in config: {}", peers.len());
    for (i, peer) in peers.iter().enumerate() {
        println!("{}. {}", i + 1, peer);
    }
}

fn add_peers(store: &ConfigStore, uris: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let (valid, rejected): (Vec<Endpoint>, Vec<Endpoint>) = uris
        .iter()
        .map(|u| Endpoint::from(u.as_str()))
        .partition(Endpoint::is_well_formed);
    for peer in &rejected {
        warn!("Ignoring {}: expected scheme://host[:port] with tcp, tls, quic, ws, wss or udp", peer);
    }
    if valid.is_empty() {
        return Ok(());
    }

    if store.add_peers(&valid)? {
        info!("Peers added and config formatted");
    } else {
        info!("All given peers are already configured");
    }
    Ok(())
}

async fn probe_peers(store: &ConfigStore, opts: ProbeOpts) -> Result<(), Box<dyn std::error::Error>> {
    let found = candidates::load(&opts.candidates)?;
    let total_found = found.len();
    let selected = candidates::sample(found, opts.limit);
    info!("Total peers found: {}. Testing {}", total_found, selected.len());

    let config = SchedulerConfig {
        concurrency: opts.concurrency,
        probe: ProbeConfig {
            attempts: opts.attempts,
            dial_timeout: Duration::from_millis(opts.timeout_ms),
            attempt_delay: Duration::from_millis(opts.delay_ms),
        },
    };
    let cancel = shutdown::cancel_on_interrupt();
    let results = workers::schedule_all(Arc::new(TcpDialer), selected, config, cancel.clone()).await;

    let tested = results.len();
    let ceiling = Duration::from_millis(opts.ceiling_ms);
    let ranked = rank::rank(results, ceiling);
    report_summary(&rank::summarize(tested, &ranked), ceiling);

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&ranked)?);
    } else {
        print_ranking(&ranked, opts.show);
    }

    let Some(count) = opts.add else {
        return Ok(());
    };
    if cancel.is_cancelled() {
        warn!("Probing was interrupted, not changing the config");
        return Ok(());
    }
    if ranked.is_empty() || count == 0 {
        warn!("No peers to add");
        return Ok(());
    }

    let chosen: Vec<Endpoint> = ranked.iter().take(count).map(|p| p.endpoint().clone()).collect();
    for (i, peer) in ranked.iter().take(count).enumerate() {
        info!(
            "Adding {}. {} ({:?} avg, jitter {:?})",
            i + 1,
            peer.endpoint(),
            peer.result.latency,
            peer.result.jitter
        );
    }
    if store.add_peers(&chosen)? {
        info!("Peers added and config formatted");
    } else {
        info!("Selected peers were already configured");
    }
    Ok(())
}

fn report_summary(summary: &Summary, ceiling: Duration) {
    info!("Total peers tested: {}", summary.tested);
    info!("Peers found: {}", summary.accepted);
    match (summary.best_latency, summary.best_stability_percent) {
        (Some(latency), Some(stability)) => {
            info!("Best latency: {:?}", latency);
            info!("Best stability: {:.2}%", stability);
        }
        _ => {
            warn!("No reachable peers found with latency < {:?}", ceiling);
            warn!("Check network connectivity and firewall rules, or try again later");
        }
    }
}

fn print_ranking(ranked: &[RankedPeer], show: usize) {
    for (i, peer) in ranked.iter().take(show).enumerate() {
        let r = &peer.result;
        println!(
            "{}. {}\n   Latency: {:?} (min: {:?}, max: {:?}, jitter: {:?}) - {} ({:.0}%)",
            i + 1,
            r.endpoint,
            r.latency,
            r.min_latency,
            r.max_latency,
            r.jitter,
            peer.label,
            peer.stability_percent()
        );
    }
    if ranked.len() > show {
        println!("\n(+{} more peers available)", ranked.len() - show);
    }
}
