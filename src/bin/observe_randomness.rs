//! Check how evenly one node spreads its push targets over its peers.

use std::{
    io::{self, Write},
    time::Duration,
};

use anyhow::{Context, Result};
use clap::Parser;
use epidemic::{
    client::{AdminClient, GossipClient},
    config::{DEFAULT_ADMIN_PORT, DEFAULT_HOST},
    logging::{init_logging, LoggingConfig},
    observer::{
        discover_layout, observe_randomness,
        randomness::{DEFAULT_ROUNDS, DEFAULT_ROUND_DELAY},
        DistributionReport, HttpProbe, ObserverError, RandomnessConfig, RandomnessRating,
        COLOR_GREEN, COLOR_RED, COLOR_RESET, COLOR_YELLOW,
    },
};
use tracing::level_filters::LevelFilter;

#[derive(Parser, Debug)]
#[command(name = "observe-randomness")]
#[command(about = "Tally push targets of node-0 over many rounds", long_about = None)]
struct Cli {
    /// Number of gossip rounds to execute
    #[arg(long, default_value_t = DEFAULT_ROUNDS)]
    rounds: usize,

    /// Admin service port
    #[arg(long, default_value_t = DEFAULT_ADMIN_PORT)]
    admin_port: u16,

    /// Base port (auto-detect from admin API if 0)
    #[arg(long, default_value_t = 0)]
    base_port: u16,

    /// Number of nodes (auto-detect from admin API if 0)
    #[arg(long, default_value_t = 0)]
    nodes: usize,

    /// Host the cluster listens on
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Pause between rounds, in milliseconds
    #[arg(long, default_value_t = DEFAULT_ROUND_DELAY.as_millis() as u64)]
    delay_ms: u64,
}

fn print_distribution(report: &DistributionReport, node_count: usize) {
    println!("=== Distribution Analysis ===");
    println!();
    println!("Actual distribution:");

    let bar_scale = if node_count > 20 { 4 } else { 2 };
    for &(node, count) in &report.counts {
        if node_count > 20 && count == 0 {
            continue;
        }
        let color = if report.is_deviant(count) {
            COLOR_RED
        } else {
            COLOR_GREEN
        };
        println!(
            "  node-{}: {}{:3} times{} {}",
            node,
            color,
            count,
            COLOR_RESET,
            "█".repeat(count / bar_scale)
        );
    }
    println!();

    println!("=== Statistical Summary ===");
    println!("Total gossips: {}", report.total_received());
    if report.failures > 0 {
        println!("Failed rounds: {}", report.failures);
    }
    println!("Min: {}, Max: {}", report.min(), report.max());
    println!("Range: {}", report.range());
    println!("Standard expectation: {}", report.expected());
    println!(
        "Chi-square: {:.2} ({} degrees of freedom)",
        report.chi_square(),
        report.peer_count().saturating_sub(1)
    );

    match report.rating() {
        RandomnessRating::Good => {
            println!("{}✓ Good randomness (well distributed){}", COLOR_GREEN, COLOR_RESET)
        }
        RandomnessRating::Acceptable => {
            println!("{}~ Acceptable randomness{}", COLOR_YELLOW, COLOR_RESET)
        }
        RandomnessRating::Poor => {
            println!("{}✗ Poor randomness (highly skewed){}", COLOR_RED, COLOR_RESET)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&LoggingConfig {
        level: LevelFilter::WARN,
        json: false,
    });

    println!("=== Gossip Randomness Observer ===");

    let admin = AdminClient::new(&cli.host, cli.admin_port)?;
    let base_port = (cli.base_port != 0).then_some(cli.base_port);
    let node_count = (cli.nodes != 0).then_some(cli.nodes);
    if base_port.is_none() || node_count.is_none() {
        println!(
            "Fetching cluster configuration from admin API (port {})...",
            cli.admin_port
        );
    }
    let layout = discover_layout(&admin, base_port, node_count).await?;
    if layout.node_count < 2 {
        return Err(ObserverError::TooFewNodes {
            required: 2,
            actual: layout.node_count,
        }
        .into());
    }

    let peers = layout.node_count - 1;
    println!("Parameters:");
    println!("  Rounds: {}", cli.rounds);
    println!("  Base Port: {}", layout.base_port);
    println!("  Nodes: {}", layout.node_count);
    println!(
        "  Expected per node: ~{} times (for {} peers)",
        cli.rounds / peers,
        peers
    );
    println!();

    let probe = HttpProbe::new(GossipClient::new(&cli.host)?, layout);
    let config = RandomnessConfig {
        rounds: cli.rounds,
        round_delay: Duration::from_millis(cli.delay_ms),
        source: 0,
    };

    println!("Executing {} gossip rounds from node-0...", cli.rounds);
    let report = observe_randomness(&probe, layout.node_count, &config, |round, ok| {
        print!("{}", if ok { "." } else { "!" });
        if round % 100 == 0 {
            println!(" [{}/{}]", round, cli.rounds);
        }
        let _ = io::stdout().flush();
    })
    .await
    .with_context(|| format!("source node (port {}) is not responding", layout.base_port))?;

    println!();
    println!();
    print_distribution(&report, layout.node_count);
    Ok(())
}
