//! Watch a freshly seeded value spread through a running cluster.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use epidemic::{
    client::{AdminClient, GossipClient},
    config::{DEFAULT_ADMIN_PORT, DEFAULT_HOST},
    logging::{init_logging, LoggingConfig},
    observer::{
        convergence::{converged_value, DEFAULT_MAX_ROUNDS},
        discover_layout, observe_convergence, ClusterProbe, ConvergenceConfig, ConvergenceEvent,
        ConvergenceRating, ConvergenceReport, HttpProbe, RoundRecord, COLOR_GREEN, COLOR_RED,
        COLOR_RESET, COLOR_YELLOW,
    },
};
use rand::{rngs::StdRng, SeedableRng};
use tracing::level_filters::LevelFilter;

#[derive(Parser, Debug)]
#[command(name = "observe-convergence")]
#[command(
    about = "Measure how many push rounds a new value needs to reach every node",
    long_about = None
)]
struct Cli {
    /// Give up after this many rounds
    #[arg(long, default_value_t = DEFAULT_MAX_ROUNDS)]
    max_rounds: usize,

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

    /// Pause between a trigger and sampling the cluster, in milliseconds
    #[arg(long, default_value_t = 100)]
    settle_ms: u64,
}

fn print_initial(holders: &[bool]) {
    println!("Initial state:");
    for (node, &holds) in holders.iter().enumerate() {
        if holds {
            println!("  node-{}: ✓ (source)", node);
        } else {
            println!("  node-{}: ✗", node);
        }
    }
    println!();
    println!("Propagating...");
}

fn print_round(record: &RoundRecord, node_count: usize) {
    let (round, sender) = (record.round, record.sender);
    match (&record.error, record.target) {
        (Some(e), _) => print!("Round {}: node-{} → error ({})", round, sender, e),
        (None, Some(target)) => print!("Round {}: node-{} → {} ", round, sender, target),
        (None, None) => print!("Round {}: node-{} → ? ", round, sender),
    }
    if !record.newly_updated.is_empty() {
        print!(" [NEW:");
        for node in &record.newly_updated {
            print!(" node-{}", node);
        }
        print!("]");
    }
    println!(" ({}/{} converged)", record.converged_count, node_count);

    if record.round % 5 == 0 && record.converged_count < node_count {
        println!(
            "  Progress: {}/{} nodes updated after {} rounds",
            record.converged_count, node_count, record.round
        );
    }
}

/// Per-node final values, from the admin API in one request when it answers,
/// otherwise node by node.
async fn print_final_state(report: &ConvergenceReport, admin: &AdminClient, probe: &HttpProbe) {
    println!("Final state:");
    if let Ok(nodes) = admin.get_nodes().await {
        for node in nodes {
            if node.value == report.value {
                println!("  {}: ✓", node.id);
            } else {
                println!("  {}: ✗ (still has '{}')", node.id, node.value);
            }
        }
        return;
    }
    for node in 0..report.node_count {
        match probe.value_of(node).await {
            Ok(v) if v == report.value => println!("  node-{}: ✓", node),
            Ok(v) => println!("  node-{}: ✗ (still has '{}')", node, v),
            Err(e) => println!("  node-{}: ✗ (error: {})", node, e),
        }
    }
}

async fn print_results(report: &ConvergenceReport, admin: &AdminClient, probe: &HttpProbe) {
    println!("=== Results ===");
    println!();

    match report.rating() {
        Some(rating) => {
            println!(
                "{}✓ Converged successfully in {} rounds!{}",
                COLOR_GREEN, report.rounds, COLOR_RESET
            );
            println!();
            println!("Analysis:");
            println!("  Nodes: {}", report.node_count);
            println!("  Rounds: {}", report.rounds);
            println!("  Efficiency: {:.1} rounds per node", report.rounds_per_node());
            let (color, text) = match rating {
                ConvergenceRating::Excellent => (
                    COLOR_GREEN,
                    "Excellent - Very efficient propagation".to_string(),
                ),
                ConvergenceRating::Good => (
                    COLOR_GREEN,
                    format!("Good - Expected range for {} nodes", report.node_count),
                ),
                ConvergenceRating::Acceptable => (
                    COLOR_YELLOW,
                    "Acceptable - Slightly slow but normal".to_string(),
                ),
                ConvergenceRating::Poor => {
                    (COLOR_RED, "Poor - Unusually slow propagation".to_string())
                }
            };
            println!("  {}{}{}", color, text, COLOR_RESET);
        }
        None => {
            println!(
                "{}✗ Failed to converge within {} rounds{}",
                COLOR_RED, report.rounds, COLOR_RESET
            );
            println!();
            print_final_state(report, admin, probe).await;
        }
    }
    println!();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&LoggingConfig {
        level: LevelFilter::WARN,
        json: false,
    });

    println!("=== Gossip Convergence Observer ===");

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
    let gossip = GossipClient::new(&cli.host)?;
    let healthy = gossip
        .count_healthy_nodes(layout.base_port, layout.node_count)
        .await;

    println!("Parameters:");
    println!("  Base Port: {}", layout.base_port);
    println!("  Nodes: {} ({} responding)", layout.node_count, healthy);
    println!("  Max Rounds: {}", cli.max_rounds);
    println!();
    if healthy < layout.node_count {
        println!(
            "{}Warning: {} node(s) not responding; full convergence is unlikely{}",
            COLOR_YELLOW,
            layout.node_count - healthy,
            COLOR_RESET
        );
        println!();
    }

    let probe = HttpProbe::new(gossip, layout);
    let value = converged_value(Utc::now().timestamp());
    let config = ConvergenceConfig {
        max_rounds: cli.max_rounds,
        settle_delay: Duration::from_millis(cli.settle_ms),
        source: 0,
    };

    println!("Setting new value on node-0: '{}'", value);
    println!("Starting gossip propagation...");
    println!();

    let mut rng = StdRng::from_os_rng();
    let report = observe_convergence(
        &probe,
        layout.node_count,
        &value,
        &config,
        &mut rng,
        |event| match event {
            ConvergenceEvent::Seeded(holders) => print_initial(holders),
            ConvergenceEvent::Round(record) => print_round(record, layout.node_count),
        },
    )
    .await
    .context("convergence run aborted")?;

    println!();
    print_results(&report, &admin, &probe).await;
    Ok(())
}
