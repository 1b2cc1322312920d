use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use raft_election::cluster::{run_scenario, ScenarioReport};
use raft_election::config::{ClusterConfig, ElectionConfig};
use raft_election::shutdown::install_shutdown_handler;

#[derive(Parser, Debug)]
#[command(name = "raft-election")]
#[command(version)]
#[command(about = "Simulate Raft leader election with runtime joins and leader failure")]
struct Args {
    /// Nodes started with the cluster
    #[arg(long, default_value = "3")]
    nodes: usize,

    /// Nodes joined at runtime after the warmup phase
    #[arg(long, default_value = "2")]
    join: usize,

    /// Time before new nodes join (ms)
    #[arg(long, default_value = "5000")]
    warmup_ms: u64,

    /// Time between the joins and the leader failure (ms)
    #[arg(long, default_value = "7000")]
    settle_ms: u64,

    /// Time allowed for re-election after the failure (ms)
    #[arg(long, default_value = "10000")]
    recovery_ms: u64,

    // === Timing Options ===
    /// Minimum randomized follower wait (ms)
    #[arg(long, default_value = "1500")]
    election_timeout_min_ms: u64,

    /// Maximum randomized follower wait (ms)
    #[arg(long, default_value = "3000")]
    election_timeout_max_ms: u64,

    /// Silence after which a follower campaigns (ms)
    #[arg(long, default_value = "2000")]
    heartbeat_timeout_ms: u64,

    /// Leader heartbeat cadence (ms)
    #[arg(long, default_value = "1000")]
    heartbeat_interval_ms: u64,

    /// Seed for reproducible election timeouts
    #[arg(long)]
    seed: Option<u64>,

    /// Output format for the final report
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

impl Args {
    fn cluster_config(&self) -> ClusterConfig {
        ClusterConfig {
            election: ElectionConfig {
                election_timeout_min_ms: self.election_timeout_min_ms,
                election_timeout_max_ms: self.election_timeout_max_ms,
                heartbeat_timeout_ms: self.heartbeat_timeout_ms,
                heartbeat_interval_ms: self.heartbeat_interval_ms,
                rng_seed: self.seed,
            },
            initial_nodes: self.nodes,
            joining_nodes: self.join,
            warmup_ms: self.warmup_ms,
            join_settle_ms: self.settle_ms,
            recovery_ms: self.recovery_ms,
            ..ClusterConfig::default()
        }
    }
}

fn print_report(
    report: &ScenarioReport,
    output: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Table => {
            println!("Cluster Status");
            println!("{}", "=".repeat(40));
            if let Some(failed) = &report.failed_leader {
                println!("Failed leader: {}", failed);
            }
            match &report.leader {
                Some(leader) => println!(
                    "Leader:        {} (term {})",
                    leader.id, leader.current_term
                ),
                None => println!("Leader:        none"),
            }
            println!();
            println!("{:<10} {:<10} {:<6} STATUS", "ID", "ROLE", "TERM");
            println!("{}", "-".repeat(40));
            for node in &report.nodes {
                let status = if node.alive { "[+] alive" } else { "[-] dead" };
                println!(
                    "{:<10} {:<10} {:<6} {}",
                    node.id,
                    node.role.to_string(),
                    node.current_term,
                    status
                );
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = args.cluster_config();
    let cancel = CancellationToken::new();
    install_shutdown_handler(cancel.clone())?;

    let report = run_scenario(&config, cancel).await?;
    print_report(&report, &args.output)?;

    Ok(())
}
