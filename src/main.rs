use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use shard_lite::config::CoordinatorConfig;
use shard_lite::job::JobConfiguration;
use shard_lite::node::{FleetStatus, JobNode};
use shard_lite::reg::{InMemoryRegistry, RegistrySession};
use shard_lite::schedule::JobRegistry;
use shard_lite::sharding::strategy::average_allocation;

#[derive(Parser, Debug)]
#[command(name = "shard-lite")]
#[command(version)]
#[command(about = "Leader election and shard ownership for jobs coordinated through a registry")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run a fleet of job instances against an in-memory registry
    Simulate(SimulateArgs),

    /// Validate a job configuration file (JSON)
    CheckConfig {
        /// Path to the configuration file
        path: PathBuf,
    },
}

// =============================================================================
// Simulation Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct SimulateArgs {
    /// Job name
    #[arg(long, default_value = "demo-job")]
    job_name: String,

    /// Number of instances, one per simulated host
    #[arg(long, default_value = "3")]
    instances: u8,

    /// Total number of shard items
    #[arg(long, default_value = "8")]
    shards: u32,

    /// Per-item parameters, e.g. "0=Beijing,1=Shanghai"
    #[arg(long, default_value = "")]
    sharding_item_parameters: String,

    /// Number of firings to run
    #[arg(long, default_value = "3")]
    rounds: u32,

    /// Tolerate overlapping execution of the same item
    #[arg(long)]
    no_monitor_execution: bool,

    /// Expire the leader's registry session before this round (0-based)
    #[arg(long)]
    crash_leader_at: Option<u32>,

    /// Disable the leader's server before this round (0-based)
    #[arg(long)]
    disable_leader_at: Option<u32>,

    /// Output format
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

// =============================================================================
// JSON Output Types
// =============================================================================

#[derive(Serialize)]
struct FiringOutput {
    round: u32,
    instance_id: String,
    is_leader: bool,
    items: Vec<u32>,
    task_id: String,
}

#[derive(Serialize)]
struct SimulationOutput {
    firings: Vec<FiringOutput>,
    fleet: FleetStatus,
}

struct SimulatedHost {
    node: JobNode,
    session: Arc<RegistrySession>,
}

// =============================================================================
// Simulation
// =============================================================================

async fn run_simulation(args: SimulateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let job_config = JobConfiguration::new(&args.job_name, "shard_lite::demo::PrintJob", args.shards)
        .with_sharding_item_parameters(args.sharding_item_parameters.clone())
        .with_monitor_execution(!args.no_monitor_execution);
    job_config.validate()?;

    let registry = InMemoryRegistry::new();
    let mut hosts = Vec::new();
    for i in 1..=args.instances {
        let session = Arc::new(registry.connect().await);
        let config = CoordinatorConfig::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, i)), 1000 + u32::from(i))
            .with_leader_poll_interval_ms(20)
            .with_leader_wait_timeout_ms(2_000);
        let node = JobNode::new(
            config,
            job_config.clone(),
            session.clone(),
            Arc::new(JobRegistry::new()),
        );
        node.start().await?;
        hosts.push(SimulatedHost { node, session });
    }
    let Some(first) = hosts.first() else {
        return Err("at least one instance is required".into());
    };
    first.node.facade().leader_service().await_leadership().await?;

    let mut firings = Vec::new();
    for round in 0..args.rounds {
        if args.crash_leader_at == Some(round) {
            if let Some(leader) = find_leader(&hosts).await? {
                let crashed = hosts.remove(leader);
                tracing::warn!(instance_id = %crashed.node.instance(), "Expiring leader session");
                registry.expire_session(crashed.session.id()).await;
            }
        }
        if args.disable_leader_at == Some(round) {
            if let Some(leader) = find_leader(&hosts).await? {
                let node = &hosts[leader].node;
                tracing::warn!(instance_id = %node.instance(), "Disabling leader server");
                node.facade()
                    .server_service()
                    .disable_server(node.instance().ip())
                    .await?;
            }
        }
        // Let listeners react before assigning work.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let Some(observer) = hosts.first() else {
            break;
        };
        let available = observer
            .node
            .facade()
            .instance_service()
            .available_job_instances()
            .await?;
        let allocation = average_allocation(&available, args.shards);
        for host in &hosts {
            let items = allocation
                .get(host.node.instance().id())
                .cloned()
                .unwrap_or_default();
            let contexts = host
                .node
                .fire(&items, |ctx| async move {
                    tracing::info!(
                        task_id = %ctx.task_id,
                        item = ctx.sharding_item,
                        parameter = %ctx.sharding_parameter,
                        "Executing item"
                    );
                })
                .await?;
            firings.push(FiringOutput {
                round,
                instance_id: host.node.instance().id().to_string(),
                is_leader: host.node.is_leader().await?,
                items: contexts.items(),
                task_id: contexts.task_id,
            });
        }
    }

    let fleet = match hosts.first() {
        Some(host) => host.node.fleet_status().await?,
        None => return Err("every instance crashed".into()),
    };
    let output = SimulationOutput { firings, fleet };
    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
        OutputFormat::Table => print_table(&output),
    }

    for host in &hosts {
        host.node.shutdown().await?;
    }
    Ok(())
}

async fn find_leader(hosts: &[SimulatedHost]) -> Result<Option<usize>, Box<dyn std::error::Error>> {
    for (idx, host) in hosts.iter().enumerate() {
        if host.node.is_leader().await? {
            return Ok(Some(idx));
        }
    }
    Ok(None)
}

fn print_table(output: &SimulationOutput) {
    println!("{:<6} {:<20} {:<7} {:<16} TASK ID", "ROUND", "INSTANCE", "LEADER", "ITEMS");
    println!("{}", "-".repeat(90));
    for firing in &output.firings {
        let items = firing
            .items
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");
        println!(
            "{:<6} {:<20} {:<7} {:<16} {}",
            firing.round,
            firing.instance_id,
            if firing.is_leader { "yes" } else { "" },
            items,
            firing.task_id
        );
    }

    println!();
    println!("Job: {}", output.fleet.job_name);
    println!(
        "Leader: {}",
        output.fleet.leader_instance_id.as_deref().unwrap_or("(none)")
    );
    println!("{:<16} {:<9} AVAILABLE", "SERVER", "ENABLED");
    for server in &output.fleet.servers {
        println!(
            "{:<16} {:<9} {}",
            server.ip,
            if server.enabled { "yes" } else { "no" },
            if server.available { "yes" } else { "no" }
        );
    }
}

async fn check_config(path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let raw = tokio::fs::read_to_string(&path).await?;
    let config = JobConfiguration::from_json(&raw)?;
    config.validate()?;
    println!(
        "{}: job '{}' ({}), {} shard item(s), monitor execution {}",
        path.display(),
        config.job_name,
        config.job_class,
        config.sharding_total_count,
        if config.monitor_execution { "on" } else { "off" }
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        Commands::Simulate(sim) => run_simulation(sim).await,
        Commands::CheckConfig { path } => check_config(path).await,
    }
}
