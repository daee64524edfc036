//! Mesh Network Simulation
//!
//! Runs a seeded disaster-relief mesh for a fixed number of ticks, applying
//! scheduled interventions and optionally logging every delivery as JSONL.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use mesh_core::events::EventLogger;
use mesh_core::interventions::{load_schedule, PendingInterventions};
use mesh_core::{MeshConfig, MeshSimulation, PublishRequest, SharedSimulation, TickDriver};
use mesh_events::{MessageClass, NodeId};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Command line arguments for the simulation
#[derive(Parser, Debug)]
#[command(name = "mesh_sim")]
#[command(about = "A disaster-resilient mesh network simulation")]
struct Args {
    /// Tuning file (defaults to ./mesh.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Random seed, overriding the config file
    #[arg(long)]
    seed: Option<u64>,

    /// Number of ticks to simulate
    #[arg(long, default_value_t = 100)]
    ticks: u64,

    /// JSON schedule of interventions
    #[arg(long)]
    interventions: Option<PathBuf>,

    /// Write every delivery to this JSONL file
    #[arg(long)]
    events_out: Option<PathBuf>,

    /// Publish one message of each class before the first tick
    #[arg(long)]
    publish_demo: bool,

    /// Tick on the wall clock at the configured interval instead of as fast as possible
    #[arg(long)]
    realtime: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match MeshConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!("Could not load {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => MeshConfig::load_or_default(),
    };
    if let Some(seed) = args.seed {
        config.simulation.seed = seed;
    }

    println!("Mesh Network Simulation");
    println!("=======================");
    println!("Seed: {}", config.simulation.seed);
    println!("Nodes: {}", config.simulation.node_count);
    println!("Ticks: {}", args.ticks);
    println!("Contention: {}", if config.contention.enabled { "on" } else { "off" });
    println!();

    let mut pending = match &args.interventions {
        Some(path) => match load_schedule(path) {
            Ok(pending) => {
                info!("Loaded {} interventions from {}", pending.len(), path.display());
                pending
            }
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        },
        None => PendingInterventions::default(),
    };

    let tick_interval = Duration::from_millis(config.simulation.tick_interval_ms);
    let mut sim = MeshSimulation::new(config);
    if let Some(path) = &args.events_out {
        match EventLogger::new(path) {
            Ok(logger) => sim = sim.with_event_logger(logger),
            Err(e) => warn!("Could not open {}: {}. Deliveries will not be logged.", path.display(), e),
        }
    }

    if args.publish_demo {
        publish_demo(&mut sim);
    }

    if args.realtime {
        run_realtime(sim, args.ticks, tick_interval, pending).await;
        return;
    }

    sim.apply_due(&mut pending);
    for _ in 0..args.ticks {
        let summary = sim.advance_tick();
        sim.apply_due(&mut pending);
        if summary.delivered > 0 || summary.tick % 10 == 0 {
            println!(
                "[Tick {:>4}] delivered {:>3}, lost {:>3}, expired {:>3}, rewards {:>4}",
                summary.tick,
                summary.delivered,
                summary.contention_lost,
                summary.expired,
                summary.relay_rewards
            );
        }
    }

    finish(&mut sim);
}

async fn run_realtime(
    sim: MeshSimulation,
    ticks: u64,
    period: Duration,
    mut pending: PendingInterventions,
) {
    let shared = SharedSimulation::new(sim);
    let driver = TickDriver::start(shared.clone(), period);

    let mut last_tick = 0;
    while last_tick < ticks {
        tokio::time::sleep(period / 2).await;
        last_tick = shared
            .with(|sim| {
                sim.apply_due(&mut pending);
                sim.tick()
            })
            .await;
    }

    driver.stop().await;
    shared.with(finish).await;
}

fn publish_demo(sim: &mut MeshSimulation) {
    let requests = [
        PublishRequest::new(NodeId(1), "I am safe at the library", vec![NodeId(2)], MessageClass::Safe),
        PublishRequest::new(NodeId(2), "Need insulin at the gym", vec![NodeId(3)], MessageClass::Help),
        PublishRequest::new(
            NodeId(3),
            "Water pallets arriving at dock B",
            vec![NodeId(4), NodeId(5)],
            MessageClass::Logistics,
        ),
    ];
    for request in requests {
        match sim.publish(request) {
            Ok(receipt) => println!("Published {} message {}", receipt.class, receipt.message_id),
            Err(e) => warn!("Demo publish failed: {}", e),
        }
    }
    println!();
}

fn finish(sim: &mut MeshSimulation) {
    if let Err(e) = sim.flush_events() {
        warn!("Could not flush delivery log: {}", e);
    }

    let economy = sim.economy_stats();
    let messages = sim.message_stats();
    let contention = sim.contention_stats();

    println!();
    println!("Simulation complete at tick {}", sim.tick());
    println!("  Packets held: {}", messages.total_packets_in_network);
    println!(
        "  Contention: {} attempted, {} lost ({:.1}%)",
        contention.packets_attempted,
        contention.packets_lost,
        contention.loss_rate * 100.0
    );
    println!(
        "  Credits: {} in circulation, Gini {:.3}, Nakamoto {}",
        economy.total_credits_in_circulation,
        economy.gini_coefficient,
        economy.nakamoto_coefficient
    );
    println!("  Health: {}", economy.health_status.description());
    if !sim.ledger_balanced() {
        warn!("Ledger totals do not match wallet balances");
    }
}
