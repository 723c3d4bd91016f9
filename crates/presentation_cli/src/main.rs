//! Faultline CLI
//!
//! Drives the chaos client and the telemetry pipelines in-process.

#![allow(clippy::print_stdout)]

mod routes;

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use application::UserService;
use clap::{Parser, Subcommand};
use infrastructure::chaos::{ChaosClient, FaultProfile};
use infrastructure::telemetry::metrics::LoggingMetricExporter;
use infrastructure::telemetry::trace::{Carrier, LoggingSpanExporter};
use infrastructure::telemetry::{
    RequestObserver, ResponseStatus, TelemetryPipeline, init_logging, service_resource,
};
use infrastructure::{AppConfig, FakerUserClient};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::routes::Routes;

/// Faultline CLI
#[derive(Parser)]
#[command(name = "faultline")]
#[command(author, version, about = "Chaos injection and telemetry playground", long_about = None)]
struct Cli {
    /// Verbosity level; overrides the configured log filter
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run concurrent requests through the instrumented routes
    ///
    /// Spans and metrics are written to the log by the console exporters.
    /// Example: faultline simulate --requests 200 --chaos --toggle-at 100
    Simulate {
        /// Number of requests to send
        #[arg(short, long, default_value = "50")]
        requests: usize,

        /// Start with chaos on, regardless of configuration
        #[arg(long)]
        chaos: bool,

        /// Flip the chaos switch after this many requests have completed
        #[arg(long)]
        toggle_at: Option<usize>,

        /// Share of requests sent to the root route instead of a user
        #[arg(long, default_value = "0.2")]
        index_share: f64,

        /// Make the upstream stub fail every call
        #[arg(long)]
        upstream_down: bool,
    },

    /// Sample the configured fault profile and print class frequencies
    Sample {
        /// Number of samples to draw
        #[arg(short = 'n', long, default_value = "100000")]
        samples: usize,

        /// Seed for a reproducible run
        #[arg(long)]
        seed: Option<u64>,
    },
}

/// Determine log filter level from verbosity count
const fn log_filter_from_verbosity(verbose: u8) -> Option<&'static str> {
    match verbose {
        0 => None,
        1 => Some("info"),
        2 => Some("debug"),
        _ => Some("trace"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load().context("failed to load configuration")?;
    if let Some(filter) = log_filter_from_verbosity(cli.verbose) {
        config.telemetry.logging.filter = filter.to_string();
    }
    init_logging(&config.telemetry.logging)?;

    let profile = config.fault_profile().context("invalid chaos profile")?;

    match cli.command {
        Commands::Simulate {
            requests,
            chaos,
            toggle_at,
            index_share,
            upstream_down,
        } => {
            simulate(
                &config,
                profile,
                SimulateArgs {
                    requests,
                    chaos,
                    toggle_at,
                    index_share: index_share.clamp(0.0, 1.0),
                    upstream_down,
                },
            )
            .await?;
        },

        Commands::Sample { samples, seed } => sample(&profile, samples, seed),
    }

    Ok(())
}

struct SimulateArgs {
    requests: usize,
    chaos: bool,
    toggle_at: Option<usize>,
    index_share: f64,
    upstream_down: bool,
}

async fn simulate(config: &AppConfig, profile: FaultProfile, args: SimulateArgs) -> anyhow::Result<()> {
    let resource = service_resource(&config.service.name, &config.service.version);
    let pipeline = TelemetryPipeline::install(
        &config.telemetry,
        resource,
        LoggingSpanExporter,
        LoggingMetricExporter,
        Vec::new(),
    )?;

    let switch = config.chaos.switch();
    if args.chaos {
        switch.set_enabled(true);
    }

    let upstream = Arc::new(FakerUserClient::new());
    upstream.set_available(!args.upstream_down);
    let client = Arc::new(ChaosClient::new(upstream, profile, switch.clone()));
    let users = Arc::new(UserService::new(client.clone()));
    let observer = RequestObserver::new(pipeline.tracer().clone(), pipeline.instruments().clone());
    let routes = Routes::new(observer, users);

    info!(requests = args.requests, chaos = switch.is_enabled(), "Starting simulation");

    let first = args.toggle_at.unwrap_or(args.requests).min(args.requests);
    let mut statuses = run_batch(&routes, first, args.index_share).await;
    if args.toggle_at.is_some() {
        switch.set_enabled(!switch.is_enabled());
        statuses.append(&mut run_batch(&routes, args.requests - first, args.index_share).await);
    }

    pipeline.force_flush().await?;
    let dropped = pipeline.dropped_spans();
    if let Err(e) = pipeline.shutdown().await {
        warn!(error = %e, "Telemetry shutdown incomplete");
    }

    let mut by_status: BTreeMap<u16, usize> = BTreeMap::new();
    for status in statuses {
        *by_status.entry(status).or_default() += 1;
    }

    let stats = client.stats();
    println!("Requests by status:");
    for (status, count) in &by_status {
        println!("  {status}: {count}");
    }
    println!("Chaos client:");
    println!("  calls:              {}", stats.total_calls);
    println!("  passed through:     {}", stats.passthrough);
    println!("  latency injected:   {}", stats.latency_injected);
    println!("  mean added latency: {:.1} ms", stats.mean_latency_ms());
    println!("  synthetic failures: {}", stats.failures_injected);
    println!("  dependency errors:  {}", stats.dependency_errors);
    println!("  fault rate:         {:.3}", stats.actual_fault_rate());
    println!("Dropped spans: {dropped}");

    Ok(())
}

/// Run `count` requests concurrently and collect their status codes
async fn run_batch(routes: &Routes, count: usize, index_share: f64) -> Vec<u16> {
    let mut tasks = JoinSet::new();
    for _ in 0..count {
        let routes = routes.clone();
        let (to_index, id) = {
            let mut rng = rand::rng();
            (rng.random_bool(index_share), rng.random_range(1..=1000_i64))
        };
        tasks.spawn(async move {
            if to_index {
                routes.index(Carrier::new()).await.status()
            } else {
                routes.get_user(id, Carrier::new()).await.status()
            }
        });
    }

    let mut statuses = Vec::with_capacity(count);
    while let Some(result) = tasks.join_next().await {
        match result {
            Ok(status) => statuses.push(status),
            Err(e) => warn!(error = %e, "Request task failed"),
        }
    }
    statuses
}

#[allow(clippy::cast_precision_loss)]
fn sample(profile: &FaultProfile, samples: usize, seed: Option<u64>) {
    let mut rng = seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);

    let mut latency: BTreeMap<String, usize> = BTreeMap::new();
    let mut outcomes: BTreeMap<String, usize> = BTreeMap::new();
    for _ in 0..samples {
        *latency
            .entry(profile.sample_latency(&mut rng).class.to_string())
            .or_default() += 1;
        *outcomes
            .entry(profile.sample_outcome(&mut rng).to_string())
            .or_default() += 1;
    }

    let total = samples.max(1) as f64;
    println!("Latency classes ({samples} samples, base delay {:?}):", profile.base_delay());
    for (tier, expected) in profile.latency().entries() {
        let observed = latency.get(&tier.class.to_string()).copied().unwrap_or(0) as f64 / total;
        println!(
            "  {:<8} +{:>5} ms  expected {expected:.4}  observed {observed:.4}",
            tier.class,
            tier.delay.as_millis()
        );
    }
    println!("Outcome classes:");
    for (class, expected) in profile.outcomes().entries() {
        let observed = outcomes.get(&class.to_string()).copied().unwrap_or(0) as f64 / total;
        println!("  {class:<8} expected {expected:.4}  observed {observed:.4}");
    }
}
