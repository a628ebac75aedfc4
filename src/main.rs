//! dkmeans CLI entry point

use anyhow::{Context, Result};
use dkmeans::config::cli::{Cli, ExecutionMode};
use dkmeans::config::Config;
use dkmeans::coordinator::LocalCoordinator;
use dkmeans::distributed::{DistributedCoordinator, NodeService};
use dkmeans::output::write_outputs;

fn main() -> Result<()> {
    println!("dkmeans v{}", env!("CARGO_PKG_VERSION"));
    println!("Distributed k-means clustering");
    println!();

    // Parse CLI arguments
    let cli = Cli::parse_args();
    cli.validate()?;

    // Handle different execution modes
    match cli.mode {
        ExecutionMode::Local => run_local(cli),
        ExecutionMode::Coordinator => run_coordinator(cli),
        ExecutionMode::Service => run_service(cli),
    }
}

/// Build, validate, and display the configuration
///
/// Returns `None` in dry-run mode.
fn prepare_config(cli: &Cli) -> Result<Option<Config>> {
    let config = dkmeans::config::toml::build_config(cli)?;

    dkmeans::config::validator::validate_config(&config).context("Configuration validation failed")?;

    print_configuration(&config);

    if config.runtime.dry_run {
        println!();
        println!("Dry run mode - configuration validated successfully");
        return Ok(None);
    }

    Ok(Some(config))
}

/// Run in local mode (all workers as threads of this process)
fn run_local(cli: Cli) -> Result<()> {
    let config = match prepare_config(&cli)? {
        Some(config) => config,
        None => return Ok(()),
    };

    println!();
    println!(
        "Running {} rounds across {} workers...",
        config.clustering.max_rounds, config.workers.count
    );
    println!();

    let report = LocalCoordinator::new(config).run()?;
    write_outputs(&report, "local")
}

/// Run in coordinator mode (rank 0 of a distributed run)
fn run_coordinator(cli: Cli) -> Result<()> {
    let node_addresses = cli.node_addresses()?;

    let config = match prepare_config(&cli)? {
        Some(config) => config,
        None => return Ok(()),
    };

    println!();
    let coordinator =
        DistributedCoordinator::new(config, node_addresses).context("Failed to create coordinator")?;
    let report = coordinator.run()?;
    write_outputs(&report, "distributed")
}

/// Run in service mode (node of a distributed run)
fn run_service(cli: Cli) -> Result<()> {
    let service = NodeService::new(cli.listen_port).context("Failed to create node service")?;
    service.run()
}

fn print_configuration(config: &Config) {
    println!("{}", config);
}
