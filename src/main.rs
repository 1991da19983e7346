use std::{fs::File, path::Path, process::ExitCode, sync::Mutex};

use anyhow::{Context, Error};
use clap::Parser;
use log::{error, info};

use provisioner::{
    cli::{Cli, Commands, MachineArgs},
    load_agent_config, load_storage_config, validation, Provisioner, PROVISIONER_VERSION,
};
use provisioner_api::{
    config::AgentConfig,
    error::{InitializationError, ProvisioningError, ProvisioningResultExt, ReportError},
};

/// Loads the agent configuration and applies the machine identity given on
/// the command line on top of it.
fn agent_config(args: &Cli, machine: &MachineArgs) -> Result<AgentConfig, ProvisioningError> {
    let mut config = load_agent_config(&args.agent_config)?;
    if let Some(maas_user) = &machine.maas_user {
        config.maas_user = Some(maas_user.clone());
    }
    if let Some(node_id) = &machine.node_id {
        config.node_id = Some(node_id.clone());
    }
    Ok(config)
}

fn execute(args: &Cli) -> Result<(), ProvisioningError> {
    match &args.command {
        Commands::Validate { config } => validation::validate_storage_config_file(config),
        Commands::Provision {
            config, machine, ..
        } => {
            let storage = load_storage_config(config)?;
            Provisioner::new(&agent_config(args, machine)?)
                .message("Failed to initialize provisioner")?
                .provision(&storage)
        }
        Commands::Clear { machine, .. } => Provisioner::new(&agent_config(args, machine)?)
            .message("Failed to initialize provisioner")?
            .clear(),
    }
}

fn save_error(path: &Path, e: &ProvisioningError) {
    match serde_yaml::to_string(e) {
        Ok(contents) => {
            if let Err(e2) = std::fs::write(path, contents) {
                error!("Failed to write error to file: {e2}");
            }
        }
        Err(e2) => error!("Failed to serialize error: {e2}"),
    }
}

fn run_provisioner(args: &Cli) -> Result<(), ProvisioningError> {
    // Log version ASAP
    info!("Provisioner version: {PROVISIONER_VERSION}");

    let res = execute(args);

    let error_path = match &args.command {
        Commands::Provision { error, .. } | Commands::Clear { error, .. } => error.as_deref(),
        Commands::Validate { .. } => None,
    };
    if let (Some(path), Err(e)) = (error_path, &res) {
        save_error(path, e);
    }

    res.message(format!("Failed to execute '{}' command", args.command))
}

fn setup_logging(args: &Cli) -> Result<(), Error> {
    env_logger::builder()
        .format_timestamp(None)
        .filter_level(args.verbosity)
        .try_init()
        .context("Logger already registered")
}

fn setup_tracing(args: &Cli) -> Result<(), ProvisioningError> {
    use tracing_subscriber::{filter, fmt::format::FmtSpan, layer::SubscriberExt, Layer};

    let Some(path) = &args.trace_file else {
        return Ok(());
    };

    let file = File::create(path).structured(InitializationError::SetupTracing)?;
    let trace_writer = tracing_subscriber::fmt::layer()
        .json()
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_writer(Mutex::new(file))
        .with_filter(filter::LevelFilter::INFO);

    tracing::subscriber::set_global_default(
        tracing_subscriber::Registry::default().with(trace_writer),
    )
    .structured(InitializationError::SetupTracing)
    .message(format!("Failed to trace to '{}'", path.display()))
}

fn main() -> ExitCode {
    // Parse args
    let args = Cli::parse();

    if let Err(e) = setup_logging(&args) {
        eprintln!("Failed to initialize logging: {e:?}");
        return ExitCode::from(1);
    }

    if let Err(e) = setup_tracing(&args) {
        error!("Failed to initialize tracing: {e:?}");
        return ExitCode::from(1);
    }

    if let Err(e) = run_provisioner(&args) {
        error!("Provisioner failed: {e:?}");
        return ExitCode::from(2);
    }

    ExitCode::SUCCESS
}
