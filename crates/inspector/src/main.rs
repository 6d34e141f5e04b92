use anyhow::Context;
use clap::{Parser, Subcommand};
use common::TelemetryGuard;
use controller::{HardwareLink, ProtocolCommand};
use inspector::{InspectorConfig, Station};
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    flag,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Bottle inspection station.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file. `INSPECTOR_*` variables override it.
    #[arg(long, short, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Inspect on every detection signal until SIGINT/SIGTERM (default).
    Run,
    /// Run one inspection now and print the record as JSON.
    Inspect,
    /// Start or stop the conveyor.
    Conveyor {
        #[arg(value_enum)]
        action: ConveyorAction,
    },
    /// Send a ping to the controller.
    Ping,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ConveyorAction {
    Start,
    Stop,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = InspectorConfig::load(cli.config.as_deref())?;

    // The OTLP exporters need a Tokio runtime that outlives the guard.
    let (_telemetry, _runtime) = if let Some(endpoint) = config.otel_endpoint.as_ref() {
        let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
        let guard = rt.block_on(async {
            TelemetryGuard::init(
                "inspector",
                endpoint,
                config.log_level.as_deref(),
                config.environment,
            )
        })?;
        (Some(guard), Some(rt))
    } else {
        common::setup_logging(config.log_level.as_deref(), config.environment);
        (None, None)
    };

    tracing::debug!(?config, "Configuration loaded");

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&config),
        Command::Inspect => inspect(&config),
        Command::Conveyor { action } => {
            let command = match action {
                ConveyorAction::Start => ProtocolCommand::StartConveyor,
                ConveyorAction::Stop => ProtocolCommand::StopConveyor,
            };
            send_one(&config, command)
        }
        Command::Ping => send_one(&config, ProtocolCommand::Ping),
    }
}

fn run(config: &InspectorConfig) -> anyhow::Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));
    flag::register(SIGTERM, Arc::clone(&shutdown))?;
    flag::register(SIGINT, Arc::clone(&shutdown))?;
    tracing::info!("Signal handlers registered (SIGTERM, SIGINT)");

    let station = Station::assemble(config).context("Failed to assemble inspection station")?;
    let stats = station.run(&shutdown)?;

    tracing::info!(
        inspections = stats.inspections(),
        ok = stats.ok,
        ng = stats.ng,
        dropped = stats.dropped_triggers,
        send_failures = stats.send_failures,
        "Inspector stopped"
    );
    Ok(())
}

fn inspect(config: &InspectorConfig) -> anyhow::Result<()> {
    let station = Station::assemble(config).context("Failed to assemble inspection station")?;
    let record = station
        .inspect_once()
        .context("An inspection is already in progress")?;

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

/// One-shot commands go to the real controller or fail; no simulated fallback.
fn send_one(config: &InspectorConfig, command: ProtocolCommand) -> anyhow::Result<()> {
    let link =
        controller::establish_hardware(&config.link).context("Failed to connect controller")?;
    let result = link.send(command);
    link.disconnect();

    result.with_context(|| format!("Failed to send {command}"))?;
    tracing::info!(%command, link = %link.describe(), "Command sent");
    Ok(())
}
