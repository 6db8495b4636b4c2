//! regulatorsd entry point

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use common::service_bootstrap::{init_logging, print_startup_banner, ServiceInfo};
use common::FileErrorLogging;
use power_regulators::{
    config_file_parser, DeviceAccess, MemoryDeviceAccess, MemorySensors, Services, System,
};
use regulatorsd::{report_power_on_failure, Manager, ServiceConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "regulatorsd - voltage regulator control daemon")]
struct Args {
    /// Daemon settings file (YAML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Use in-memory registers instead of /dev/i2c-*
    #[arg(long)]
    simulate: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Configure devices and monitor sensors until stopped (default)
    Run,
    /// Check a regulators configuration file
    Validate {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Load the configuration and configure devices once
    Configure,
    /// Run one sensor monitoring cycle and print the readings as JSON
    MonitorOnce,
    /// Log a power-on failure error record, isolated to a rail when a sequencer is configured
    ReportFailure {
        #[arg(long)]
        timed_out: bool,
        #[arg(long, value_name = "ID", default_value = "")]
        power_supply_error: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = ServiceConfig::load(args.config.as_deref())?;
    if args.simulate {
        config.simulate = true;
    }

    let service = ServiceInfo::new(
        "regulatorsd",
        env!("CARGO_PKG_VERSION"),
        "Voltage regulator control daemon",
    );
    init_logging(
        &service,
        &config.logging.level,
        config.logging.dir.as_deref(),
        config.logging.json,
    )?;

    match args.command {
        Some(Commands::Validate { file }) => validate(&file),
        Some(Commands::ReportFailure {
            timed_out,
            power_supply_error,
        }) => {
            let error_logging = Arc::new(FileErrorLogging::new(&config.error_log_dir));
            report_power_on_failure(
                config.sequencer.as_ref(),
                error_logging,
                timed_out,
                &power_supply_error,
            )
        },
        Some(Commands::Configure) => {
            let (mut manager, _) = build_manager(config);
            if !manager.load_config_file() {
                anyhow::bail!("Configuration file not loaded");
            }
            manager.configure();
            Ok(())
        },
        Some(Commands::MonitorOnce) => {
            let (mut manager, sensors) = build_manager(config);
            if !manager.load_config_file() {
                anyhow::bail!("Configuration file not loaded");
            }
            manager.monitor_sensors();
            println!("{}", serde_json::to_string_pretty(&sensors.snapshot())?);
            Ok(())
        },
        Some(Commands::Run) | None => {
            print_startup_banner(&service);
            let (manager, _) = build_manager(config);
            manager.run().await
        },
    }
}

fn validate(file: &Path) -> anyhow::Result<()> {
    let (rules, chassis) = config_file_parser::parse(file)?;
    let system = System::new(rules, chassis)
        .with_context(|| format!("Invalid configuration file {}", file.display()))?;

    let devices: usize = system.chassis().iter().map(|c| c.devices().len()).sum();
    let rails: usize = system
        .chassis()
        .iter()
        .flat_map(|c| c.devices())
        .map(|d| d.rails().len())
        .sum();
    println!(
        "{}: {} rules, {} chassis, {} devices, {} rails",
        file.display(),
        system.rules().len(),
        system.chassis().len(),
        devices,
        rails
    );
    Ok(())
}

fn build_manager(config: ServiceConfig) -> (Manager, MemorySensors) {
    let sensors = MemorySensors::new();
    let services = Services::new(device_access(config.simulate), Arc::new(sensors.clone()));
    let error_logging = Arc::new(FileErrorLogging::new(&config.error_log_dir));
    (Manager::new(config, services, error_logging), sensors)
}

#[cfg(target_os = "linux")]
fn device_access(simulate: bool) -> Arc<dyn DeviceAccess> {
    if simulate {
        tracing::info!("Simulation mode: using in-memory device registers");
        Arc::new(MemoryDeviceAccess::new())
    } else {
        Arc::new(regulatorsd::hardware::I2cDeviceAccess::new())
    }
}

#[cfg(not(target_os = "linux"))]
fn device_access(simulate: bool) -> Arc<dyn DeviceAccess> {
    if !simulate {
        tracing::warn!("I2C device access requires Linux; using in-memory device registers");
    }
    Arc::new(MemoryDeviceAccess::new())
}
