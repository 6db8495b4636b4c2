//! Regulators manager
//!
//! Owns the loaded `System` and drives configuration, periodic sensor
//! monitoring and reloads for the daemon.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use common::shutdown::{wait_for_shutdown, HangupSignal};
use common::{ErrorLogging, ErrorRecord, Severity};
use power_regulators::{config_file_parser, format_error_chain, Services, System};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::ServiceConfig;

/// Error record logged when the regulators configuration cannot be loaded
pub const CONFIG_FILE_ERROR: &str = "xyz.openbmc_project.Power.Regulators.Error.ConfigFile";

const DEFAULT_CONFIG_FILE_NAME: &str = "config.json";

/// Candidate file names, most specific first
///
/// For each compatible system type: the full name, then its last dotted
/// segment. `config.json` is always last.
pub fn config_file_names(compatible_system_types: &[String]) -> Vec<String> {
    let mut names = Vec::new();
    for system_type in compatible_system_types {
        names.push(format!("{}.json", system_type));
        if let Some((_, last)) = system_type.rsplit_once('.') {
            if !last.is_empty() {
                names.push(format!("{}.json", last));
            }
        }
    }
    names.push(DEFAULT_CONFIG_FILE_NAME.to_string());
    names
}

/// First existing config file; every directory is tried for one name before the next
pub fn find_config_file(
    config_dirs: &[PathBuf],
    compatible_system_types: &[String],
) -> Option<PathBuf> {
    config_file_names(compatible_system_types)
        .iter()
        .flat_map(|name| config_dirs.iter().map(move |dir| dir.join(name)))
        .find(|path| path.exists())
}

pub struct Manager {
    config: ServiceConfig,
    services: Services,
    error_logging: Arc<dyn ErrorLogging>,
    system: Option<Arc<System>>,
}

impl Manager {
    pub fn new(
        config: ServiceConfig,
        services: Services,
        error_logging: Arc<dyn ErrorLogging>,
    ) -> Self {
        Self {
            config,
            services,
            error_logging,
            system: None,
        }
    }

    pub fn system(&self) -> Option<&System> {
        self.system.as_deref()
    }

    pub fn is_config_file_loaded(&self) -> bool {
        self.system.is_some()
    }

    /// Configured file, or the result of discovery
    pub fn config_file_path(&self) -> Option<PathBuf> {
        match &self.config.config_file {
            Some(path) => Some(path.clone()),
            None => find_config_file(
                &self.config.config_dirs,
                &self.config.compatible_system_types,
            ),
        }
    }

    /// Load (or reload) the regulators configuration
    ///
    /// On failure the previously loaded system, if any, stays in place.
    pub fn load_config_file(&mut self) -> bool {
        let Some(path) = self.config_file_path() else {
            warn!("No regulators configuration file found");
            return false;
        };
        self.load_from(&path)
    }

    pub fn load_from(&mut self, path: &Path) -> bool {
        info!("Loading configuration file {}", path.display());

        let result = config_file_parser::parse(path)
            .and_then(|(rules, chassis)| System::new(rules, chassis));
        match result {
            Ok(system) => {
                info!(
                    "Loaded {} rules and {} chassis",
                    system.rules().len(),
                    system.chassis().len()
                );
                self.system = Some(Arc::new(system));
                true
            },
            Err(e) => {
                let chain = format_error_chain(&e);
                error!("{}", chain);
                error!("Unable to load configuration file");
                self.log_config_file_error(path, chain);
                false
            },
        }
    }

    fn log_config_file_error(&self, path: &Path, chain: String) {
        let mut additional_data = BTreeMap::new();
        additional_data.insert("CONFIG_FILE".to_string(), path.display().to_string());
        additional_data.insert("ERROR".to_string(), chain);
        additional_data.insert("_PID".to_string(), std::process::id().to_string());
        let record = ErrorRecord::new(CONFIG_FILE_ERROR, Severity::Error, additional_data);

        if let Err(e) = self.error_logging.submit(&record) {
            error!(
                "Unable to log error, message: {}, error {}",
                CONFIG_FILE_ERROR, e
            );
        }
    }

    pub fn configure(&self) {
        match &self.system {
            Some(system) => system.configure(&self.services),
            None => warn!("Unable to configure regulator devices: Configuration file not loaded"),
        }
    }

    pub fn monitor_sensors(&self) {
        if let Some(system) = &self.system {
            system.monitor_sensors(&self.services);
        }
    }

    /// Configure, then monitor until a shutdown signal; SIGHUP reloads
    pub async fn run(mut self) -> anyhow::Result<()> {
        self.load_config_file();
        self.configure();

        let mut interval =
            tokio::time::interval(Duration::from_millis(self.config.sensor_interval_ms));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut hangup = HangupSignal::new();
        let shutdown = wait_for_shutdown();
        tokio::pin!(shutdown);

        info!(
            "Monitoring sensors every {}ms",
            self.config.sensor_interval_ms
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
                _ = hangup.recv() => {
                    info!("SIGHUP received, reloading configuration file");
                    self.load_config_file();
                }
                _ = interval.tick() => {
                    let Some(system) = self.system.clone() else {
                        continue;
                    };
                    let services = self.services.clone();
                    // Register I/O blocks
                    let cycle = tokio::task::spawn_blocking(move || {
                        system.monitor_sensors(&services);
                    });
                    if let Err(e) = cycle.await {
                        error!("Sensor monitoring task failed: {}", e);
                    } else {
                        debug!("Sensor monitoring cycle complete");
                    }
                }
            }
        }

        info!("regulatorsd stopped");
        Ok(())
    }
}
