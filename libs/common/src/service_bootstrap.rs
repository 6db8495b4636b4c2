//! Unified service bootstrap utilities
//!
//! Startup banner and logging initialization shared by the service binaries.

use std::path::PathBuf;

use crate::logging::{self, LogConfig};
use tracing::info;

/// Service metadata for startup
pub struct ServiceInfo {
    /// Service name (e.g., "regulatorsd")
    pub name: String,
    /// Service version from Cargo.toml
    pub version: String,
    /// Service description
    pub description: String,
}

impl ServiceInfo {
    /// Create new service info
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: description.into(),
        }
    }
}

/// Print startup banner
pub fn print_startup_banner(service: &ServiceInfo) {
    info!("");
    info!(" {} v{}", service.name.to_uppercase(), service.version);
    info!(" {}", service.description);
    info!("");
}

/// Initialize logging for a service
///
/// Log directory priority:
/// 1. `POWER_LOG_DIR` environment variable
/// 2. `log_dir` argument (from the service configuration)
/// 3. console only
pub fn init_logging(
    service: &ServiceInfo,
    level: &str,
    log_dir: Option<&str>,
    enable_json: bool,
) -> anyhow::Result<()> {
    let log_dir = std::env::var("POWER_LOG_DIR")
        .ok()
        .or_else(|| log_dir.map(str::to_string))
        .filter(|dir| !dir.is_empty())
        .map(|dir| PathBuf::from(dir).join(&service.name));

    let log_config = LogConfig {
        service_name: service.name.clone(),
        log_dir,
        level: logging::parse_level(level),
        enable_json,
    };

    logging::init_with_config(log_config).map_err(|e| anyhow::anyhow!("{}", e))?;

    Ok(())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_service_info_creation() {
        let service = ServiceInfo::new("test_service", "1.0.0", "Test Service");
        assert_eq!(service.name, "test_service");
        assert_eq!(service.version, "1.0.0");
        assert_eq!(service.description, "Test Service");
    }
}
