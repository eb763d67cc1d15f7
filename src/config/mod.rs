//! Configuration management
//!
//! This module handles loading and managing configuration from
//! TOML files and CLI arguments.

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::core::constants::{probes, report, server, storage, timeouts};
use crate::core::error::{LinkProbeError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address the HTTP server listens on
    pub bind_address: Option<String>,

    /// Directory holding persisted batch records
    pub data_dir: Option<String>,

    /// Timeout in seconds for each probe request
    pub timeout: Option<u64>,

    /// Maximum number of probes simultaneously awaiting network I/O
    pub max_concurrent_probes: Option<usize>,

    /// Custom User-Agent header for probe requests
    pub user_agent: Option<String>,

    /// Seconds to wait for outstanding batches at shutdown
    pub shutdown_grace: Option<u64>,

    /// Result rows per page in rendered reports
    pub report_rows_per_page: Option<usize>,

    /// Enable verbose logging
    pub verbose: Option<bool>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: Some(server::DEFAULT_BIND_ADDRESS.to_string()),
            data_dir: Some(storage::DEFAULT_DATA_DIR.to_string()),
            timeout: Some(timeouts::DEFAULT_TIMEOUT_SECONDS),
            max_concurrent_probes: Some(probes::MAX_CONCURRENT_PROBES),
            user_agent: None, // Will default to crate name/version
            shutdown_grace: Some(timeouts::DEFAULT_SHUTDOWN_GRACE_SECONDS),
            report_rows_per_page: Some(report::DEFAULT_ROWS_PER_PAGE),
            verbose: Some(false),
        }
    }
}

/// CLI flag values merged over file-based configuration.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub bind_address: Option<String>,
    pub data_dir: Option<String>,
    pub timeout: Option<u64>,
    pub max_concurrent_probes: Option<usize>,
    pub user_agent: Option<String>,
    pub shutdown_grace: Option<u64>,
    pub verbose: bool,
}

impl Config {
    /// Load configuration from file, falling back to defaults
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            LinkProbeError::Config(format!(
                "Could not read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| {
            LinkProbeError::Config(format!(
                "Invalid TOML in config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Try to find and load a config file in standard locations
    pub fn load_from_standard_locations() -> Self {
        if let Ok(config) = Self::load_from_file(".linkprobe.toml") {
            return config;
        }

        Self::default()
    }

    /// Merge this config with CLI arguments (CLI takes precedence)
    pub fn merge_with_cli(&mut self, cli: &CliOverrides) {
        if let Some(ref bind_address) = cli.bind_address {
            self.bind_address = Some(bind_address.clone());
        }
        if let Some(ref data_dir) = cli.data_dir {
            self.data_dir = Some(data_dir.clone());
        }
        if let Some(timeout) = cli.timeout {
            self.timeout = Some(timeout);
        }
        if let Some(max_concurrent_probes) = cli.max_concurrent_probes {
            self.max_concurrent_probes = Some(max_concurrent_probes);
        }
        if let Some(ref user_agent) = cli.user_agent {
            self.user_agent = Some(user_agent.clone());
        }
        if let Some(shutdown_grace) = cli.shutdown_grace {
            self.shutdown_grace = Some(shutdown_grace);
        }
        if cli.verbose {
            self.verbose = Some(true);
        }
    }

    /// Get the listen address, parsed
    pub fn bind_address(&self) -> Result<SocketAddr> {
        let raw = self
            .bind_address
            .as_deref()
            .unwrap_or(server::DEFAULT_BIND_ADDRESS);
        raw.parse().map_err(|_| {
            LinkProbeError::Config(format!("Invalid bind address '{raw}'"))
        })
    }

    /// Get the data directory
    pub fn data_dir(&self) -> &str {
        self.data_dir.as_deref().unwrap_or(storage::DEFAULT_DATA_DIR)
    }

    /// Get probe timeout as Duration
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout.unwrap_or(timeouts::DEFAULT_TIMEOUT_SECONDS))
    }

    /// Get the shutdown grace window as Duration
    pub fn shutdown_grace_duration(&self) -> Duration {
        Duration::from_secs(
            self.shutdown_grace
                .unwrap_or(timeouts::DEFAULT_SHUTDOWN_GRACE_SECONDS),
        )
    }

    /// Get the report page size
    pub fn report_rows_per_page(&self) -> usize {
        self.report_rows_per_page
            .unwrap_or(report::DEFAULT_ROWS_PER_PAGE)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if let Some(timeout) = self.timeout {
            if timeout < timeouts::MIN_TIMEOUT_SECONDS {
                return Err(LinkProbeError::Config(
                    "Timeout cannot be 0. Expected a positive integer representing seconds."
                        .to_string(),
                ));
            }
            if timeout > timeouts::MAX_TIMEOUT_SECONDS {
                return Err(LinkProbeError::Config(format!(
                    "Timeout of {timeout} seconds is too large (max {} seconds).",
                    timeouts::MAX_TIMEOUT_SECONDS
                )));
            }
        }

        if let Some(0) = self.max_concurrent_probes {
            return Err(LinkProbeError::Config(
                "max_concurrent_probes must be at least 1".to_string(),
            ));
        }

        if let Some(0) = self.report_rows_per_page {
            return Err(LinkProbeError::Config(
                "report_rows_per_page must be at least 1".to_string(),
            ));
        }

        self.bind_address()?;

        Ok(())
    }
}
