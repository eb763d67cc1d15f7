use crate::config::Config;
use log::{debug, info};

/// Initialize the logger with appropriate level based on verbosity
pub fn init_logger(verbose: bool, quiet: bool) {
    let level = if quiet {
        log::LevelFilter::Off
    } else if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();

    debug!("Logger initialized with level: {level:?}");
}

/// Log effective configuration at startup
pub fn log_config_info(config: &Config) {
    let timeout = config.timeout.unwrap_or_default();
    let max_concurrent = config.max_concurrent_probes.unwrap_or_default();
    let shutdown_grace = config.shutdown_grace.unwrap_or_default();

    info!(
        "Configuration: timeout={timeout}s, max_concurrent_probes={max_concurrent}, shutdown_grace={shutdown_grace}s"
    );
    info!("Data directory: {}", config.data_dir());
}

/// Log per-batch completion for debugging
pub fn log_batch_result(batch_id: u64, total: usize, available: usize) {
    debug!("batch {batch_id}: {available}/{total} URLs available");
}
