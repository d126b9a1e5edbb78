//! Structured logging setup and the verbosity-gated debug macro.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{ProtocolError, Result};

/// Emit a `tracing::debug!` event only when `$verbosity` is within the
/// current debug level held by `$cell` (a [`DebugLevel`](crate::protocol::state::DebugLevel)).
///
/// ```rust
/// use genl_control::debugf;
/// use genl_control::protocol::state::DebugLevel;
///
/// let level = DebugLevel::new(2);
/// debugf!(level, 1, port_id = 7u32, "emitted");
/// debugf!(level, 4, "suppressed");
/// ```
#[macro_export]
macro_rules! debugf {
    ($cell:expr, $verbosity:expr, $($arg:tt)+) => {
        if $cell.enabled($verbosity) {
            $crate::__tracing::debug!(verbosity = $verbosity, $($arg)+);
        }
    };
}

/// Install the global subscriber described by `config`
///
/// `RUST_LOG` overrides the configured level when set.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str().to_ascii_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = match (config.log_to_file, config.json_format) {
        (true, json) => {
            let path = config.log_file_path.as_deref().ok_or_else(|| {
                ProtocolError::ConfigError("log_file_path must be set to log to file".into())
            })?;
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let builder = builder.with_writer(Mutex::new(file)).with_ansi(false);
            if json {
                builder.json().try_init()
            } else {
                builder.try_init()
            }
        }
        (false, true) => builder.json().try_init(),
        (false, false) => builder.try_init(),
    };

    installed.map_err(|e| ProtocolError::ConfigError(format!("Failed to install logger: {e}")))?;
    tracing::info!(app = %config.app_name, level = %config.log_level, "Logging initialized");
    Ok(())
}
