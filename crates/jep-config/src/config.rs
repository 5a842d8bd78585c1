//! Layered runtime configuration for JEP binaries.
//!
//! Loaded with `ortho_config` the way `weaver-config::Config` is: defaults,
//! overridden by an optional configuration file, overridden by environment
//! variables (`JEP_*`), overridden by CLI flags. Every tunable constant
//! `jep_py`/`jep` hard-code inline is exposed here as an overridable field
//! (SPEC_FULL.md §1.3).

use std::ffi::OsString;
use std::time::Duration;

use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};

use crate::defaults::{
    DEFAULT_BACKEND_ALIVE_INTERVAL, DEFAULT_BACKEND_SHUTDOWN_TIMEOUT,
    DEFAULT_BACKEND_STARTUP_TIMEOUT, DEFAULT_LAST_MESSAGE_TIMEOUT, DEFAULT_LISTEN_BACKLOG,
    DEFAULT_LOG_FILTER, DEFAULT_PORT_RANGE_END, DEFAULT_PORT_RANGE_START, DEFAULT_RECV_BUFFER_LEN,
    DEFAULT_SELECT_TIMEOUT, DEFAULT_SERVICE_CONFIG_FILE_NAME, default_log_filter_string,
    default_log_format,
};
use crate::logging::LogFormat;

/// Layered runtime configuration shared by `jepd` and `jep-host` consumers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "JEP")]
pub struct Config {
    /// First port tried when a backend scans for a free listening port.
    #[ortho_config(default = DEFAULT_PORT_RANGE_START)]
    port_range_start: u16,

    /// One past the last port tried (half-open range).
    #[ortho_config(default = DEFAULT_PORT_RANGE_END)]
    port_range_end: u16,

    /// `listen()` backlog depth for the backend's listening socket.
    #[ortho_config(default = DEFAULT_LISTEN_BACKLOG)]
    listen_backlog: u32,

    /// Readiness-multiplex poll timeout, in milliseconds.
    #[ortho_config(default = 500)]
    select_timeout_ms: u64,

    /// Interval, in seconds, between `BackendAlive` broadcasts.
    #[ortho_config(default = 60)]
    backend_alive_interval_secs: u64,

    /// Idle duration, in seconds, after which a silent peer is disconnected.
    #[ortho_config(default = 630)]
    last_message_timeout_secs: u64,

    /// Deadline, in seconds, for observing a backend's port announcement.
    #[ortho_config(default = 5)]
    backend_startup_timeout_secs: u64,

    /// Deadline, in seconds, for a spawned backend to exit after `Shutdown`.
    #[ortho_config(default = 5)]
    backend_shutdown_timeout_secs: u64,

    /// Per-socket receive buffer size, in bytes.
    #[ortho_config(default = DEFAULT_RECV_BUFFER_LEN)]
    recv_buffer_len: usize,

    /// File name the service configuration resolver looks for while walking
    /// parent directories.
    #[ortho_config(default_fn = "default_service_config_file_name")]
    service_config_file_name: String,

    /// `tracing_subscriber::EnvFilter` expression.
    #[ortho_config(default_fn = "default_log_filter_string")]
    log_filter: String,

    /// Structured logging output format.
    #[ortho_config(default_fn = "default_log_format")]
    log_format: LogFormat,
}

fn default_service_config_file_name() -> String {
    DEFAULT_SERVICE_CONFIG_FILE_NAME.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port_range_start: DEFAULT_PORT_RANGE_START,
            port_range_end: DEFAULT_PORT_RANGE_END,
            listen_backlog: DEFAULT_LISTEN_BACKLOG,
            select_timeout_ms: u64::try_from(DEFAULT_SELECT_TIMEOUT.as_millis()).unwrap_or(500),
            backend_alive_interval_secs: DEFAULT_BACKEND_ALIVE_INTERVAL.as_secs(),
            last_message_timeout_secs: DEFAULT_LAST_MESSAGE_TIMEOUT.as_secs(),
            backend_startup_timeout_secs: DEFAULT_BACKEND_STARTUP_TIMEOUT.as_secs(),
            backend_shutdown_timeout_secs: DEFAULT_BACKEND_SHUTDOWN_TIMEOUT.as_secs(),
            recv_buffer_len: DEFAULT_RECV_BUFFER_LEN,
            service_config_file_name: default_service_config_file_name(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Loads configuration from the process's own command-line arguments,
    /// environment, and discovered configuration files.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`OrthoError`] when any configuration layer
    /// fails to parse.
    pub fn load() -> Result<Self, Box<OrthoError>> {
        <Self as OrthoConfig>::load().map_err(Box::new)
    }

    /// Loads configuration from an explicit argument iterator, bypassing
    /// `std::env::args_os`. Used by callers that pre-filter CLI arguments
    /// (mirrors `weaver-config::Config::load_from_iter`).
    ///
    /// # Errors
    ///
    /// Returns the underlying [`OrthoError`] when any configuration layer
    /// fails to parse.
    pub fn load_from_iter<I, T>(args: I) -> Result<Self, Box<OrthoError>>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as OrthoConfig>::load_from_iter(args).map_err(Box::new)
    }

    /// The inclusive-start, exclusive-end range of ports a backend scans.
    #[must_use]
    pub const fn port_range(&self) -> std::ops::Range<u16> {
        self.port_range_start..self.port_range_end
    }

    /// `listen()` backlog depth.
    #[must_use]
    pub const fn listen_backlog(&self) -> u32 {
        self.listen_backlog
    }

    /// Readiness-multiplex poll timeout.
    #[must_use]
    pub const fn select_timeout(&self) -> Duration {
        Duration::from_millis(self.select_timeout_ms)
    }

    /// Interval between `BackendAlive` broadcasts.
    #[must_use]
    pub const fn backend_alive_interval(&self) -> Duration {
        Duration::from_secs(self.backend_alive_interval_secs)
    }

    /// Idle duration after which a silent peer is disconnected.
    #[must_use]
    pub const fn last_message_timeout(&self) -> Duration {
        Duration::from_secs(self.last_message_timeout_secs)
    }

    /// Deadline for observing a backend's port announcement.
    #[must_use]
    pub const fn backend_startup_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_startup_timeout_secs)
    }

    /// Deadline for a spawned backend to exit after a graceful `Shutdown`.
    #[must_use]
    pub const fn backend_shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_shutdown_timeout_secs)
    }

    /// Per-socket receive buffer size, in bytes.
    #[must_use]
    pub const fn recv_buffer_len(&self) -> usize {
        self.recv_buffer_len
    }

    /// File name the service configuration resolver searches for.
    #[must_use]
    pub fn service_config_file_name(&self) -> &str {
        &self.service_config_file_name
    }

    /// `tracing_subscriber::EnvFilter` expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Structured logging output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

#[cfg(test)]
mod tests {
    #![expect(clippy::expect_used, reason = "tests use expect for clarity")]

    use super::*;

    #[test]
    fn defaults_match_the_documented_protocol_constants() {
        let config = Config::default();
        assert_eq!(config.port_range(), 9001..9100);
        assert_eq!(config.listen_backlog(), 3);
        assert_eq!(config.select_timeout(), Duration::from_millis(500));
        assert_eq!(config.backend_alive_interval(), Duration::from_secs(60));
        assert_eq!(
            config.last_message_timeout(),
            Duration::from_secs(10 * 60 + 30)
        );
        assert_eq!(config.backend_startup_timeout(), Duration::from_secs(5));
        assert_eq!(config.backend_shutdown_timeout(), Duration::from_secs(5));
        assert_eq!(config.service_config_file_name(), ".jep");
        assert_eq!(config.log_filter(), "info");
        assert_eq!(config.log_format(), LogFormat::Json);
    }
}
