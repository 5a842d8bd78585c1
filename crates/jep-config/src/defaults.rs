//! Built-in default values for every tunable in [`crate::Config`].
//!
//! Mirrors `jep_py/backend.py` and `jep_py/frontend.py`'s module-level
//! constants (`PORT_RANGE`, `LISTEN_QUEUE_LENGTH`, `TIMEOUT_BACKEND_ALIVE`,
//! `TIMEOUT_BACKEND_STARTUP`, `TIMEOUT_BACKEND_SHUTDOWN`) as owned Rust
//! values `ortho_config` can fall back to when no layer overrides them.

use std::time::Duration;

/// First port tried when scanning for a free backend listening port.
pub const DEFAULT_PORT_RANGE_START: u16 = 9001;

/// One past the last port tried (half-open range), per `jep_py/backend.py`'s
/// `PORT_RANGE = (9001, 9100)`.
pub const DEFAULT_PORT_RANGE_END: u16 = 9100;

/// `listen()` backlog depth, per `jep_py/backend.py`'s `LISTEN_QUEUE_LENGTH`.
pub const DEFAULT_LISTEN_BACKLOG: u32 = 3;

/// Readiness-multiplex poll timeout used by the backend's main loop.
pub const DEFAULT_SELECT_TIMEOUT: Duration = Duration::from_millis(500);

/// Interval between `BackendAlive` broadcasts while ≥ 1 frontend is connected.
pub const DEFAULT_BACKEND_ALIVE_INTERVAL: Duration = Duration::from_secs(60);

/// Idle duration after which a silent peer is disconnected.
pub const DEFAULT_LAST_MESSAGE_TIMEOUT: Duration = Duration::from_secs(10 * 60 + 30);

/// Deadline for observing the port announcement after spawning a backend.
pub const DEFAULT_BACKEND_STARTUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Deadline for a spawned backend to exit after a graceful `Shutdown`.
pub const DEFAULT_BACKEND_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-socket receive buffer size. Not given verbatim in the retrieved
/// source (`BUFFER_LENGTH`'s value was not present); a conventional
/// socket-buffer size is used instead.
pub const DEFAULT_RECV_BUFFER_LEN: usize = 4096;

/// Name of the service-configuration file discovered by the parent-directory
/// walk, per `jep/config.py`'s `CONFIG_FILE_NAME`.
pub const DEFAULT_SERVICE_CONFIG_FILE_NAME: &str = ".jep";

/// Default log filter expression used by `jepd`.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default log filter expression used by `jepd`.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

/// Default logging format for `jepd`.
#[must_use]
pub const fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}
