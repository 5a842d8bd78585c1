//! Structured health reporting for backend server lifecycle events.

use jep_config::Config;

use crate::bootstrap::BootstrapError;
use crate::server::ServerError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

macro_rules! health_event {
    (info, $($rest:tt)*) => {
        tracing::info!(target: HEALTH_TARGET, $($rest)*);
    };
    (error, $($rest:tt)*) => {
        tracing::error!(target: HEALTH_TARGET, $($rest)*);
    };
}

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked before the backend attempts to bind its listening socket.
    fn backend_starting(&self, port_range: std::ops::Range<u16>);

    /// Invoked once the backend is bound and accepting connections.
    fn backend_ready(&self, port: u16);

    /// Invoked when no port in the configured range could be bound.
    fn backend_failed(&self, error: &ServerError);
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        health_event!(
            info,
            event = "bootstrap_starting",
            "starting backend bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        health_event!(
            info,
            event = "bootstrap_succeeded",
            port_range_start = config.port_range().start,
            port_range_end = config.port_range().end,
            log_filter = %config.log_filter(),
            log_format = ?config.log_format(),
            "backend bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        health_event!(
            error,
            event = "bootstrap_failed",
            error = %error,
            "backend bootstrap failed"
        );
    }

    fn backend_starting(&self, port_range: std::ops::Range<u16>) {
        health_event!(
            info,
            event = "backend_starting",
            start = port_range.start,
            end = port_range.end,
            "scanning for a free listening port"
        );
    }

    fn backend_ready(&self, port: u16) {
        health_event!(info, event = "backend_ready", port, "backend ready");
    }

    fn backend_failed(&self, error: &ServerError) {
        health_event!(error, event = "backend_failed", error = %error, "backend failed to start");
    }
}
