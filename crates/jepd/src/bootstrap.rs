//! Daemon bootstrap orchestration (component K, spec §4.G "Startup").
//!
//! Grounded in `weaverd::bootstrap`'s `ConfigLoader`/`Daemon`/
//! `bootstrap_with` shape, narrowed: a JEP backend has exactly one service
//! (itself) to stand up, so there is no `FusionBackends`-style lazy
//! multi-backend registry here, only the [`BackendServer`] directly.

use std::sync::Arc;

use ortho_config::OrthoError;
use thiserror::Error;

use jep_config::Config;

use crate::health::HealthReporter;
use crate::server::{BackendServer, ServerError};
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the daemon configuration.
    fn load(&self) -> Result<Config, Box<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Box<OrthoError>> {
        Config::load()
    }
}

/// Loader that returns a fixed, already-resolved configuration. Used by
/// tests that need to bypass CLI/environment/file layering.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader(Config);

impl StaticConfigLoader {
    /// Wraps `config` so it can be handed to [`bootstrap_with`].
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self(config)
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Box<OrthoError>> {
        Ok(self.0.clone())
    }
}

/// Errors surfaced during bootstrap, before the server has bound a socket.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Box<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
}

/// Result of a successful bootstrap invocation: a configured server, not
/// yet bound or running.
pub struct Daemon {
    config: Config,
    server: BackendServer,
    telemetry: TelemetryHandle,
    reporter: Arc<dyn HealthReporter>,
}

impl Daemon {
    fn new(
        config: Config,
        server: BackendServer,
        telemetry: TelemetryHandle,
        reporter: Arc<dyn HealthReporter>,
    ) -> Self {
        Self {
            config,
            server,
            telemetry,
            reporter,
        }
    }

    /// Accessor for the resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub const fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Mutable access to the server, for registering listeners and static
    /// syntax definitions before [`Daemon::run`].
    pub fn server_mut(&mut self) -> &mut BackendServer {
        &mut self.server
    }

    /// Binds the listening socket and runs the accept/dispatch loop until a
    /// shutdown is requested.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NoPortFound`] if no port in the configured
    /// range could be bound.
    pub fn run(mut self) -> Result<(), ServerError> {
        self.reporter.backend_starting(self.config.port_range());
        let port = self.server.listen(&self.config)?;
        self.reporter.backend_ready(port);
        self.server.run(&self.config);
        Ok(())
    }
}

/// Bootstraps the daemon using the supplied collaborators: loads
/// configuration, installs telemetry, and builds an idle [`BackendServer`].
///
/// # Errors
///
/// Returns [`BootstrapError::Configuration`] if configuration loading
/// fails, or [`BootstrapError::Telemetry`] if the tracing subscriber could
/// not be installed.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
) -> Result<Daemon, BootstrapError> {
    reporter.bootstrap_starting();

    let config = match loader.load() {
        Ok(config) => config,
        Err(source) => {
            let error = BootstrapError::Configuration { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    let telemetry = match telemetry::initialise(&config) {
        Ok(handle) => handle,
        Err(source) => {
            let error = BootstrapError::Telemetry { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    reporter.bootstrap_succeeded(&config);
    Ok(Daemon::new(config, BackendServer::new(), telemetry, reporter))
}

#[cfg(test)]
mod tests {
    #![expect(clippy::unwrap_used, reason = "tests use unwrap for clarity")]

    use super::*;
    use crate::health::StructuredHealthReporter;

    #[test]
    fn bootstraps_a_daemon_from_a_static_config() {
        let loader = StaticConfigLoader::new(Config::default());
        let reporter = Arc::new(StructuredHealthReporter::new());
        let daemon = bootstrap_with(&loader, reporter).unwrap();
        assert_eq!(daemon.config().port_range(), Config::default().port_range());
    }
}
