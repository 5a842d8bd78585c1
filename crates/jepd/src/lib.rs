//! Backend-side implementation of the Joint Editors Protocol.
//!
//! Owns everything a JEP backend process needs once launched by a frontend
//! connector: the accept/dispatch loop (`server`), the per-connection
//! content mirror (`content`), the static syntax catalog (`syntax`), and the
//! glue that wires configuration loading, telemetry, and signal-driven
//! shutdown together (`bootstrap`, `health`, `telemetry`). The wire format
//! itself lives in `jep-protocol`; this crate only ever sees decoded
//! [`jep_protocol::Message`] values.

mod bootstrap;
mod content;
mod health;
mod server;
mod syntax;
mod telemetry;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use content::{ContentMonitor, NewlineMode, SynchronizationResult};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use server::{BackendServer, ClientRecord, ServerError, ShutdownHandle, State};
pub use syntax::{SyntaxFile, SyntaxFileSet};
pub use telemetry::{TelemetryError, TelemetryHandle};
