//! Layered runtime configuration and the service-configuration resolver for
//! the Joint Editors Protocol.
//!
//! `jepd` and `jep-host` both depend on this crate: `jepd` for the
//! ambient-stack tunables (port range, timeouts, logging), `jep-host` for
//! the `.jep` file resolution that tells its frontend registry which
//! backend command to launch for an edited file.

pub mod config;
pub mod defaults;
pub mod logging;
pub mod resolver;

pub use config::Config;
pub use logging::{LogFormat, LogFormatParseError};
pub use resolver::{provide_for, Selector, ServiceConfig};
