//! Connector-internal failure modes (spec §7).
//!
//! None of these ever escape [`crate::connector::Connector`]'s public
//! operations: per spec, spawn/connect/send failures are logged and drive a
//! state transition (usually cleanup), never a propagated `Result`.

use std::io;

/// A failure encountered while driving the connector's state machine.
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    /// The backend process could not be spawned.
    #[error("failed to spawn backend process: {0}")]
    Spawn(#[source] io::Error),
    /// The announced port could not be connected to.
    #[error("failed to connect to backend on port {port}: {source}")]
    Connect {
        /// Port taken from the backend's startup announcement.
        port: u16,
        /// Underlying connect failure.
        #[source]
        source: io::Error,
    },
}
