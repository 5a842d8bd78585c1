//! Connector lifecycle states (spec §4.H).

use std::fmt;

/// Where a [`crate::connector::Connector`] sits in its state machine.
///
/// ```text
/// Disconnected --connect()--> Connecting --port seen+socket ok--> Connected
///      ^                                |                              |
///      |                                +--timeout or spawn err--+     |
///      |                                                         v     |
///      +---cleanup complete--- Disconnecting <--disconnect()/fatal-----+
///                                 |
///                                 +--process exit or shutdown timeout--> cleanup
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No process, no socket. The resting state.
    Disconnected,
    /// Backend process spawned; waiting for its port announcement and a
    /// successful socket connect.
    Connecting,
    /// Socket open; messages flow in both directions.
    Connected,
    /// `Shutdown` sent (best-effort); waiting for the process to exit.
    Disconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Disconnecting => "Disconnecting",
        };
        formatter.write_str(label)
    }
}
