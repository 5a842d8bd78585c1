//! Frontend-side connection management for the Joint Editors Protocol.
#![deny(missing_docs)]
//!
//! Owns the editor-facing half of JEP: resolving which backend governs an
//! edited file (`jep-config`'s service configuration resolver), spawning
//! and supervising that backend's process, and driving its connection
//! state machine (spec §4.H, §4.I, §4.J). The wire format itself lives in
//! `jep-protocol`; this crate only ever sees decoded [`jep_protocol::Message`]
//! values.

pub mod connector;
pub mod error;
pub mod output_reader;
pub mod registry;
pub mod state;

pub use connector::{
    Connector, ConnectorCore, ConnectorListener, ProcessLauncher, ServiceTarget,
    SystemProcessLauncher,
};
pub use error::ConnectorError;
pub use output_reader::OutputReader;
pub use registry::FrontendRegistry;
pub use state::ConnectionState;
