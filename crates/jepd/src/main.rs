//! `jepd` process entry point (component K, spec §4.G/§6).
//!
//! Loads configuration, installs telemetry, binds the backend's listening
//! socket, and runs the accept/dispatch loop until a termination signal
//! (`SIGINT`/`SIGTERM`) requests a graceful shutdown.

use std::process::ExitCode;
use std::sync::Arc;
use std::thread;

use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

use jepd::{SystemConfigLoader, StructuredHealthReporter, bootstrap_with};

const MAIN_TARGET: &str = "jepd::main";

fn main() -> ExitCode {
    let reporter = Arc::new(StructuredHealthReporter::new());
    let mut daemon = match bootstrap_with(&SystemConfigLoader, reporter) {
        Ok(daemon) => daemon,
        Err(error) => {
            tracing::error!(target: MAIN_TARGET, %error, "daemon bootstrap failed");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = daemon.server_mut().shutdown_handle();
    if let Err(error) = spawn_signal_watcher(shutdown) {
        tracing::error!(target: MAIN_TARGET, %error, "failed to install signal handlers");
        return ExitCode::FAILURE;
    }

    match daemon.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(target: MAIN_TARGET, %error, "backend server failed");
            ExitCode::FAILURE
        }
    }
}

/// Spawns a background thread that requests a graceful shutdown the first
/// time `SIGINT` or `SIGTERM` arrives, matching `jep_py/backend.py`'s
/// signal-driven stop.
fn spawn_signal_watcher(shutdown: jepd::ShutdownHandle) -> std::io::Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    thread::spawn(move || {
        if let Some(signal) = signals.forever().next() {
            tracing::info!(target: MAIN_TARGET, signal, "shutdown signal received");
            shutdown.request_shutdown();
        }
    });
    Ok(())
}
