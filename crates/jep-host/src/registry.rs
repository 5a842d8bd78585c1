//! Frontend registry (spec §4.J).
//!
//! Grounded in `examples/original_source/jep_py/frontend.py`'s `Frontend`:
//! a cache from a service configuration's [`jep_config::Selector`] to its
//! [`Connector`], recreated when the underlying `.jep` file's checksum
//! changes and lazily revived when a cached connector has gone idle.

use std::collections::HashMap;
use std::path::Path;

use jep_config::{Config, Selector, ServiceConfig};

use crate::connector::{Connector, ServiceTarget};
use crate::state::ConnectionState;

struct CacheEntry {
    connector: Connector,
    checksum: Option<[u8; 32]>,
}

/// Resolves an edited file to its (possibly freshly spawned) backend
/// connector, reusing one per distinct `.jep` selector.
pub struct FrontendRegistry {
    config: Config,
    service_config_file_name: String,
    connectors: HashMap<Selector, CacheEntry>,
}

impl FrontendRegistry {
    /// Builds an empty registry using `config`'s timeouts and service
    /// configuration file name.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let service_config_file_name = config.service_config_file_name().to_string();
        Self {
            config,
            service_config_file_name,
            connectors: HashMap::new(),
        }
    }

    /// Resolves `edited_file`'s governing `.jep` record and returns the
    /// connector responsible for it, creating, reconnecting, or lazily
    /// reviving it as needed (spec §4.J).
    pub fn get_connection(&mut self, edited_file: &Path) -> Option<&mut Connector> {
        let service_config = jep_config::provide_for(edited_file, &self.service_config_file_name)?;
        let selector = service_config.selector();
        let current_checksum = service_config.checksum();
        let target = target_for(&service_config);

        if let Some(entry) = self.connectors.get_mut(&selector) {
            if entry.checksum != current_checksum {
                entry.connector.reconnect(Some(target));
                entry.checksum = current_checksum;
            } else if entry.connector.state() == ConnectionState::Disconnected {
                entry.connector.connect();
            }
            return self.connectors.get_mut(&selector).map(|entry| &mut entry.connector);
        }

        let mut connector = Connector::new(target, &self.config);
        connector.connect();
        self.connectors.insert(
            selector.clone(),
            CacheEntry {
                connector,
                checksum: current_checksum,
            },
        );
        self.connectors.get_mut(&selector).map(|entry| &mut entry.connector)
    }
}

fn target_for(service_config: &ServiceConfig) -> ServiceTarget {
    let cwd = service_config
        .file
        .parent()
        .map_or_else(|| std::path::PathBuf::from("."), Path::to_path_buf);
    ServiceTarget {
        command: service_config.command.clone(),
        cwd,
    }
}

#[cfg(test)]
mod tests {
    #![expect(clippy::unwrap_used, reason = "tests use unwrap for clarity")]

    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn creates_and_connects_on_first_resolution() {
        let root = tempdir().unwrap();
        fs::write(root.path().join(".jep"), "*.rs:\ntrue\n").unwrap();
        let edited = root.path().join("main.rs");
        fs::write(&edited, "fn main() {}").unwrap();

        let mut registry = FrontendRegistry::new(Config::default());
        let connector = registry.get_connection(&edited);
        assert!(connector.is_some());
    }

    #[test]
    fn returns_none_without_a_matching_service_config() {
        let root = tempdir().unwrap();
        let edited = root.path().join("main.rs");
        fs::write(&edited, "fn main() {}").unwrap();

        let mut registry = FrontendRegistry::new(Config::default());
        assert!(registry.get_connection(&edited).is_none());
    }
}
