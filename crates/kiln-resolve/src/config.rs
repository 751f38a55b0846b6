//! Resolver configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default file name of the mod descriptor inside an archive or directory
pub const DEFAULT_DESCRIPTOR_NAME: &str = "kiln.mod.json";

pub const DEFAULT_DISCOVERY_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SOLVER_TIMEOUT_SECS: u64 = 30;

/// Tunables for discovery and solving.
///
/// Deserializable so front ends can read it from a config file; every field
/// falls back to its default when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Upper bound for the whole discovery phase
    pub discovery_timeout_secs: u64,
    /// Upper bound for one solver invocation, failure analysis included
    pub solver_timeout_secs: u64,
    /// Discovery worker count; `None` uses all but one core
    pub worker_threads: Option<usize>,
    /// Descriptor file looked up in archives and directories
    pub descriptor_name: String,
    /// File extensions treated as mod archives
    pub archive_extensions: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            discovery_timeout_secs: DEFAULT_DISCOVERY_TIMEOUT_SECS,
            solver_timeout_secs: DEFAULT_SOLVER_TIMEOUT_SECS,
            worker_threads: None,
            descriptor_name: DEFAULT_DESCRIPTOR_NAME.to_string(),
            archive_extensions: vec!["jar".to_string(), "zip".to_string()],
        }
    }
}

impl ResolverConfig {
    /// Number of concurrent discovery workers
    pub fn worker_count(&self) -> usize {
        match self.worker_threads {
            Some(n) => n.max(1),
            None => std::thread::available_parallelism()
                .map(|n| n.get().saturating_sub(1))
                .unwrap_or(1)
                .max(1),
        }
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_secs)
    }

    pub fn solver_timeout(&self) -> Duration {
        Duration::from_secs(self.solver_timeout_secs)
    }

    /// Check if a file extension marks a mod archive (case-insensitive)
    pub fn is_archive_extension(&self, extension: &str) -> bool {
        self.archive_extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ResolverConfig::default();
        assert_eq!(config.discovery_timeout(), Duration::from_secs(30));
        assert_eq!(config.descriptor_name, "kiln.mod.json");
        assert!(config.worker_count() >= 1);
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let config: ResolverConfig =
            serde_json::from_str(r#"{"solver_timeout_secs": 5, "worker_threads": 0}"#).unwrap();
        assert_eq!(config.solver_timeout(), Duration::from_secs(5));
        assert_eq!(config.discovery_timeout_secs, 30);
        assert_eq!(config.worker_count(), 1);
    }

    #[test]
    fn test_archive_extension() {
        let config = ResolverConfig::default();
        assert!(config.is_archive_extension("JAR"));
        assert!(config.is_archive_extension("zip"));
        assert!(!config.is_archive_extension("txt"));
    }
}
