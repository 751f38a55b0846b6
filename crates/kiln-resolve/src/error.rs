use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::solver::ResolutionFailure;

/// A fatal problem with the discovered mod set.
///
/// These abort resolution: a silently ignored bad identifier would otherwise
/// surface later as an inexplicable dependency mismatch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Mod at {location} has invalid identifier \"{id}\"")]
    InvalidIdentifier { id: String, location: String },

    #[error("Mod \"{id}\" at {location} provides invalid identifier \"{alias}\"")]
    InvalidAlias { id: String, alias: String, location: String },

    #[error("Malformed mod descriptor at {location}: {reason}")]
    MalformedDescriptor { location: String, reason: String },

    #[error("Mod \"{id}\" is present more than once: version {first} at {first_location} and version {second} at {second_location}")]
    DuplicateRoot {
        id: String,
        first: String,
        first_location: String,
        second: String,
        second_location: String,
    },
}

/// A localized, non-fatal failure while reading one discovery item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryFailure {
    /// Canonical location of the item
    pub location: String,
    /// What went wrong
    pub reason: String,
}

impl DiscoveryFailure {
    pub fn new(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for DiscoveryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.reason)
    }
}

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Errors that end the discovery phase
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Invalid mod configuration:\n{}", join_errors(.0))]
    Configuration(Vec<ConfigError>),

    #[error("Mod discovery did not finish within {0:?}")]
    Timeout(Duration),
}

/// The solver ran out of time before proving an answer
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Mod resolution did not finish within {0:?}")]
pub struct SolverTimeout(pub Duration);

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("{0}")]
    Unresolvable(Box<ResolutionFailure>),

    #[error(transparent)]
    SolverTimeout(#[from] SolverTimeout),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Resolver task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, ResolveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_lists_every_problem() {
        let error = DiscoveryError::Configuration(vec![
            ConfigError::InvalidIdentifier {
                id: "Bad".to_string(),
                location: "mods/bad.jar".to_string(),
            },
            ConfigError::MalformedDescriptor {
                location: "mods/broken.jar".to_string(),
                reason: "expected value".to_string(),
            },
        ]);

        let message = error.to_string();
        assert!(message.contains("\"Bad\""));
        assert!(message.contains("mods/broken.jar"));
        assert_eq!(message.lines().count(), 3);
    }

    #[test]
    fn test_timeouts_are_distinct() {
        let discovery = DiscoveryError::Timeout(Duration::from_secs(30));
        let solver = ResolveError::from(SolverTimeout(Duration::from_secs(10)));

        assert!(discovery.to_string().contains("discovery"));
        assert!(solver.to_string().contains("resolution"));
        assert!(matches!(solver, ResolveError::SolverTimeout(_)));
    }
}
