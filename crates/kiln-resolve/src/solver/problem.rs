use std::fmt;

use kiln_semver::Version;

use super::fix::AddedMod;
use crate::candidate::{CandidateId, CandidateRecord};
use crate::metadata::Dependency;
use crate::report;

/// A candidate by identity, detached from the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModRef {
    pub candidate: CandidateId,
    pub identifier: String,
    pub version: Version,
}

impl ModRef {
    pub fn of(record: &CandidateRecord) -> Self {
        Self {
            candidate: record.id,
            identifier: record.identifier().to_string(),
            version: record.version().clone(),
        }
    }
}

impl fmt::Display for ModRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' {}", self.identifier, self.version)
    }
}

/// One dependency edge that had to be switched off to make the set solvable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Explanation {
    pub source: ModRef,
    pub dependency: Dependency,
    /// Candidates of the target that were present at the time
    pub present: Vec<ModRef>,
}

/// An existing mod swapped for a different version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub old: ModRef,
    pub new: AddedMod,
}

/// Changes to the mod set that make it solvable
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fix {
    pub additions: Vec<AddedMod>,
    pub removals: Vec<ModRef>,
    pub replacements: Vec<Replacement>,
}

impl Fix {
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty() && self.replacements.is_empty()
    }
}

/// Why the mod set could not be resolved, and how it might be fixed
#[derive(Debug, Clone)]
pub struct ResolutionFailure {
    pub explanations: Vec<Explanation>,
    /// `None` if even adding and removing mods cannot help
    pub fix: Option<Fix>,
    description: String,
}

impl ResolutionFailure {
    pub fn new(explanations: Vec<Explanation>, fix: Option<Fix>) -> Self {
        let description = report::describe_failure(&explanations, fix.as_ref());
        Self {
            explanations,
            fix,
            description,
        }
    }

    /// Multi-line human-readable report
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

impl std::error::Error for ResolutionFailure {}

/// Candidates chosen by a successful solve, in priority order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub selected: Vec<CandidateId>,
}

impl Selection {
    pub fn contains(&self, id: CandidateId) -> bool {
        self.selected.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}

/// Outcome of a solve that finished in time
#[derive(Debug, Clone)]
pub enum Resolution {
    Success(Selection),
    Failure(ResolutionFailure),
}

impl Resolution {
    pub fn is_success(&self) -> bool {
        matches!(self, Resolution::Success(_))
    }
}
