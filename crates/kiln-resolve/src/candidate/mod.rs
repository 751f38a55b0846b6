//! Candidate model: one discovered mod version and where it came from.
//!
//! Candidates live in an arena ([`CandidateStore`]) keyed by [`CandidateId`];
//! containment is stored as id lists on both sides of the edge.

mod content;
mod group;

pub use content::{ArchiveStore, ByteCache};
pub use group::{CandidateGroup, CandidateStore, InsertOutcome, NewCandidate};

use std::fmt;
use std::path::PathBuf;

use kiln_semver::Version;
use sha2::digest::Output;
use sha2::{Digest, Sha256};

use crate::metadata::{LoadCondition, ModMetadata};

/// Arena index of a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CandidateId(pub u32);

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Size and SHA-256 of a byte buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash {
    pub size: u64,
    pub sha256: [u8; 32],
}

impl ContentHash {
    /// Hash a byte buffer
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self {
            size: bytes.len() as u64,
            sha256: hasher.finalize().into(),
        }
    }

    /// Full lowercase hex digest
    pub fn hex(&self) -> String {
        format!("{:x}", Output::<Sha256>::from(self.sha256))
    }

    /// First 16 hex digits, used in generated names
    pub fn short_hex(&self) -> String {
        self.hex()[..16].to_string()
    }
}

/// Where a candidate's content lives
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModLocation {
    /// Archive file on disk
    File(PathBuf),
    /// Unpacked mod directory on disk
    Directory(PathBuf),
    /// Nested archive extracted into the [`ArchiveStore`]
    Stored {
        /// Generated store name
        name: String,
        /// Entry path inside the containing archive
        entry: String,
        hash: ContentHash,
    },
    /// Synthesized host or runtime mod
    Builtin(String),
}

impl ModLocation {
    /// Normalized key used for dedup and cycle detection
    pub fn canonical_key(&self) -> String {
        match self {
            ModLocation::File(path) | ModLocation::Directory(path) => {
                format!("file:{}", path.display())
            }
            ModLocation::Stored { name, .. } => format!("mem:{}", name),
            ModLocation::Builtin(id) => format!("builtin:{}", id),
        }
    }

    /// Filesystem path, if the content is on disk
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            ModLocation::File(path) | ModLocation::Directory(path) => Some(path),
            _ => None,
        }
    }
}

impl fmt::Display for ModLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModLocation::File(path) | ModLocation::Directory(path) => {
                write!(f, "{}", path.display())
            }
            ModLocation::Stored { entry, .. } => write!(f, "nested {}", entry),
            ModLocation::Builtin(id) => write!(f, "builtin {}", id),
        }
    }
}

/// One discovered mod version
#[derive(Debug, Clone)]
pub struct CandidateRecord {
    pub id: CandidateId,
    pub metadata: ModMetadata,
    pub location: ModLocation,
    /// Candidates whose archives contain this one; empty for roots
    pub parents: Vec<CandidateId>,
    /// Candidates nested inside this one
    pub children: Vec<CandidateId>,
    /// Minimum nesting depth over all parents, 0 for roots
    pub depth: u32,
    /// Whether the content needs remapping before use
    pub remap_required: bool,
}

impl CandidateRecord {
    /// Primary identifier
    pub fn identifier(&self) -> &str {
        &self.metadata.id
    }

    pub fn version(&self) -> &Version {
        &self.metadata.version
    }

    /// Aliases declared through `provides`
    pub fn aliases(&self) -> &[String] {
        &self.metadata.provides
    }

    /// The identifier followed by every alias
    pub fn provided_keys(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.metadata.id.as_str())
            .chain(self.metadata.provides.iter().map(String::as_str))
    }

    /// Check if this candidate satisfies an identifier
    pub fn provides(&self, key: &str) -> bool {
        self.provided_keys().any(|k| k == key)
    }

    /// Check if the candidate has a direct, non-nested origin
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self.location, ModLocation::Builtin(_))
    }

    /// Effective load condition: explicit, else derived from nesting
    pub fn load_condition(&self) -> LoadCondition {
        self.metadata.load_condition.unwrap_or(if self.is_root() {
            LoadCondition::Always
        } else {
            LoadCondition::IfPossible
        })
    }

    /// Short human-readable label: `'id' version`
    pub fn label(&self) -> String {
        format!("'{}' {}", self.metadata.id, self.metadata.version)
    }
}
