//! Version handling for kiln
//!
//! This crate provides version parsing and ordering, dependency range
//! predicates, and the interval arithmetic used when proposing fixes for
//! unresolvable mod sets.

mod interval;
mod predicate;
mod version;

pub use interval::{derive_version, Endpoint, VersionInterval};
pub use predicate::{TermKind, VersionPredicate, VersionTerm};
pub use version::{SemanticVersion, Version, VersionError};
