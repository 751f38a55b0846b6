pub mod candidate;
pub mod config;
pub mod discovery;
pub mod error;
pub mod identifier;
pub mod materialize;
pub mod metadata;
pub mod report;
pub mod resolver;
pub mod solver;
pub mod sort;

pub use candidate::{ArchiveStore, ByteCache, CandidateId, CandidateRecord, CandidateStore, ModLocation};
pub use config::ResolverConfig;
pub use discovery::{
    BuiltinSource, CandidateSource, DirectorySource, Discoverer, DiscoveryOutcome,
    ExplicitSource, SourceItem,
};
pub use error::{ConfigError, DiscoveryError, DiscoveryFailure, ResolveError, Result, SolverTimeout};
pub use materialize::Warning;
pub use metadata::{Dependency, DependencyKind, LoadCondition, ModMetadata};
pub use resolver::{ModResolver, ResolvedSet};
pub use solver::{Fix, ModSolver, Resolution, ResolutionFailure};
pub use sort::sort_candidates;
