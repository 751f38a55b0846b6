//! End-to-end mod resolution.

use std::io;
use std::sync::Arc;

use log::{info, warn};

use crate::candidate::{ArchiveStore, ByteCache, CandidateId, CandidateRecord, CandidateStore};
use crate::config::ResolverConfig;
use crate::discovery::{CandidateSource, Discoverer, DiscoveryOutcome, UnmatchedOrigin};
use crate::error::{DiscoveryFailure, ResolveError, Result};
use crate::materialize::{materialize, Warning};
use crate::report;
use crate::solver::{ModSolver, Resolution};
use crate::sort::sort_candidates;

/// Runs discovery, sorting, solving and materialization in sequence
pub struct ModResolver {
    config: ResolverConfig,
    archives: Arc<ArchiveStore>,
}

impl ModResolver {
    /// Create a resolver with a fresh archive store
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            archives: Arc::new(ArchiveStore::new()),
        }
    }

    /// Share an archive store across resolutions
    pub fn with_archive_store(mut self, archives: Arc<ArchiveStore>) -> Self {
        self.archives = archives;
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve the mods found in `sources`.
    ///
    /// `preselected` names identifiers that must be part of the result; the
    /// highest-priority candidate of each is fixed before solving. Unknown
    /// identifiers are skipped with a warning.
    pub async fn resolve(
        &self,
        sources: &[Box<dyn CandidateSource>],
        preselected: &[String],
    ) -> Result<ResolvedSet> {
        let DiscoveryOutcome {
            store,
            failures,
            unmatched,
        } = Discoverer::new(self.config.clone(), self.archives.clone())
            .discover(sources)
            .await?;

        let timeout = self.config.solver_timeout();
        let preselected = preselected.to_vec();
        let (mut store, resolution) = tokio::task::spawn_blocking(move || {
            let order = sort_candidates(&store);
            let fixed = preselected_ids(&store, &order, &preselected);
            let resolution = ModSolver::new(&store, &order).with_timeout(timeout).solve(&fixed);
            (store, resolution)
        })
        .await?;

        let selection = match resolution? {
            Resolution::Success(selection) => selection,
            Resolution::Failure(failure) => return Err(ResolveError::Unresolvable(Box::new(failure))),
        };

        let cache = ByteCache::new();
        let warnings = materialize(&mut store, &selection, &cache);
        for warning in &warnings {
            warn!("{}", warning);
        }
        info!("Resolved {} mods ({} warnings)", selection.len(), warnings.len());

        Ok(ResolvedSet {
            store,
            order: selection.selected,
            warnings,
            failures,
            unmatched,
            archives: self.archives.clone(),
            cache,
        })
    }
}

/// First candidate in priority order for each requested identifier
fn preselected_ids(store: &CandidateStore, order: &[CandidateId], identifiers: &[String]) -> Vec<CandidateId> {
    identifiers
        .iter()
        .filter_map(|identifier| {
            let found = order
                .iter()
                .copied()
                .find(|&id| store.get(id).is_some_and(|r| r.identifier() == identifier.as_str()));
            if found.is_none() {
                warn!("Preselected mod '{}' was not found", identifier);
            }
            found
        })
        .collect()
}

/// The final, ordered set of mods to load
#[derive(Debug)]
pub struct ResolvedSet {
    store: CandidateStore,
    order: Vec<CandidateId>,
    warnings: Vec<Warning>,
    failures: Vec<DiscoveryFailure>,
    unmatched: Vec<UnmatchedOrigin>,
    archives: Arc<ArchiveStore>,
    cache: ByteCache,
}

impl ResolvedSet {
    /// Selected mods in priority order
    pub fn mods(&self) -> impl Iterator<Item = &CandidateRecord> {
        self.order.iter().filter_map(|&id| self.store.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The selected mod satisfying an identifier, by primary id or alias
    pub fn get(&self, identifier: &str) -> Option<&CandidateRecord> {
        self.store
            .providers(identifier)
            .first()
            .and_then(|&id| self.store.get(id))
    }

    pub fn store(&self) -> &CandidateStore {
        &self.store
    }

    /// Raw archive bytes of a selected mod; `None` for directories and builtins
    pub fn read_content(&self, id: CandidateId) -> io::Result<Option<Arc<[u8]>>> {
        self.store.read_content(id, &self.archives, &self.cache)
    }

    pub fn remap_required(&self, id: CandidateId) -> bool {
        self.store.get(id).is_some_and(|r| r.remap_required)
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Items that could not be read during discovery
    pub fn failures(&self) -> &[DiscoveryFailure] {
        &self.failures
    }

    /// Origins that held no mod descriptor
    pub fn unmatched(&self) -> &[UnmatchedOrigin] {
        &self.unmatched
    }

    pub fn describe_warnings(&self) -> String {
        report::describe_warnings(&self.warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::{ModLocation, NewCandidate};
    use crate::metadata::ModMetadata;
    use kiln_semver::Version;
    use std::path::PathBuf;

    #[test]
    fn test_preselected_by_identifier() {
        let mut store = CandidateStore::new();
        let parent = store
            .insert(NewCandidate {
                metadata: ModMetadata::new("alpha", Version::parse("1.0").unwrap()),
                location: ModLocation::File(PathBuf::from("/mods/alpha.jar")),
                parent: None,
                remap_required: false,
            })
            .unwrap()
            .id();
        for version in ["1.0", "2.0"] {
            store
                .insert(NewCandidate {
                    metadata: ModMetadata::new("lib", Version::parse(version).unwrap()),
                    location: ModLocation::Builtin(format!("lib-{}", version)),
                    parent: Some(parent),
                    remap_required: false,
                })
                .unwrap();
        }
        let order = sort_candidates(&store);

        let ids = preselected_ids(&store, &order, &["lib".to_string(), "missing".to_string()]);
        assert_eq!(ids.len(), 1);
        assert_eq!(store.get(ids[0]).unwrap().version(), &Version::parse("2.0").unwrap());
    }

    #[test]
    fn test_resolve_without_sources() {
        let resolver = ModResolver::new(ResolverConfig::default());
        let resolved = tokio_test::block_on(resolver.resolve(&[], &[])).unwrap();

        assert!(resolved.is_empty());
        assert!(resolved.warnings().is_empty());
        assert_eq!(resolved.describe_warnings(), "");
    }
}
