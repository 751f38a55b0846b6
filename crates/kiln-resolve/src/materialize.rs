//! Turns a solver selection into the final candidate set.

use std::collections::HashSet;
use std::fmt;

use log::debug;

use crate::candidate::{ByteCache, CandidateId, CandidateStore};
use crate::metadata::{Dependency, DependencyKind};
use crate::report;
use crate::solver::{ModRef, Selection};

/// A soft constraint the final set does not honor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A recommended mod is missing or has the wrong version
    MissingRecommendation {
        source: ModRef,
        dependency: Dependency,
        present: Vec<ModRef>,
    },
    /// A conflicting mod was selected anyway
    Conflict {
        source: ModRef,
        dependency: Dependency,
        conflicting: ModRef,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = match self {
            Warning::MissingRecommendation {
                source,
                dependency,
                present,
            } => report::describe_dependency(source, dependency, present),
            Warning::Conflict {
                source,
                dependency,
                conflicting,
            } => report::describe_dependency(source, dependency, std::slice::from_ref(conflicting)),
        };
        f.write_str(&line)
    }
}

/// Drop unselected candidates and collect soft warnings.
///
/// Unselected candidates lose their cached bytes and every edge; depths of
/// the survivors are recomputed from the selected roots.
pub fn materialize(store: &mut CandidateStore, selection: &Selection, cache: &ByteCache) -> Vec<Warning> {
    let selected: HashSet<CandidateId> = selection.selected.iter().copied().collect();

    let dropped: Vec<CandidateId> = store.ids().filter(|id| !selected.contains(id)).collect();
    for &id in &dropped {
        cache.evict(id);
        store.detach(id);
    }
    store.recompute_depths();
    debug!("Dropped {} unselected candidate(s)", dropped.len());

    let mut warnings = Vec::new();
    for &id in &selection.selected {
        let Some(record) = store.get(id) else {
            continue;
        };
        let source = ModRef::of(record);

        for dependency in &record.metadata.dependencies {
            let providers: Vec<ModRef> = store
                .providers(&dependency.target)
                .iter()
                .filter(|&&p| p != id)
                .filter_map(|&p| store.get(p))
                .map(ModRef::of)
                .collect();

            match dependency.kind {
                DependencyKind::Recommends => {
                    if !providers.iter().any(|p| dependency.matches(&p.version)) {
                        warnings.push(Warning::MissingRecommendation {
                            source: source.clone(),
                            dependency: dependency.clone(),
                            present: providers,
                        });
                    }
                }
                DependencyKind::Conflicts => {
                    for conflicting in providers.into_iter().filter(|p| dependency.matches(&p.version)) {
                        warnings.push(Warning::Conflict {
                            source: source.clone(),
                            dependency: dependency.clone(),
                            conflicting,
                        });
                    }
                }
                _ => {}
            }
        }
    }

    warnings
}
