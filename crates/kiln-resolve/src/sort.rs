//! Deterministic priority order over all candidates.
//!
//! Higher priority first: roots before nested candidates, then identifier,
//! then descending version, ascending depth and finally the priority of the
//! best parent. Identifiers that overlap through aliases are ranked together
//! so that the identifier whose versions win the pairwise comparisons comes
//! first. A local float-up pass corrects what that ranking misses.
//!
//! The order only feeds solver preferences; it never overrides a constraint.

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use kiln_semver::Version;

use crate::candidate::{CandidateId, CandidateRecord, CandidateStore};

/// How far a candidate may float up past overlapping predecessors
pub const FLOAT_UP_LIMIT: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct SortKey {
    nested: bool,
    identifier_rank: usize,
    version: Reverse<Version>,
    depth: u32,
    parent: Option<Box<SortKey>>,
    location: String,
}

/// Minimal union-find over identifier strings
struct Components {
    parent: HashMap<String, String>,
}

impl Components {
    fn new() -> Self {
        Self {
            parent: HashMap::new(),
        }
    }

    fn find(&mut self, key: &str) -> String {
        let mut root = key.to_string();
        while let Some(next) = self.parent.get(&root) {
            if *next == root {
                break;
            }
            root = next.clone();
        }
        self.parent.insert(key.to_string(), root.clone());
        root
    }

    fn union(&mut self, a: &str, b: &str) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            // Smaller representative keeps the result independent of insertion order
            let (keep, drop) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent.insert(drop, keep);
        }
    }
}

/// Check if two candidates share any provided identifier
pub fn overlaps(a: &CandidateRecord, b: &CandidateRecord) -> bool {
    a.provided_keys().any(|k| b.provides(k))
}

/// Rank every primary identifier
fn rank_identifiers(store: &CandidateStore) -> BTreeMap<String, usize> {
    let mut components = Components::new();
    let mut identifiers: BTreeSet<String> = BTreeSet::new();

    for record in store.iter() {
        identifiers.insert(record.identifier().to_string());
        for alias in record.aliases() {
            components.union(record.identifier(), alias);
        }
    }

    // Signed sum of version comparisons against every overlapping candidate
    let mut scores: HashMap<&str, i64> = HashMap::new();
    for group in store.groups() {
        let members: Vec<&CandidateRecord> =
            group.members().iter().filter_map(|&m| store.get(m)).collect();
        for a in &members {
            for b in &members {
                if a.identifier() == b.identifier() {
                    continue;
                }
                let delta = match a.version().cmp(b.version()) {
                    Ordering::Greater => 1,
                    Ordering::Less => -1,
                    Ordering::Equal => 0,
                };
                *scores.entry(a.identifier()).or_default() += delta;
            }
        }
    }

    let mut component_min: HashMap<String, String> = HashMap::new();
    for id in &identifiers {
        let root = components.find(id);
        component_min.entry(root).or_insert_with(|| id.clone());
    }

    let mut ranked: Vec<(String, i64, String)> = identifiers
        .iter()
        .map(|id| {
            let root = components.find(id);
            let min = component_min.get(&root).cloned().unwrap_or_else(|| id.clone());
            (min, scores.get(id.as_str()).copied().unwrap_or(0), id.clone())
        })
        .collect();
    ranked.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)).then(a.2.cmp(&b.2)));

    ranked
        .into_iter()
        .enumerate()
        .map(|(rank, (_, _, id))| (id, rank))
        .collect()
}

struct KeyBuilder<'a> {
    store: &'a CandidateStore,
    ranks: BTreeMap<String, usize>,
    memo: HashMap<CandidateId, SortKey>,
    visiting: HashSet<CandidateId>,
}

impl KeyBuilder<'_> {
    fn key(&mut self, id: CandidateId) -> Option<SortKey> {
        if let Some(key) = self.memo.get(&id) {
            return Some(key.clone());
        }
        let record = self.store.get(id)?;
        if !self.visiting.insert(id) {
            return None;
        }

        let parents = record.parents.clone();
        let parent = parents
            .into_iter()
            .filter_map(|p| self.key(p))
            .min()
            .map(Box::new);

        let key = SortKey {
            nested: !record.is_root(),
            identifier_rank: self.ranks.get(record.identifier()).copied().unwrap_or(usize::MAX),
            version: Reverse(record.version().clone()),
            depth: record.depth,
            parent,
            location: record.location.canonical_key(),
        };

        self.visiting.remove(&id);
        self.memo.insert(id, key.clone());
        Some(key)
    }
}

/// Order all candidates by descending priority
pub fn sort_candidates(store: &CandidateStore) -> Vec<CandidateId> {
    let mut builder = KeyBuilder {
        store,
        ranks: rank_identifiers(store),
        memo: HashMap::new(),
        visiting: HashSet::new(),
    };

    let mut keyed: Vec<(SortKey, CandidateId)> = store
        .ids()
        .filter_map(|id| builder.key(id).map(|key| (key, id)))
        .collect();
    keyed.sort();

    let mut order: Vec<CandidateId> = keyed.into_iter().map(|(_, id)| id).collect();
    float_up(store, &mut order);
    order
}

/// Move candidates ahead of overlapping predecessor blocks with lower versions.
///
/// A block is a maximal run of one identifier. The move never passes a
/// candidate of the same identifier, never crosses the root/nested boundary
/// and never travels more than [`FLOAT_UP_LIMIT`] positions.
fn float_up(store: &CandidateStore, order: &mut Vec<CandidateId>) {
    for i in 1..order.len() {
        let Some(current) = store.get(order[i]) else {
            continue;
        };

        let mut target = i;
        while target > 0 {
            let Some(previous) = store.get(order[target - 1]) else {
                break;
            };
            if previous.identifier() == current.identifier() || previous.is_root() != current.is_root() {
                break;
            }

            let mut start = target - 1;
            while start > 0
                && store
                    .get(order[start - 1])
                    .is_some_and(|r| r.identifier() == previous.identifier())
            {
                start -= 1;
            }
            if i - start > FLOAT_UP_LIMIT {
                break;
            }

            let block: Vec<&CandidateRecord> =
                order[start..target].iter().filter_map(|&id| store.get(id)).collect();
            let overlapping = block.iter().any(|r| overlaps(r, current));
            let max_version = block.iter().map(|r| r.version()).max();
            if !overlapping || max_version.is_some_and(|v| v >= current.version()) {
                break;
            }
            target = start;
        }

        if target < i {
            let id = order.remove(i);
            order.insert(target, id);
        }
    }
}
