use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::io;
use std::sync::Arc;

use log::{debug, warn};

use super::content::{ArchiveStore, ByteCache};
use super::{CandidateId, CandidateRecord, ModLocation};
use crate::discovery::archive;
use crate::error::ConfigError;
use crate::metadata::ModMetadata;

/// A candidate about to be added to the store
#[derive(Debug, Clone)]
pub struct NewCandidate {
    pub metadata: ModMetadata,
    pub location: ModLocation,
    /// Containing candidate, `None` for a root
    pub parent: Option<CandidateId>,
    pub remap_required: bool,
}

/// What [`CandidateStore::insert`] did with a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new record was created
    Inserted(CandidateId),
    /// An equal identifier+version existed; the new, shallower copy took its place
    Replaced(CandidateId),
    /// An equal identifier+version existed and was kept
    Duplicate(CandidateId),
}

impl InsertOutcome {
    /// The record that now represents the candidate
    pub fn id(&self) -> CandidateId {
        match self {
            InsertOutcome::Inserted(id)
            | InsertOutcome::Replaced(id)
            | InsertOutcome::Duplicate(id) => *id,
        }
    }

    /// Check if a new record was created
    pub fn is_inserted(&self) -> bool {
        matches!(self, InsertOutcome::Inserted(_))
    }
}

/// Every candidate satisfying one identifier, by primary id or alias
#[derive(Debug, Clone, Default)]
pub struct CandidateGroup {
    identifier: String,
    members: Vec<CandidateId>,
    /// Other identifiers provided by members of this group
    aliases: BTreeSet<String>,
}

impl CandidateGroup {
    fn new(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            ..Self::default()
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn members(&self) -> &[CandidateId] {
        &self.members
    }

    /// Identifiers overlapping with this one through some member
    pub fn aliases(&self) -> &BTreeSet<String> {
        &self.aliases
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Arena of candidates plus the identifier index over them
#[derive(Debug, Default)]
pub struct CandidateStore {
    records: BTreeMap<CandidateId, CandidateRecord>,
    groups: BTreeMap<String, CandidateGroup>,
    next_id: u32,
}

impl CandidateStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: CandidateId) -> Option<&CandidateRecord> {
        self.records.get(&id)
    }

    pub fn get_mut(&mut self, id: CandidateId) -> Option<&mut CandidateRecord> {
        self.records.get_mut(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = CandidateId> + '_ {
        self.records.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CandidateRecord> {
        self.records.values()
    }

    /// Group of candidates satisfying an identifier
    pub fn group(&self, identifier: &str) -> Option<&CandidateGroup> {
        self.groups.get(identifier)
    }

    pub fn groups(&self) -> impl Iterator<Item = &CandidateGroup> {
        self.groups.values()
    }

    /// Candidates satisfying an identifier, by primary id or alias
    pub fn providers(&self, identifier: &str) -> &[CandidateId] {
        self.groups
            .get(identifier)
            .map(|g| g.members())
            .unwrap_or(&[])
    }

    /// Add a candidate, collapsing it onto an existing identifier+version.
    ///
    /// The shallower copy wins. A root whose identifier is already taken by
    /// a root of a different version is a configuration error.
    pub fn insert(&mut self, candidate: NewCandidate) -> Result<InsertOutcome, ConfigError> {
        let depth = match candidate.parent {
            Some(parent) => self.records.get(&parent).map_or(1, |p| p.depth + 1),
            None => 0,
        };
        let id_str = candidate.metadata.id.clone();

        if depth == 0 {
            self.check_duplicate_root(&candidate)?;
        }

        let existing = self.providers(&id_str).iter().copied().find(|&m| {
            self.records.get(&m).is_some_and(|r| {
                r.metadata.id == id_str && r.metadata.version == candidate.metadata.version
            })
        });

        let Some(existing) = existing else {
            return Ok(InsertOutcome::Inserted(self.push(candidate, depth)));
        };

        let (existing_depth, existing_key) = match self.records.get(&existing) {
            Some(r) => (r.depth, r.location.canonical_key()),
            None => return Ok(InsertOutcome::Inserted(self.push(candidate, depth))),
        };
        self.union_aliases(existing, &candidate.metadata.provides);

        let new_wins = depth < existing_depth
            || (depth == 0
                && existing_depth == 0
                && candidate.location.canonical_key() < existing_key);

        if new_wins {
            debug!(
                "Replacing {} at {} with shallower copy at {}",
                id_str, existing_key, candidate.location
            );
            self.replace_origin(existing, candidate, depth);
            Ok(InsertOutcome::Replaced(existing))
        } else {
            if depth == existing_depth {
                if let Some(parent) = candidate.parent {
                    self.link(parent, existing);
                }
            }
            debug!(
                "Dropping duplicate {} {} at {}",
                id_str, candidate.metadata.version, candidate.location
            );
            Ok(InsertOutcome::Duplicate(existing))
        }
    }

    fn check_duplicate_root(&self, candidate: &NewCandidate) -> Result<(), ConfigError> {
        let metadata = &candidate.metadata;
        let clash = self.providers(&metadata.id).iter().find_map(|m| {
            self.records
                .get(m)
                .filter(|r| r.is_root() && r.metadata.id == metadata.id && r.metadata.version != metadata.version)
        });

        match clash {
            Some(first) => Err(ConfigError::DuplicateRoot {
                id: metadata.id.clone(),
                first: first.metadata.version.to_string(),
                first_location: first.location.to_string(),
                second: metadata.version.to_string(),
                second_location: candidate.location.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn push(&mut self, candidate: NewCandidate, depth: u32) -> CandidateId {
        let id = CandidateId(self.next_id);
        self.next_id += 1;

        let record = CandidateRecord {
            id,
            metadata: candidate.metadata,
            location: candidate.location,
            parents: Vec::new(),
            children: Vec::new(),
            depth,
            remap_required: candidate.remap_required,
        };
        let keys: Vec<String> = record.provided_keys().map(String::from).collect();
        self.records.insert(id, record);

        for key in &keys {
            let group = self
                .groups
                .entry(key.clone())
                .or_insert_with(|| CandidateGroup::new(key));
            group.members.push(id);
            group.aliases.extend(keys.iter().filter(|k| *k != key).cloned());
        }

        if let Some(parent) = candidate.parent {
            self.link(parent, id);
        }

        id
    }

    fn union_aliases(&mut self, id: CandidateId, aliases: &[String]) {
        let Some(record) = self.records.get_mut(&id) else {
            return;
        };
        let added: Vec<String> = aliases
            .iter()
            .filter(|a| !record.provides(a))
            .cloned()
            .collect();
        if added.is_empty() {
            return;
        }
        record.metadata.provides.extend(added.iter().cloned());
        let keys: Vec<String> = record.provided_keys().map(String::from).collect();

        for key in &keys {
            let group = self
                .groups
                .entry(key.clone())
                .or_insert_with(|| CandidateGroup::new(key));
            if !group.members.contains(&id) {
                group.members.push(id);
            }
            group.aliases.extend(keys.iter().filter(|k| *k != key).cloned());
        }
    }

    /// Move an existing record onto a shallower origin, pruning old parent edges
    fn replace_origin(&mut self, id: CandidateId, candidate: NewCandidate, depth: u32) {
        let old_parents = match self.records.get_mut(&id) {
            Some(record) => {
                let provides = std::mem::take(&mut record.metadata.provides);
                record.metadata = candidate.metadata;
                for alias in provides {
                    if !record.metadata.provides.contains(&alias) {
                        record.metadata.provides.push(alias);
                    }
                }
                record.location = candidate.location;
                record.depth = depth;
                record.remap_required = candidate.remap_required;
                std::mem::take(&mut record.parents)
            }
            None => return,
        };

        for parent in old_parents {
            if let Some(p) = self.records.get_mut(&parent) {
                p.children.retain(|&c| c != id);
            }
        }
        if let Some(parent) = candidate.parent {
            self.link(parent, id);
        }
    }

    /// Add a mutual containment edge
    pub fn link(&mut self, parent: CandidateId, child: CandidateId) {
        if parent == child || !self.records.contains_key(&parent) {
            return;
        }
        if let Some(c) = self.records.get_mut(&child) {
            if !c.parents.contains(&parent) {
                c.parents.push(parent);
            }
        }
        if let Some(p) = self.records.get_mut(&parent) {
            if !p.children.contains(&child) {
                p.children.push(child);
            }
        }
    }

    /// Remove a candidate and sever all of its edges
    pub fn detach(&mut self, id: CandidateId) -> Option<CandidateRecord> {
        let record = self.records.remove(&id)?;

        for parent in &record.parents {
            if let Some(p) = self.records.get_mut(parent) {
                p.children.retain(|&c| c != id);
            }
        }
        for child in &record.children {
            if let Some(c) = self.records.get_mut(child) {
                c.parents.retain(|&p| p != id);
            }
        }
        for key in record.provided_keys() {
            if let Some(group) = self.groups.get_mut(key) {
                group.members.retain(|&m| m != id);
            }
        }
        self.groups.retain(|_, g| !g.is_empty());

        Some(record)
    }

    /// Recompute nesting depth breadth-first from the current roots
    pub fn recompute_depths(&mut self) {
        let mut queue: VecDeque<CandidateId> = VecDeque::new();
        let mut assigned: BTreeMap<CandidateId, u32> = BTreeMap::new();

        for record in self.records.values() {
            if record.is_root() {
                assigned.insert(record.id, 0);
                queue.push_back(record.id);
            }
        }

        while let Some(id) = queue.pop_front() {
            let depth = assigned[&id];
            let children = self.records.get(&id).map(|r| r.children.clone()).unwrap_or_default();
            for child in children {
                if !assigned.contains_key(&child) {
                    assigned.insert(child, depth + 1);
                    queue.push_back(child);
                }
            }
        }

        for record in self.records.values_mut() {
            match assigned.get(&record.id) {
                Some(&depth) => record.depth = depth,
                None => warn!("{} is not reachable from any root", record.label()),
            }
        }
    }

    /// Read the raw bytes of a candidate's archive.
    ///
    /// Bytes come from the cache, the file on disk, the archive store, or are
    /// re-extracted from the nearest ancestor that has concrete bytes.
    /// Directories and builtin mods have no single byte content.
    pub fn read_content(
        &self,
        id: CandidateId,
        archives: &ArchiveStore,
        cache: &ByteCache,
    ) -> io::Result<Option<Arc<[u8]>>> {
        if let Some(bytes) = cache.get(id) {
            return Ok(Some(bytes));
        }
        let Some(record) = self.records.get(&id) else {
            return Ok(None);
        };

        let bytes: Arc<[u8]> = match &record.location {
            ModLocation::File(path) => Arc::from(std::fs::read(path)?),
            ModLocation::Directory(_) | ModLocation::Builtin(_) => return Ok(None),
            ModLocation::Stored { name, entry, .. } => match archives.get(name) {
                Some(bytes) => bytes,
                None => match self.extract_from_parents(record, entry, archives, cache)? {
                    Some(bytes) => bytes,
                    None => return Ok(None),
                },
            },
        };

        cache.insert(id, bytes.clone());
        Ok(Some(bytes))
    }

    fn extract_from_parents(
        &self,
        record: &CandidateRecord,
        entry: &str,
        archives: &ArchiveStore,
        cache: &ByteCache,
    ) -> io::Result<Option<Arc<[u8]>>> {
        let mut parents: Vec<&CandidateRecord> =
            record.parents.iter().filter_map(|p| self.records.get(p)).collect();
        parents.sort_by_key(|p| p.depth);

        for parent in parents {
            if let ModLocation::Directory(path) = &parent.location {
                let file = path.join(entry);
                if file.is_file() {
                    return Ok(Some(Arc::from(std::fs::read(file)?)));
                }
                continue;
            }
            if let Some(bytes) = self.read_content(parent.id, archives, cache)? {
                return archive::read_entry(bytes, entry);
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_semver::Version;
    use std::path::PathBuf;

    fn meta(id: &str, version: &str) -> ModMetadata {
        ModMetadata::new(id, Version::parse(version).unwrap())
    }

    fn root(id: &str, version: &str, path: &str) -> NewCandidate {
        NewCandidate {
            metadata: meta(id, version),
            location: ModLocation::File(PathBuf::from(path)),
            parent: None,
            remap_required: false,
        }
    }

    fn nested(metadata: ModMetadata, name: &str, parent: CandidateId) -> NewCandidate {
        NewCandidate {
            metadata,
            location: ModLocation::Stored {
                name: name.to_string(),
                entry: format!("jars/{}", name),
                hash: crate::candidate::ContentHash::of(name.as_bytes()),
            },
            parent: Some(parent),
            remap_required: false,
        }
    }

    #[test]
    fn test_insert_and_group() {
        let mut store = CandidateStore::new();
        let a = store
            .insert(NewCandidate {
                metadata: meta("alpha", "1.0").with_provides("alpha-api"),
                ..root("alpha", "1.0", "/mods/alpha.jar")
            })
            .unwrap();

        assert!(a.is_inserted());
        assert_eq!(store.providers("alpha"), &[a.id()]);
        assert_eq!(store.providers("alpha-api"), &[a.id()]);
        assert!(store.group("alpha").unwrap().aliases().contains("alpha-api"));
    }

    #[test]
    fn test_shallower_copy_wins() {
        let mut store = CandidateStore::new();
        let outer = store.insert(root("outer", "1.0", "/mods/outer.jar")).unwrap().id();
        let middle = store
            .insert(nested(meta("middle", "1.0"), "middle.jar", outer))
            .unwrap()
            .id();
        let deep = store
            .insert(nested(meta("lib", "2.0"), "lib-deep.jar", middle))
            .unwrap()
            .id();
        assert_eq!(store.get(deep).unwrap().depth, 2);

        let shallow = store
            .insert(nested(meta("lib", "2.0").with_provides("lib-api"), "lib.jar", outer))
            .unwrap();
        assert_eq!(shallow, InsertOutcome::Replaced(deep));

        let record = store.get(deep).unwrap();
        assert_eq!(record.depth, 1);
        assert_eq!(record.parents, vec![outer]);
        assert!(record.provides("lib-api"));
        assert!(store.get(middle).unwrap().children.is_empty());
    }

    #[test]
    fn test_deeper_copy_is_dropped() {
        let mut store = CandidateStore::new();
        let lib = store.insert(root("lib", "2.0", "/mods/lib.jar")).unwrap().id();
        let outer = store.insert(root("outer", "1.0", "/mods/outer.jar")).unwrap().id();

        let outcome = store
            .insert(nested(meta("lib", "2.0").with_provides("lib-api"), "lib.jar", outer))
            .unwrap();
        assert_eq!(outcome, InsertOutcome::Duplicate(lib));
        assert!(store.get(lib).unwrap().is_root());
        assert!(store.get(lib).unwrap().provides("lib-api"));
        assert_eq!(store.providers("lib-api"), &[lib]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_equal_depth_nested_copies_merge_parents() {
        let mut store = CandidateStore::new();
        let a = store.insert(root("aa", "1.0", "/mods/a.jar")).unwrap().id();
        let b = store.insert(root("bb", "1.0", "/mods/b.jar")).unwrap().id();
        let lib = store.insert(nested(meta("lib", "1.0"), "lib.jar", a)).unwrap().id();

        let outcome = store.insert(nested(meta("lib", "1.0"), "lib.jar", b)).unwrap();
        assert_eq!(outcome, InsertOutcome::Duplicate(lib));
        assert_eq!(store.get(lib).unwrap().parents, vec![a, b]);
        assert_eq!(store.get(b).unwrap().children, vec![lib]);
    }

    #[test]
    fn test_duplicate_roots_are_rejected() {
        let mut store = CandidateStore::new();
        store.insert(root("alpha", "1.0", "/mods/a1.jar")).unwrap();

        let err = store.insert(root("alpha", "2.0", "/mods/a2.jar")).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateRoot { ref id, .. } if id == "alpha"));

        // Same version twice is plain dedup
        let again = store.insert(root("alpha", "1.0", "/mods/copy/a1.jar")).unwrap();
        assert!(!again.is_inserted());
    }

    #[test]
    fn test_detach_severs_edges() {
        let mut store = CandidateStore::new();
        let a = store.insert(root("aa", "1.0", "/mods/a.jar")).unwrap().id();
        let lib = store.insert(nested(meta("lib", "1.0"), "lib.jar", a)).unwrap().id();

        let removed = store.detach(a).unwrap();
        assert_eq!(removed.children, vec![lib]);
        assert!(store.get(lib).unwrap().parents.is_empty());
        assert!(store.group("aa").is_none());
    }

    #[test]
    fn test_recompute_depths() {
        let mut store = CandidateStore::new();
        let a = store.insert(root("aa", "1.0", "/mods/a.jar")).unwrap().id();
        let mid = store.insert(nested(meta("mid", "1.0"), "mid.jar", a)).unwrap().id();
        let lib = store.insert(nested(meta("lib", "1.0"), "lib.jar", mid)).unwrap().id();
        let b = store.insert(root("bb", "1.0", "/mods/b.jar")).unwrap().id();
        store.link(b, lib);

        store.recompute_depths();
        assert_eq!(store.get(lib).unwrap().depth, 1);
    }

    #[test]
    fn test_read_content_prefers_cache_and_store() {
        let mut store = CandidateStore::new();
        let archives = ArchiveStore::new();
        let cache = ByteCache::new();

        let a = store.insert(root("aa", "1.0", "/nonexistent/a.jar")).unwrap().id();
        cache.insert(a, Arc::from(&b"cached"[..]));
        assert_eq!(
            store.read_content(a, &archives, &cache).unwrap().as_deref(),
            Some(&b"cached"[..])
        );

        let (name, hash) = archives.insert("lib.jar", Arc::from(&b"inner"[..]));
        let lib = store
            .insert(NewCandidate {
                metadata: meta("lib", "1.0"),
                location: ModLocation::Stored {
                    name,
                    entry: "jars/lib.jar".to_string(),
                    hash,
                },
                parent: Some(a),
                remap_required: false,
            })
            .unwrap()
            .id();
        assert_eq!(
            store.read_content(lib, &archives, &cache).unwrap().as_deref(),
            Some(&b"inner"[..])
        );
    }
}
