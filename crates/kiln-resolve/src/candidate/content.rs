use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use super::{CandidateId, ContentHash};

/// Append-only arena of extracted nested archives.
///
/// Entries are keyed by a generated `{stem}-{hash}.{ext}` name and never
/// change once written, so concurrent inserts of the same bytes converge on
/// the same entry.
#[derive(Debug, Default)]
pub struct ArchiveStore {
    entries: RwLock<HashMap<String, Arc<[u8]>>>,
}

impl ArchiveStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Generated name for a nested archive
    pub fn name_for(file_name: &str, hash: &ContentHash) -> String {
        let (stem, ext) = match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, ext),
            _ => (file_name, "jar"),
        };
        format!("{}-{}.{}", stem, hash.short_hex(), ext)
    }

    /// Store bytes, returning the generated name and content hash
    pub fn insert(&self, file_name: &str, bytes: Arc<[u8]>) -> (String, ContentHash) {
        let hash = ContentHash::of(&bytes);
        let name = Self::name_for(file_name, &hash);

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.entry(name.clone()).or_insert(bytes);

        (name, hash)
    }

    /// Get the bytes of a stored archive
    pub fn get(&self, name: &str) -> Option<Arc<[u8]>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Evictable per-candidate byte cache.
///
/// Anything in here can be recomputed from the candidate's location or its
/// parent chain, so entries may be dropped at any time.
#[derive(Debug, Default)]
pub struct ByteCache {
    entries: Mutex<HashMap<CandidateId, Arc<[u8]>>>,
}

impl ByteCache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: CandidateId) -> Option<Arc<[u8]>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.get(&id).cloned()
    }

    pub fn insert(&self, id: CandidateId, bytes: Arc<[u8]>) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(id, bytes);
    }

    /// Drop the cached bytes of one candidate
    pub fn evict(&self, id: CandidateId) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(&id);
    }

    /// Drop everything
    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_names_are_content_addressed() {
        let store = ArchiveStore::new();
        let bytes: Arc<[u8]> = Arc::from(&b"payload"[..]);

        let (name, hash) = store.insert("lib.jar", bytes.clone());
        assert!(name.starts_with("lib-"));
        assert!(name.ends_with(".jar"));
        assert_eq!(name.len(), "lib-".len() + 16 + ".jar".len());
        assert_eq!(hash.size, 7);

        let (again, _) = store.insert("lib.jar", bytes);
        assert_eq!(name, again);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&name).as_deref(), Some(&b"payload"[..]));
    }

    #[test]
    fn test_name_without_extension() {
        let hash = ContentHash::of(b"x");
        assert!(ArchiveStore::name_for("inner", &hash).ends_with(".jar"));
    }

    #[test]
    fn test_byte_cache_eviction() {
        let cache = ByteCache::new();
        cache.insert(CandidateId(1), Arc::from(&b"abc"[..]));
        assert!(cache.get(CandidateId(1)).is_some());

        cache.evict(CandidateId(1));
        assert!(cache.get(CandidateId(1)).is_none());
        assert!(cache.is_empty());
    }
}
