//  Copyright 2025 cellar Project Authors
//
//  Licensed under the Apache License, Version 2.0 (the "License");
//  you may not use this file except in compliance with the License.
//  You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.

use std::{
    collections::BTreeMap,
    hash::Hasher,
    path::{Path, PathBuf},
    sync::Arc,
};

use itertools::Itertools;
use parking_lot::RwLock;
use twox_hash::XxHash64;

use crate::{entry::CacheEntry, Key};

/// One catalog record: the entry metadata and the content path it points at.
///
/// The path lives beside the entry rather than inside it; eviction policies
/// only ever see the entry.
#[derive(Debug, Clone)]
pub struct CatalogItem<K>
where
    K: Key,
{
    pub entry: Arc<CacheEntry<K>>,
    pub path: PathBuf,
}

/// Authoritative in-memory map of cached keys to (entry, content path).
///
/// Sharded by key hash. A key's record is mutated as a unit: an observer
/// never sees an entry without its path or vice versa.
#[derive(Debug)]
pub struct Catalog<K>
where
    K: Key,
{
    /// `shards` sharding bits.
    bits: usize,

    shards: Vec<RwLock<BTreeMap<Arc<K>, CatalogItem<K>>>>,
}

impl<K> Catalog<K>
where
    K: Key,
{
    pub fn new(bits: usize) -> Self {
        let shards = (0..1usize << bits).map(|_| RwLock::new(BTreeMap::new())).collect_vec();
        Self { bits, shards }
    }

    /// Upsert a record for `entry.key()`; returns the superseded record if
    /// the key was already present.
    pub fn insert(&self, entry: Arc<CacheEntry<K>>, path: PathBuf) -> Option<CatalogItem<K>> {
        let key = Arc::new(entry.key().clone());
        let shard = self.shard(&key);
        self.shards[shard].write().insert(key, CatalogItem { entry, path })
    }

    pub fn lookup(&self, key: &K) -> Option<CatalogItem<K>> {
        let shard = self.shard(key);
        self.shards[shard].read().get(key).cloned()
    }

    pub fn contains(&self, key: &K) -> bool {
        let shard = self.shard(key);
        self.shards[shard].read().contains_key(key)
    }

    pub fn remove(&self, key: &K) -> Option<CatalogItem<K>> {
        let shard = self.shard(key);
        self.shards[shard].write().remove(key)
    }

    /// Remove the record for `key` only if `pred` holds for the current
    /// record. Used by eviction to avoid unindexing a concurrently
    /// re-inserted key.
    pub fn remove_if<F>(&self, key: &K, pred: F) -> Option<CatalogItem<K>>
    where
        F: FnOnce(&CatalogItem<K>) -> bool,
    {
        let shard = self.shard(key);
        let mut guard = self.shards[shard].write();
        if pred(guard.get(key)?) {
            guard.remove(key)
        } else {
            None
        }
    }

    /// Copy of the currently indexed entries, for policy input.
    pub fn snapshot(&self) -> Vec<Arc<CacheEntry<K>>> {
        self.shards
            .iter()
            .flat_map(|shard| shard.read().values().map(|item| item.entry.clone()).collect_vec())
            .collect_vec()
    }

    /// Count of records referencing `path`. Content addressing lets several
    /// keys share one file; the file may only be deleted when this drops to
    /// the record being removed.
    pub fn references(&self, path: &Path) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.read().values().filter(|item| item.path == path).count())
            .sum()
    }

    pub fn clear(&self) {
        for shard in self.shards.iter() {
            shard.write().clear();
        }
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.read().is_empty())
    }

    fn shard(&self, key: &K) -> usize {
        self.hash(key) as usize & ((1 << self.bits) - 1)
    }

    fn hash(&self, key: &K) -> u64 {
        let mut hasher = XxHash64::default();
        key.hash(&mut hasher);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(catalog: &Catalog<String>, key: &str, size: u64, path: &str) -> Option<CatalogItem<String>> {
        let entry = Arc::new(CacheEntry::new(key.to_string(), size).unwrap());
        catalog.insert(entry, PathBuf::from(path))
    }

    #[test]
    fn test_upsert_returns_prior() {
        let catalog: Catalog<String> = Catalog::new(2);
        assert!(item(&catalog, "a", 1, "/p/1").is_none());
        assert!(catalog.contains(&"a".to_string()));

        let prior = item(&catalog, "a", 2, "/p/2").unwrap();
        assert_eq!(prior.path, PathBuf::from("/p/1"));
        assert_eq!(prior.entry.size(), 1);

        let current = catalog.lookup(&"a".to_string()).unwrap();
        assert_eq!(current.entry.size(), 2);
        assert_eq!(current.path, PathBuf::from("/p/2"));
    }

    #[test]
    fn test_remove_if() {
        let catalog: Catalog<String> = Catalog::new(2);
        item(&catalog, "a", 1, "/p/1");
        let stale = catalog.lookup(&"a".to_string()).unwrap();

        // key re-inserted since the snapshot; guarded removal declines
        item(&catalog, "a", 2, "/p/2");
        assert!(catalog
            .remove_if(&"a".to_string(), |it| Arc::ptr_eq(&it.entry, &stale.entry))
            .is_none());
        assert!(catalog.contains(&"a".to_string()));

        let fresh = catalog.lookup(&"a".to_string()).unwrap();
        assert!(catalog
            .remove_if(&"a".to_string(), |it| Arc::ptr_eq(&it.entry, &fresh.entry))
            .is_some());
        assert!(!catalog.contains(&"a".to_string()));
    }

    #[test]
    fn test_snapshot_and_references() {
        let catalog: Catalog<String> = Catalog::new(4);
        item(&catalog, "a", 1, "/p/shared");
        item(&catalog, "b", 2, "/p/shared");
        item(&catalog, "c", 3, "/p/own");

        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.snapshot().len(), 3);
        assert_eq!(catalog.references(Path::new("/p/shared")), 2);
        assert_eq!(catalog.references(Path::new("/p/own")), 1);
        assert_eq!(catalog.references(Path::new("/p/gone")), 0);

        catalog.clear();
        assert!(catalog.is_empty());
        assert_eq!(catalog.references(Path::new("/p/shared")), 0);
    }
}
