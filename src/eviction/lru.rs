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

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    entry::CacheEntry,
    error::Result,
    eviction::{ensure_capacity, overflow, EvictionPolicy},
    Key,
};

/// Least-recently-used: keeps the most recently accessed entries.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Lru;

impl<K> EvictionPolicy<K> for Lru
where
    K: Key,
{
    fn victims(&self, entries: &[Arc<CacheEntry<K>>], capacity: u64) -> Result<Vec<Arc<CacheEntry<K>>>> {
        ensure_capacity(capacity)?;
        let mut ordered = entries.to_vec();
        ordered.sort_by(|a, b| {
            b.last_accessed_instant()
                .cmp(&a.last_accessed_instant())
                .then_with(|| a.key().cmp(b.key()))
        });
        Ok(overflow(ordered, capacity))
    }
}

/// Most-recently-used: keeps the entries that have been idle the longest.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Mru;

impl<K> EvictionPolicy<K> for Mru
where
    K: Key,
{
    fn victims(&self, entries: &[Arc<CacheEntry<K>>], capacity: u64) -> Result<Vec<Arc<CacheEntry<K>>>> {
        ensure_capacity(capacity)?;
        let mut ordered = entries.to_vec();
        ordered.sort_by(|a, b| {
            a.last_accessed_instant()
                .cmp(&b.last_accessed_instant())
                .then_with(|| a.key().cmp(b.key()))
        });
        Ok(overflow(ordered, capacity))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::eviction::test_utils::{entry, keys};

    fn aged_entries() -> Vec<Arc<CacheEntry<u64>>> {
        // touch order: 1, then 2, then 3; 3 is the most recent
        let entries = vec![entry(1u64, 5), entry(2u64, 5), entry(3u64, 5)];
        for e in &entries {
            std::thread::sleep(Duration::from_millis(5));
            e.refresh();
        }
        entries
    }

    #[test]
    fn test_lru_evicts_stalest() {
        let entries = aged_entries();
        let victims = Lru.victims(&entries, 12).unwrap();
        assert_eq!(keys(&victims), vec![1]);
    }

    #[test]
    fn test_mru_evicts_freshest() {
        let entries = aged_entries();
        let victims = Mru.victims(&entries, 12).unwrap();
        assert_eq!(keys(&victims), vec![3]);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let entries = aged_entries();
        assert!(Lru.victims(&entries, 0).unwrap_err().is_invalid_argument());
    }
}
