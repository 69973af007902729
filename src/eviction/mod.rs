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

pub mod fifo;
pub mod lfu;
pub mod lru;
pub mod ttl;

use std::{fmt::Debug, sync::Arc};

use crate::{entry::CacheEntry, error::Result, Error, Key};

pub use fifo::{Fifo, Lifo};
pub use lfu::{Lfu, Mfu};
pub use lru::{Lru, Mru};
pub use ttl::{FixedTtl, SlidingTtl};

/// Victim selection over a snapshot of the indexed entries.
///
/// Implementations are pure: the result depends only on the given snapshot,
/// the capacity and the clock. They never touch engine state.
pub trait EvictionPolicy<K>: Send + Sync + 'static + Debug
where
    K: Key,
{
    /// Select the entries to evict so that the remainder fits `capacity`.
    ///
    /// `capacity` must be strictly positive.
    fn victims(&self, entries: &[Arc<CacheEntry<K>>], capacity: u64) -> Result<Vec<Arc<CacheEntry<K>>>>;
}

pub(crate) fn ensure_capacity(capacity: u64) -> Result<()> {
    if capacity == 0 {
        return Err(Error::invalid_argument("capacity must be positive"));
    }
    Ok(())
}

/// Walk `ordered` (most desirable first) accumulating sizes. The entry at
/// which the kept total would exceed `capacity`, and everything after it,
/// are victims. An entry larger than `capacity` by itself always overflows.
pub(crate) fn overflow<K>(ordered: Vec<Arc<CacheEntry<K>>>, capacity: u64) -> Vec<Arc<CacheEntry<K>>>
where
    K: Key,
{
    let mut kept = 0u64;
    let mut overflowed = false;
    let mut victims = vec![];
    for entry in ordered {
        if !overflowed && kept.saturating_add(entry.size()) > capacity {
            overflowed = true;
        }
        if overflowed {
            victims.push(entry);
        } else {
            kept += entry.size();
        }
    }
    victims
}


#[cfg(test)]
mod tests {
    use super::{test_utils::*, *};

    #[test]
    fn test_overflow_walk() {
        let entries = vec![entry(1u64, 5), entry(2u64, 5), entry(3u64, 5)];
        assert_eq!(keys(&overflow(entries.clone(), 12)), vec![3]);
        assert_eq!(keys(&overflow(entries.clone(), 15)), Vec::<u64>::new());
        assert_eq!(keys(&overflow(entries, 4)), vec![1, 2, 3]);
    }

    #[test]
    fn test_oversized_entry_always_overflows() {
        let entries = vec![entry(1u64, 100), entry(2u64, 5)];
        // the oversized head drags the rest of the walk with it
        assert_eq!(keys(&overflow(entries, 10)), vec![1, 2]);
    }
}
