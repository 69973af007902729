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

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    entry::CacheEntry,
    error::Result,
    eviction::{ensure_capacity, overflow, EvictionPolicy},
    Error, Key,
};

/// Sliding time-to-live: entries idle for longer than the window are evicted
/// regardless of capacity; the rest behave like [`crate::eviction::Lru`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SlidingTtl {
    ttl: Duration,
}

impl SlidingTtl {
    /// `ttl` must be strictly positive.
    pub fn new(ttl: Duration) -> Result<Self> {
        if ttl.is_zero() {
            return Err(Error::invalid_argument("ttl must be positive"));
        }
        Ok(Self { ttl })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl<K> EvictionPolicy<K> for SlidingTtl
where
    K: Key,
{
    fn victims(&self, entries: &[Arc<CacheEntry<K>>], capacity: u64) -> Result<Vec<Arc<CacheEntry<K>>>> {
        ensure_capacity(capacity)?;
        let (expired, live): (Vec<_>, Vec<_>) = entries.iter().cloned().partition(|e| e.idle() > self.ttl);
        let mut ordered = live;
        ordered.sort_by(|a, b| {
            b.last_accessed_instant()
                .cmp(&a.last_accessed_instant())
                .then_with(|| a.key().cmp(b.key()))
        });
        let mut victims = expired;
        victims.extend(overflow(ordered, capacity));
        Ok(victims)
    }
}

/// Fixed time-to-live: entries resident for longer than the window are
/// evicted regardless of capacity; the rest are kept newest-created first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FixedTtl {
    ttl: Duration,
}

impl FixedTtl {
    /// `ttl` must be strictly positive.
    pub fn new(ttl: Duration) -> Result<Self> {
        if ttl.is_zero() {
            return Err(Error::invalid_argument("ttl must be positive"));
        }
        Ok(Self { ttl })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl<K> EvictionPolicy<K> for FixedTtl
where
    K: Key,
{
    fn victims(&self, entries: &[Arc<CacheEntry<K>>], capacity: u64) -> Result<Vec<Arc<CacheEntry<K>>>> {
        ensure_capacity(capacity)?;
        let (expired, live): (Vec<_>, Vec<_>) = entries.iter().cloned().partition(|e| e.age() > self.ttl);
        let mut ordered = live;
        ordered.sort_by(|a, b| {
            b.created_instant()
                .cmp(&a.created_instant())
                .then_with(|| a.key().cmp(b.key()))
        });
        let mut victims = expired;
        victims.extend(overflow(ordered, capacity));
        Ok(victims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eviction::test_utils::{entry, keys};

    #[test]
    fn test_zero_ttl_rejected() {
        assert!(SlidingTtl::new(Duration::ZERO).unwrap_err().is_invalid_argument());
        assert!(FixedTtl::new(Duration::ZERO).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_fixed_ttl_expires_regardless_of_capacity() {
        let policy = FixedTtl::new(Duration::from_millis(5)).unwrap();
        let entries = vec![entry("a".to_string(), 5)];
        std::thread::sleep(Duration::from_millis(20));
        let victims = policy.victims(&entries, u64::MAX).unwrap();
        assert_eq!(keys(&victims), vec!["a".to_string()]);
    }

    #[test]
    fn test_sliding_ttl_survives_while_touched() {
        let policy = SlidingTtl::new(Duration::from_millis(50)).unwrap();
        let entries = vec![entry("a".to_string(), 5)];
        std::thread::sleep(Duration::from_millis(20));
        entries[0].refresh();
        assert!(policy.victims(&entries, u64::MAX).unwrap().is_empty());
    }

    #[test]
    fn test_sliding_ttl_expires_when_idle() {
        let policy = SlidingTtl::new(Duration::from_millis(5)).unwrap();
        let entries = vec![entry("a".to_string(), 5)];
        std::thread::sleep(Duration::from_millis(20));
        let victims = policy.victims(&entries, u64::MAX).unwrap();
        assert_eq!(keys(&victims), vec!["a".to_string()]);
    }

    #[test]
    fn test_live_entries_still_bounded_by_capacity() {
        let policy = SlidingTtl::new(Duration::from_secs(3600)).unwrap();
        let entries = vec![entry(1u64, 5), entry(2u64, 5), entry(3u64, 5)];
        for e in &entries {
            std::thread::sleep(Duration::from_millis(5));
            e.refresh();
        }
        let victims = policy.victims(&entries, 12).unwrap();
        assert_eq!(keys(&victims), vec![1]);
    }
}
