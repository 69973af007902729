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
    fmt::Debug,
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant, SystemTime},
};

use crate::{error::Result, Error, Key};

/// [`CacheEntry`] holds the metadata of one cached value.
///
/// The key and size are immutable after creation. Access statistics are
/// updated in place through [`CacheEntry::refresh`] and are safe to mutate
/// from concurrent readers.
///
/// Instants are tracked on the monotonic clock so that ordering decisions
/// survive wall-clock jumps; the wall-clock accessors derive their result
/// from the monotonic offset.
pub struct CacheEntry<K>
where
    K: Key,
{
    key: K,
    size: u64,

    created_at: SystemTime,
    created_instant: Instant,

    /// Nanoseconds between creation and the latest access.
    last_accessed_nanos: AtomicU64,
    access_count: AtomicU64,
}

impl<K> Debug for CacheEntry<K>
where
    K: Key,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("key", &self.key)
            .field("size", &self.size)
            .field("access_count", &self.access_count())
            .finish()
    }
}

impl<K> CacheEntry<K>
where
    K: Key,
{
    /// Create a metadata record for a value of `size` bytes.
    ///
    /// `size` must be strictly positive.
    pub fn new(key: K, size: u64) -> Result<Self> {
        if size == 0 {
            return Err(Error::invalid_argument("entry size must be positive"));
        }
        Ok(Self {
            key,
            size,
            created_at: SystemTime::now(),
            created_instant: Instant::now(),
            last_accessed_nanos: AtomicU64::new(0),
            access_count: AtomicU64::new(0),
        })
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub(crate) fn created_instant(&self) -> Instant {
        self.created_instant
    }

    /// Record one access: bump the counter and advance the last-accessed
    /// instant. `fetch_max` keeps the instant monotonic under concurrent
    /// callers.
    pub fn refresh(&self) {
        self.access_count.fetch_add(1, Ordering::Relaxed);
        let nanos = self.created_instant.elapsed().as_nanos() as u64;
        self.last_accessed_nanos.fetch_max(nanos, Ordering::Relaxed);
    }

    pub fn access_count(&self) -> u64 {
        self.access_count.load(Ordering::Relaxed)
    }

    pub(crate) fn last_accessed_instant(&self) -> Instant {
        self.created_instant + Duration::from_nanos(self.last_accessed_nanos.load(Ordering::Relaxed))
    }

    /// Wall-clock instant of the latest access, derived from the monotonic
    /// offset. Never earlier than [`CacheEntry::created_at`].
    pub fn last_accessed(&self) -> SystemTime {
        let idle = self.idle();
        SystemTime::now().checked_sub(idle).unwrap_or(self.created_at)
    }

    /// Time elapsed since the latest access (or creation, if never read).
    pub fn idle(&self) -> Duration {
        Instant::now().saturating_duration_since(self.last_accessed_instant())
    }

    /// Time elapsed since creation.
    pub fn age(&self) -> Duration {
        self.created_instant.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_size_rejected() {
        assert!(CacheEntry::new("k".to_string(), 0).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_refresh() {
        let entry = CacheEntry::new("k".to_string(), 4).unwrap();
        assert_eq!(entry.access_count(), 0);
        assert_eq!(entry.last_accessed_instant(), entry.created_instant());

        std::thread::sleep(Duration::from_millis(5));
        entry.refresh();
        entry.refresh();

        assert_eq!(entry.access_count(), 2);
        assert!(entry.last_accessed_instant() > entry.created_instant());
        assert!(entry.last_accessed() >= entry.created_at());
    }

    #[test]
    fn test_idle_resets_on_refresh() {
        let entry = CacheEntry::new(42u64, 1).unwrap();
        std::thread::sleep(Duration::from_millis(10));
        assert!(entry.idle() >= Duration::from_millis(10));
        entry.refresh();
        assert!(entry.idle() < Duration::from_millis(10));
        assert!(entry.age() >= Duration::from_millis(10));
    }
}
