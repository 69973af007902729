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

/// First-in-first-out: keeps the newest entries, evicts the oldest.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Fifo;

impl<K> EvictionPolicy<K> for Fifo
where
    K: Key,
{
    fn victims(&self, entries: &[Arc<CacheEntry<K>>], capacity: u64) -> Result<Vec<Arc<CacheEntry<K>>>> {
        ensure_capacity(capacity)?;
        let mut ordered = entries.to_vec();
        ordered.sort_by(|a, b| {
            b.created_instant()
                .cmp(&a.created_instant())
                .then_with(|| a.key().cmp(b.key()))
        });
        Ok(overflow(ordered, capacity))
    }
}

/// Last-in-first-out: keeps the oldest entries, evicts the newest.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Lifo;

impl<K> EvictionPolicy<K> for Lifo
where
    K: Key,
{
    fn victims(&self, entries: &[Arc<CacheEntry<K>>], capacity: u64) -> Result<Vec<Arc<CacheEntry<K>>>> {
        ensure_capacity(capacity)?;
        let mut ordered = entries.to_vec();
        ordered.sort_by(|a, b| {
            a.created_instant()
                .cmp(&b.created_instant())
                .then_with(|| a.key().cmp(b.key()))
        });
        Ok(overflow(ordered, capacity))
    }
}
