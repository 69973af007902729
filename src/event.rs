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

use crate::{entry::CacheEntry, Key};

/// Observer of catalog changes.
///
/// Hooks run inline on the mutating thread, in the order the index updates
/// linearise; a hook must not assume the key is still present by the time it
/// inspects the cache. Long-running consumers should hand the entry off to a
/// channel.
#[allow(unused_variables)]
pub trait EventListener<K>: Send + Sync + 'static
where
    K: Key,
{
    /// A key was installed for the first time.
    fn on_entry_added(&self, entry: &Arc<CacheEntry<K>>) {}

    /// An already-indexed key was overwritten; `entry` is the new record.
    fn on_entry_updated(&self, entry: &Arc<CacheEntry<K>>) {}

    /// A key was evicted, cleared or superseded out of the index.
    fn on_entry_removed(&self, entry: &Arc<CacheEntry<K>>) {}
}
