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

//! Test utilities.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{entry::CacheEntry, event::EventListener, Key};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent<K> {
    Added(K),
    Updated(K),
    Removed(K),
}

/// [`EventListener`] implementation that records every event in order.
#[derive(Debug)]
pub struct EventRecorder<K>
where
    K: Key,
{
    events: Mutex<Vec<CacheEvent<K>>>,
}

impl<K> Default for EventRecorder<K>
where
    K: Key,
{
    fn default() -> Self {
        Self {
            events: Mutex::new(vec![]),
        }
    }
}

impl<K> EventRecorder<K>
where
    K: Key,
{
    pub fn events(&self) -> Vec<CacheEvent<K>> {
        self.events.lock().clone()
    }
}

impl<K> EventListener<K> for EventRecorder<K>
where
    K: Key,
{
    fn on_entry_added(&self, entry: &Arc<CacheEntry<K>>) {
        self.events.lock().push(CacheEvent::Added(entry.key().clone()));
    }

    fn on_entry_updated(&self, entry: &Arc<CacheEntry<K>>) {
        self.events.lock().push(CacheEvent::Updated(entry.key().clone()));
    }

    fn on_entry_removed(&self, entry: &Arc<CacheEntry<K>>) {
        self.events.lock().push(CacheEvent::Removed(entry.key().clone()));
    }
}
