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

use std::{sync::Weak, time::Duration};

use tokio::{sync::broadcast, time::MissedTickBehavior};

use crate::{asyncify::asyncify, cache::CellarInner, Key};

/// Periodic eviction task.
///
/// Holds only a weak reference to the engine: a cache that is dropped
/// without being disposed lets the task exit on its next tick instead of
/// keeping the engine alive forever.
pub(crate) struct Reclaimer<K>
where
    K: Key,
{
    inner: Weak<CellarInner<K>>,
    period: Duration,
    stop_rx: broadcast::Receiver<()>,
}

impl<K> Reclaimer<K>
where
    K: Key,
{
    pub(crate) fn new(inner: Weak<CellarInner<K>>, period: Duration, stop_rx: broadcast::Receiver<()>) -> Self {
        Self { inner, period, stop_rx }
    }

    pub(crate) async fn run(mut self) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let Some(inner) = self.inner.upgrade() else { break };
                    if let Err(e) = asyncify(move || inner.evict()).await {
                        tracing::warn!("eviction pass failed: {}", e);
                    }
                }
                _ = self.stop_rx.recv() => break,
            }
        }

        tracing::debug!("reclaimer exits");
    }
}
