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

//! Disk-backed, content-addressed, streaming key/value cache with pluggable
//! eviction.

mod asyncify;
mod reclaimer;

pub mod cache;
pub mod catalog;
pub mod entry;
pub mod error;
pub mod event;
pub mod eviction;
pub mod prelude;
pub mod store;
pub mod test_utils;

use std::{fmt::Debug, hash::Hash};

pub use error::{Error, ErrorKind, Result};

/// Bound for cache keys.
pub trait Key: Send + Sync + 'static + Hash + Eq + Ord + Clone + Debug {}

impl<T: Send + Sync + 'static + Hash + Eq + Ord + Clone + Debug> Key for T {}
