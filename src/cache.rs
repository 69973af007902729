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
    io::{Read, Write},
    path::{Path, PathBuf},
    pin::Pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    task::{Context, Poll},
    time::Duration,
};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt, ReadBuf},
    sync::broadcast,
    task::JoinHandle,
};

use crate::{
    asyncify::asyncify,
    catalog::Catalog,
    entry::CacheEntry,
    error::{ErrorKind, Result},
    event::EventListener,
    eviction::EvictionPolicy,
    reclaimer::Reclaimer,
    store::{ContentStore, RemoveOutcome},
    Error, Key,
};

const INGEST_BUFFER_SIZE: usize = 4096;
const CLEAR_RETRY_QUANTUM: Duration = Duration::from_millis(100);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_CATALOG_SHARD_BITS: usize = 6;
const DEFAULT_BROADCAST_CAPACITY: usize = 16;

/// Builder for [`Cellar`].
pub struct CellarBuilder<K>
where
    K: Key,
{
    dir: PathBuf,
    capacity: u64,
    policy: Option<Arc<dyn EvictionPolicy<K>>>,
    poll_interval: Duration,
    catalog_shard_bits: usize,
    listeners: Vec<Arc<dyn EventListener<K>>>,
}

impl<K> CellarBuilder<K>
where
    K: Key,
{
    /// Start building a cache over `dir`. The directory must already exist
    /// and be writable; it is purged when the cache opens.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            capacity: 0,
            policy: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            catalog_shard_bits: DEFAULT_CATALOG_SHARD_BITS,
            listeners: vec![],
        }
    }

    /// Total byte quota for stored content. Required, strictly positive.
    pub fn with_capacity(mut self, capacity: u64) -> Self {
        self.capacity = capacity;
        self
    }

    /// Victim-selection policy. Required.
    pub fn with_policy(mut self, policy: impl EvictionPolicy<K>) -> Self {
        self.policy = Some(Arc::new(policy));
        self
    }

    /// Period of the background eviction pass. Default 1 minute.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Catalog shard count is `2 ^ bits`.
    pub fn with_catalog_shard_bits(mut self, bits: usize) -> Self {
        self.catalog_shard_bits = bits;
        self
    }

    /// Register an observer of catalog changes.
    pub fn with_event_listener(mut self, listener: Arc<dyn EventListener<K>>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub async fn open(self) -> Result<Cellar<K>> {
        if self.capacity == 0 {
            return Err(Error::invalid_argument("capacity must be positive"));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::invalid_argument("poll interval must be positive"));
        }
        let policy = self
            .policy
            .ok_or_else(|| Error::invalid_argument("eviction policy must be provided"))?;

        tracing::info!(
            "open cellar at {} with capacity {} and policy {:?}",
            self.dir.display(),
            self.capacity,
            policy,
        );

        let dir = self.dir;
        let store = asyncify(move || ContentStore::open(dir)).await?;

        let (stop_tx, stop_rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        let inner = Arc::new(CellarInner {
            capacity: self.capacity,
            policy,
            catalog: Catalog::new(self.catalog_shard_bits),
            store,
            listeners: self.listeners,
            mutation: Mutex::new(()),
            stop_tx,
            reclaimer: Mutex::new(None),
            disposed: AtomicBool::new(false),
        });

        let reclaimer = Reclaimer::new(Arc::downgrade(&inner), self.poll_interval, stop_rx);
        let handle = tokio::spawn(reclaimer.run());
        *inner.reclaimer.lock() = Some(handle);

        Ok(Cellar { inner })
    }
}

/// Disk-backed, content-addressed, streaming key/value cache.
///
/// Values are opaque byte streams, persisted under a bounded-size
/// content-addressed layout and evicted by the policy chosen at
/// construction. Cheap to clone; all clones share one engine.
pub struct Cellar<K>
where
    K: Key,
{
    inner: Arc<CellarInner<K>>,
}

impl<K> Debug for Cellar<K>
where
    K: Key,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cellar")
            .field("root", &self.inner.store.root())
            .field("capacity", &self.inner.capacity)
            .field("policy", &self.inner.policy)
            .finish()
    }
}

impl<K> Clone for Cellar<K>
where
    K: Key,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

enum Ingest {
    Committed,
    Overflow,
}

impl<K> Cellar<K>
where
    K: Key,
{
    /// Whether `key` is currently indexed.
    pub fn contains(&self, key: &K) -> bool {
        self.inner.catalog.contains(key)
    }

    /// Open a read-only stream over the cached value.
    ///
    /// The stream is owned by the caller and outlives any later eviction of
    /// the key. Reading refreshes the entry's access statistics.
    pub async fn get(&self, key: &K) -> Result<ValueReader> {
        let item = self.inner.catalog.lookup(key).ok_or(ErrorKind::NotFound)?;
        let file = match tokio::fs::File::open(&item.path).await {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!("indexed content unreadable at {}: {}", item.path.display(), e);
                return Err(ErrorKind::Corrupted { path: item.path }.into());
            }
        };
        item.entry.refresh();
        Ok(ValueReader {
            len: item.entry.size(),
            file,
        })
    }

    /// [`Cellar::get`] with the miss folded into the value.
    pub async fn try_get(&self, key: &K) -> Result<Option<ValueReader>> {
        match self.get(key).await {
            Ok(reader) => Ok(Some(reader)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Blocking counterpart of [`Cellar::get`].
    pub fn get_blocking(&self, key: &K) -> Result<BlockingValueReader> {
        let item = self.inner.catalog.lookup(key).ok_or(ErrorKind::NotFound)?;
        let file = match std::fs::File::open(&item.path) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!("indexed content unreadable at {}: {}", item.path.display(), e);
                return Err(ErrorKind::Corrupted { path: item.path }.into());
            }
        };
        item.entry.refresh();
        Ok(BlockingValueReader {
            len: item.entry.size(),
            file,
        })
    }

    /// Blocking counterpart of [`Cellar::try_get`].
    pub fn try_get_blocking(&self, key: &K) -> Result<Option<BlockingValueReader>> {
        match self.get_blocking(key) {
            Ok(reader) => Ok(Some(reader)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Stream `source` into the cache under `key`.
    ///
    /// Fails with an invalid-argument error when the stream exceeds the
    /// configured capacity; the partial ingest leaves no trace on disk or in
    /// the index.
    pub async fn set<R>(&self, key: K, source: R) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        match self.ingest(key, source).await? {
            Ingest::Committed => self.evict().await,
            Ingest::Overflow => Err(Error::invalid_argument("stream exceeds capacity")),
        }
    }

    /// [`Cellar::set`] with the quota overflow folded into the value:
    /// returns `false` instead of failing when the stream exceeds capacity.
    pub async fn try_set<R>(&self, key: K, source: R) -> Result<bool>
    where
        R: AsyncRead + Unpin,
    {
        match self.ingest(key, source).await? {
            Ingest::Committed => {
                self.evict().await?;
                Ok(true)
            }
            Ingest::Overflow => Ok(false),
        }
    }

    /// Blocking counterpart of [`Cellar::set`].
    pub fn set_blocking<R>(&self, key: K, source: R) -> Result<()>
    where
        R: Read,
    {
        match self.ingest_blocking(key, source)? {
            Ingest::Committed => self.inner.evict(),
            Ingest::Overflow => Err(Error::invalid_argument("stream exceeds capacity")),
        }
    }

    /// Blocking counterpart of [`Cellar::try_set`].
    pub fn try_set_blocking<R>(&self, key: K, source: R) -> Result<bool>
    where
        R: Read,
    {
        match self.ingest_blocking(key, source)? {
            Ingest::Committed => {
                self.inner.evict()?;
                Ok(true)
            }
            Ingest::Overflow => Ok(false),
        }
    }

    /// Remove every entry and reset the on-disk layout.
    ///
    /// Entries whose content file is held open elsewhere are retried every
    /// 100 ms until the index drains.
    pub async fn clear(&self) -> Result<()> {
        loop {
            let inner = self.inner.clone();
            if !asyncify(move || inner.clear_pass()).await {
                break;
            }
            tokio::time::sleep(CLEAR_RETRY_QUANTUM).await;
        }
        let inner = self.inner.clone();
        asyncify(move || inner.store.purge()).await
    }

    /// Blocking counterpart of [`Cellar::clear`].
    pub fn clear_blocking(&self) -> Result<()> {
        while self.inner.clear_pass() {
            std::thread::sleep(CLEAR_RETRY_QUANTUM);
        }
        self.inner.store.purge()
    }

    /// Stop the background eviction task, clear the cache and mark it
    /// disposed. Idempotent; operations after dispose are unspecified.
    pub async fn dispose(&self) -> Result<()> {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let _ = self.inner.stop_tx.send(());
        let handle = self.inner.reclaimer.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.clear().await
    }

    /// Run one eviction pass now.
    pub async fn evict(&self) -> Result<()> {
        let inner = self.inner.clone();
        asyncify(move || inner.evict()).await
    }

    async fn ingest<R>(&self, key: K, mut source: R) -> Result<Ingest>
    where
        R: AsyncRead + Unpin,
    {
        let mut guard = ScratchGuard::new(self.inner.store.scratch_path());
        let mut file = tokio::fs::File::create(guard.path()).await?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; INGEST_BUFFER_SIZE];
        let mut n: u64 = 0;

        loop {
            let k = source.read(&mut buf).await?;
            if k == 0 {
                break;
            }
            hasher.update(&buf[..k]);
            file.write_all(&buf[..k]).await?;
            n += k as u64;
            if n > self.inner.capacity {
                drop(file);
                return Ok(Ingest::Overflow);
            }
        }
        file.flush().await?;
        drop(file);

        if n == 0 {
            return Err(Error::invalid_argument("source stream is empty"));
        }

        let digest = hex::encode(hasher.finalize());
        let scratch = guard.path().to_path_buf();
        let inner = self.inner.clone();
        asyncify(move || {
            let path = inner.store.commit(&scratch, &digest)?;
            inner.install(key, n, path)
        })
        .await?;
        guard.disarm();

        Ok(Ingest::Committed)
    }

    fn ingest_blocking<R>(&self, key: K, mut source: R) -> Result<Ingest>
    where
        R: Read,
    {
        let mut guard = ScratchGuard::new(self.inner.store.scratch_path());
        let mut file = std::fs::File::create(guard.path())?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; INGEST_BUFFER_SIZE];
        let mut n: u64 = 0;

        loop {
            let k = source.read(&mut buf)?;
            if k == 0 {
                break;
            }
            hasher.update(&buf[..k]);
            file.write_all(&buf[..k])?;
            n += k as u64;
            if n > self.inner.capacity {
                drop(file);
                return Ok(Ingest::Overflow);
            }
        }
        file.flush()?;
        drop(file);

        if n == 0 {
            return Err(Error::invalid_argument("source stream is empty"));
        }

        let digest = hex::encode(hasher.finalize());
        let path = self.inner.store.commit(guard.path(), &digest)?;
        self.inner.install(key, n, path)?;
        guard.disarm();

        Ok(Ingest::Committed)
    }
}

pub(crate) struct CellarInner<K>
where
    K: Key,
{
    capacity: u64,
    policy: Arc<dyn EvictionPolicy<K>>,

    catalog: Catalog<K>,
    store: ContentStore,

    listeners: Vec<Arc<dyn EventListener<K>>>,
    /// Serialises catalog mutation + event emission so observers see events
    /// in linearisation order.
    mutation: Mutex<()>,

    stop_tx: broadcast::Sender<()>,
    reclaimer: Mutex<Option<JoinHandle<()>>>,
    disposed: AtomicBool,
}

impl<K> CellarInner<K>
where
    K: Key,
{
    /// Index the committed content under `key` and notify observers.
    fn install(&self, key: K, size: u64, path: PathBuf) -> Result<()> {
        let entry = Arc::new(CacheEntry::new(key, size)?);
        let prior = {
            let _order = self.mutation.lock();
            let prior = self.catalog.insert(entry.clone(), path.clone());
            if prior.is_none() {
                self.emit(|listener| listener.on_entry_added(&entry));
            } else {
                self.emit(|listener| listener.on_entry_updated(&entry));
            }
            prior
        };
        if let Some(prior) = prior {
            if prior.path != path && self.catalog.references(&prior.path) == 0 {
                ContentStore::remove(&prior.path);
            }
        }
        Ok(())
    }

    pub(crate) fn evict(&self) -> Result<()> {
        let entries = self.catalog.snapshot();
        if entries.is_empty() {
            return Ok(());
        }
        let victims = self.policy.victims(&entries, self.capacity)?;
        let mut removed = 0;
        for victim in victims {
            if self.evict_one(victim) {
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::debug!("eviction pass removed {} entries", removed);
        }
        Ok(())
    }

    fn evict_one(&self, victim: Arc<CacheEntry<K>>) -> bool {
        let key = victim.key();
        let Some(item) = self.catalog.lookup(key) else {
            return false;
        };
        if !Arc::ptr_eq(&item.entry, &victim) {
            // re-set since the snapshot; not a victim anymore
            return false;
        }
        if self.catalog.references(&item.path) == 1 && ContentStore::remove(&item.path) == RemoveOutcome::Locked {
            return false;
        }
        let _order = self.mutation.lock();
        match self.catalog.remove_if(key, |it| Arc::ptr_eq(&it.entry, &victim)) {
            Some(removed) => {
                self.emit(|listener| listener.on_entry_removed(&removed.entry));
                true
            }
            None => false,
        }
    }

    /// One pass over the current entries; returns whether any remain
    /// (because their content files are locked).
    fn clear_pass(&self) -> bool {
        for entry in self.catalog.snapshot() {
            let key = entry.key();
            let Some(item) = self.catalog.lookup(key) else {
                continue;
            };
            if self.catalog.references(&item.path) == 1 && ContentStore::remove(&item.path) == RemoveOutcome::Locked {
                continue;
            }
            let _order = self.mutation.lock();
            if let Some(removed) = self.catalog.remove(key) {
                self.emit(|listener| listener.on_entry_removed(&removed.entry));
            }
        }
        !self.catalog.is_empty()
    }

    fn emit<F>(&self, f: F)
    where
        F: Fn(&dyn EventListener<K>),
    {
        for listener in self.listeners.iter() {
            f(listener.as_ref());
        }
    }
}

/// Deletes the scratch file on drop unless the ingest committed.
struct ScratchGuard {
    path: PathBuf,
    armed: bool,
}

impl ScratchGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("failed to remove scratch file {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Read-only stream over one cached value.
#[derive(Debug)]
pub struct ValueReader {
    len: u64,
    file: tokio::fs::File,
}

impl ValueReader {
    /// Exact length of the stream in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn into_inner(self) -> tokio::fs::File {
        self.file
    }
}

impl AsyncRead for ValueReader {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.file).poll_read(cx, buf)
    }
}

/// Blocking counterpart of [`ValueReader`].
pub struct BlockingValueReader {
    len: u64,
    file: std::fs::File,
}

impl BlockingValueReader {
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn into_inner(self) -> std::fs::File {
        self.file
    }
}

impl Read for BlockingValueReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.file.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eviction::Lru;

    #[tokio::test]
    async fn test_builder_validation() {
        let dir = tempfile::tempdir().unwrap();

        let err = CellarBuilder::<String>::new(dir.path())
            .with_policy(Lru)
            .open()
            .await
            .unwrap_err();
        assert!(err.is_invalid_argument());

        let err = CellarBuilder::<String>::new(dir.path())
            .with_capacity(16)
            .open()
            .await
            .unwrap_err();
        assert!(err.is_invalid_argument());

        let err = CellarBuilder::<String>::new(dir.path())
            .with_capacity(16)
            .with_policy(Lru)
            .with_poll_interval(Duration::ZERO)
            .open()
            .await
            .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[tokio::test]
    async fn test_missing_root_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = CellarBuilder::<String>::new(dir.path().join("absent"))
            .with_capacity(16)
            .with_policy(Lru)
            .open()
            .await
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::RootMissing { .. }));
    }

    #[tokio::test]
    async fn test_empty_source_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cellar = CellarBuilder::<String>::new(dir.path())
            .with_capacity(16)
            .with_policy(Lru)
            .open()
            .await
            .unwrap();

        let err = cellar.set("k".to_string(), &b""[..]).await.unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(!cellar.contains(&"k".to_string()));
        // no scratch residue
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        cellar.dispose().await.unwrap();
    }
}
