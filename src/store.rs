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
    fs,
    path::{Path, PathBuf},
};

use uuid::Uuid;

use crate::{
    error::{ErrorKind, Result},
    Error,
};

/// Hex length of a SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

/// Outcome of a best-effort content file deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    /// Already gone; the caller may still unindex the key.
    Missing,
    /// Held open by a reader on a platform that forbids open-file deletion;
    /// retried on the next pass.
    Locked,
}

/// Content-addressed file layout under a caller-supplied root directory.
///
/// A value with digest `H` lives at `root/H[0:2]/H[2:4]/H`; the two-level
/// fan-out bounds per-directory entry count. Ingests stream into uniquely
/// named scratch files in the root and are renamed into place on success.
#[derive(Debug)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    /// Open the store over an existing directory and purge whatever a
    /// previous process left behind. Orphan files cannot be attributed to
    /// keys without a manifest, so the layout is reset-on-startup.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ErrorKind::RootMissing { path: root }.into());
        }
        let store = Self { root };
        store.purge()?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Derive the content path for a digest rendered as 64 hex characters.
    pub fn path_of(&self, digest: &str) -> Result<PathBuf> {
        if digest.len() != DIGEST_HEX_LEN || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::invalid_argument(format!("malformed content digest: {digest:?}")));
        }
        Ok(self.root.join(&digest[0..2]).join(&digest[2..4]).join(digest))
    }

    /// Uniquely named transient file path in the root.
    pub fn scratch_path(&self) -> PathBuf {
        self.root.join(Uuid::new_v4().to_string())
    }

    /// Move a finished scratch file into its content-addressed location.
    ///
    /// The rename stays on one filesystem and is atomic at the
    /// directory-entry level. If the target already exists the content is
    /// identical (same digest); the scratch is dropped instead.
    pub fn commit(&self, scratch: &Path, digest: &str) -> Result<PathBuf> {
        let path = self.path_of(digest)?;
        if path.is_file() {
            fs::remove_file(scratch)?;
            return Ok(path);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(scratch, &path)?;
        tracing::trace!("committed content file: {}", path.display());
        Ok(path)
    }

    /// Best-effort deletion; see [`RemoveOutcome`].
    pub fn remove(path: &Path) -> RemoveOutcome {
        match fs::remove_file(path) {
            Ok(()) => RemoveOutcome::Removed,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => RemoveOutcome::Missing,
            Err(e) => {
                tracing::warn!("skip locked content file {}: {}", path.display(), e);
                RemoveOutcome::Locked
            }
        }
    }

    /// Delete everything under the root: scratch residue, content files and
    /// fan-out directories.
    pub fn purge(&self) -> Result<()> {
        for dirent in fs::read_dir(&self.root)? {
            let dirent = dirent?;
            if dirent.file_type()?.is_dir() {
                fs::remove_dir_all(dirent.path())?;
            } else {
                fs::remove_file(dirent.path())?;
            }
        }
        Ok(())
    }
}
