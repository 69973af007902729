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

use std::path::PathBuf;

/// Cache error with a boxed kind to keep `Result` pointer-sized.
#[derive(thiserror::Error, Debug)]
#[error("{0}")]
pub struct Error(Box<ErrorKind>);

#[derive(thiserror::Error, Debug)]
pub enum ErrorKind {
    /// A caller-supplied argument failed validation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The requested key is not indexed.
    #[error("key not indexed")]
    NotFound,
    /// A key is indexed but its content file is missing or unreadable.
    #[error("indexed content missing or unreadable: {path}")]
    Corrupted { path: PathBuf },
    /// The configured root directory does not exist.
    #[error("cache root does not exist: {path}")]
    RootMissing { path: PathBuf },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind(), ErrorKind::NotFound)
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self.kind(), ErrorKind::InvalidArgument(_))
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        ErrorKind::InvalidArgument(message.into()).into()
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self(Box::new(kind))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        ErrorKind::from(e).into()
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        ErrorKind::from(e).into()
    }
}

pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_size() {
        assert_eq!(std::mem::size_of::<Error>(), std::mem::size_of::<usize>());
    }

    #[test]
    fn test_kind_roundtrip() {
        let e = Error::invalid_argument("capacity must be positive");
        assert!(e.is_invalid_argument());
        assert!(!e.is_not_found());
        assert_eq!(e.to_string(), "invalid argument: capacity must be positive");
    }
}
