// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

use std::fmt;

use harmonia_store_core::{NarHash, StorePath};
use thiserror::Error;

/// Coarse classification of every error the copy engine reports.
///
/// This is what ends up next to each failing path in the final summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    MissingPath,
    StoreUnavailable,
    UntrustedPath,
    ReadOnlyStore,
    TransferIo,
    ReferenceCycle,
    Usage,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::MissingPath => "MissingPathError",
            ErrorKind::StoreUnavailable => "StoreUnavailable",
            ErrorKind::UntrustedPath => "UntrustedPathError",
            ErrorKind::ReadOnlyStore => "ReadOnlyStoreError",
            ErrorKind::TransferIo => "TransferIOError",
            ErrorKind::ReferenceCycle => "ReferenceCycle",
            ErrorKind::Usage => "UsageError",
        })
    }
}

/// Errors returned by a [`StoreAdapter`](crate::StoreAdapter).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store '{uri}' is unavailable: {reason}")]
    Unavailable { uri: String, reason: String },

    #[error("store '{uri}' is read-only")]
    ReadOnly { uri: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid store data: {0}")]
    InvalidData(String),

    #[error("NAR hash mismatch in '{path}': expected {expected}, got {actual}")]
    NarHashMismatch {
        path: StorePath,
        expected: NarHash,
        actual: NarHash,
    },

    #[error("NAR size mismatch in '{path}': expected {expected} bytes, got {actual}")]
    NarSizeMismatch {
        path: StorePath,
        expected: u64,
        actual: u64,
    },

    #[error("path '{0}' is not valid")]
    NotFound(StorePath),
}

impl StoreError {
    /// Wrap an IO error. A verification failure that travelled through an
    /// `AsyncRead` as an IO error is unwrapped back into itself.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        match source.downcast::<StoreError>() {
            Ok(inner) => inner,
            Err(source) => Self::Io {
                context: context.into(),
                source,
            },
        }
    }

    pub fn unavailable(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            uri: uri.into(),
            reason: reason.into(),
        }
    }
}

/// Helper trait for adding context to IO errors
pub trait IoContext<T> {
    fn io_context<F>(self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce() -> String;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context<F>(self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| StoreError::io(f(), e))
    }
}

/// Errors that abort a copy before anything is transferred.
#[derive(Error, Debug)]
pub enum CopyError {
    #[error("path '{0}' is not valid in the source store")]
    MissingPath(StorePath),

    #[error("cannot query store '{uri}': {source}")]
    StoreUnavailable {
        uri: String,
        #[source]
        source: StoreError,
    },

    #[error("cycle detected in the references of '{path}' from '{reference}'")]
    ReferenceCycle {
        path: StorePath,
        reference: StorePath,
    },

    #[error("cannot copy from store directory '{from}' to store directory '{to}'")]
    StoreDirMismatch { from: String, to: String },
}

impl CopyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CopyError::MissingPath(_) => ErrorKind::MissingPath,
            CopyError::StoreUnavailable { .. } => ErrorKind::StoreUnavailable,
            CopyError::ReferenceCycle { .. } => ErrorKind::ReferenceCycle,
            CopyError::StoreDirMismatch { .. } => ErrorKind::Usage,
        }
    }

    /// Classify an adapter error raised while querying `uri`.
    pub(crate) fn from_query(uri: String, source: StoreError) -> Self {
        match source {
            StoreError::NotFound(path) => CopyError::MissingPath(path),
            source => CopyError::StoreUnavailable { uri, source },
        }
    }
}

/// Why a single path was not copied.
#[derive(Error, Debug)]
pub enum PathError {
    #[error("cannot add path '{0}' because it lacks a signature by a trusted key")]
    Untrusted(StorePath),

    #[error("cannot add path '{path}' to read-only store '{uri}'")]
    ReadOnlyStore { path: StorePath, uri: String },

    #[error("failed to copy '{path}': {source}")]
    TransferIo {
        path: StorePath,
        #[source]
        source: StoreError,
    },

    #[error("dependency '{dependency}' could not be copied ({kind})")]
    DependencyFailed {
        dependency: StorePath,
        kind: ErrorKind,
    },
}

impl PathError {
    /// The kind of the root cause; dependency failures inherit it.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PathError::Untrusted(_) => ErrorKind::UntrustedPath,
            PathError::ReadOnlyStore { .. } => ErrorKind::ReadOnlyStore,
            PathError::TransferIo { .. } => ErrorKind::TransferIo,
            PathError::DependencyFailed { kind, .. } => *kind,
        }
    }

    pub(crate) fn from_transfer(path: StorePath, source: StoreError) -> Self {
        match source {
            StoreError::ReadOnly { uri } => PathError::ReadOnlyStore { path, uri },
            source => PathError::TransferIo { path, source },
        }
    }
}
