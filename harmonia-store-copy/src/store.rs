// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! The capability surface every store backend provides to the copy engine.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use harmonia_store_core::{NarHash, NarHasher, StoreDir, StorePath, ValidPathInfo};
use tokio::io::{AsyncRead, AsyncReadExt as _};

use crate::error::{IoContext as _, StoreError};

/// A NAR serialisation being streamed out of (or into) a store.
pub type NarReader = Pin<Box<dyn AsyncRead + Send>>;

const HASH_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepairFlag {
    #[default]
    NoRepair,
    Repair,
}

impl From<bool> for RepairFlag {
    fn from(repair: bool) -> Self {
        if repair {
            RepairFlag::Repair
        } else {
            RepairFlag::NoRepair
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckSigsFlag {
    NoCheckSigs,
    #[default]
    CheckSigs,
}

impl From<bool> for CheckSigsFlag {
    fn from(check: bool) -> Self {
        if check {
            CheckSigsFlag::CheckSigs
        } else {
            CheckSigsFlag::NoCheckSigs
        }
    }
}

/// Backend variant behind a store URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    BinaryCache,
    Local,
    RemoteShell,
    HttpBinaryCache,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StoreKind::Memory => "memory",
            StoreKind::BinaryCache => "binary cache",
            StoreKind::Local => "local",
            StoreKind::RemoteShell => "remote shell",
            StoreKind::HttpBinaryCache => "http binary cache",
        })
    }
}

/// A store the engine can read paths from or write paths to.
///
/// Adapters are the only place the engine performs IO. Everything that
/// is not backend specific has a default built on `query_path_info` and
/// `nar_from_path`.
pub trait StoreAdapter: Send + Sync + 'static {
    fn kind(&self) -> StoreKind;

    /// The URI this store was opened from, for messages.
    fn uri(&self) -> String;

    fn store_dir(&self) -> &StoreDir;

    /// Metadata of `path`, or `None` if the path is not valid in this store.
    fn query_path_info(
        &self,
        path: &StorePath,
    ) -> impl Future<Output = Result<Option<ValidPathInfo>, StoreError>> + Send;

    fn is_valid_path(
        &self,
        path: &StorePath,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send {
        async move { Ok(self.query_path_info(path).await?.is_some()) }
    }

    /// The subset of `paths` that is valid. Backends that can answer this in
    /// one round trip should override it.
    fn query_valid_paths(
        &self,
        paths: &BTreeSet<StorePath>,
    ) -> impl Future<Output = Result<BTreeSet<StorePath>, StoreError>> + Send {
        async move {
            let mut valid = BTreeSet::new();
            for path in paths {
                if self.is_valid_path(path).await? {
                    valid.insert(path.clone());
                }
            }
            Ok(valid)
        }
    }

    fn query_references(
        &self,
        path: &StorePath,
    ) -> impl Future<Output = Result<Option<BTreeSet<StorePath>>, StoreError>> + Send {
        async move { Ok(self.query_path_info(path).await?.map(|info| info.references)) }
    }

    /// Stream the NAR serialisation of a valid path.
    fn nar_from_path(
        &self,
        path: &StorePath,
    ) -> impl Future<Output = Result<NarReader, StoreError>> + Send;

    /// Add `info.path` with the content read from `nar`.
    ///
    /// The path only becomes valid once `nar` has been read to the end
    /// without error. With [`RepairFlag::NoRepair`] an already valid path is
    /// left alone; with [`RepairFlag::Repair`] its content is replaced.
    fn add_to_store(
        &self,
        info: &ValidPathInfo,
        nar: NarReader,
        repair: RepairFlag,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Recompute the NAR hash and size of a valid path from its content.
    fn query_nar_hash(
        &self,
        path: &StorePath,
    ) -> impl Future<Output = Result<(NarHash, u64), StoreError>> + Send {
        async move {
            let mut nar = self.nar_from_path(path).await?;
            let mut hasher = NarHasher::new();
            let mut buf = vec![0u8; HASH_BUFFER_SIZE];
            loop {
                let n = nar
                    .read(&mut buf)
                    .await
                    .io_context(|| format!("reading NAR of '{path}'"))?;
                if n == 0 {
                    break;
                }
                hasher.update(&buf[..n]);
            }
            Ok(hasher.finish())
        }
    }
}
