// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Opening stores from the URIs given on the command line.

use std::collections::BTreeSet;

use harmonia_store_binary_cache::{BinaryCacheConfig, BinaryCacheStore};
use harmonia_store_copy::{MemoryStore, NarReader, RepairFlag, StoreAdapter, StoreError, StoreKind};
use harmonia_store_core::{StoreDir, StorePath, ValidPathInfo};
use tracing::debug;

use crate::error::ClientError;

/// What a store URI refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreUri {
    BinaryCache(BinaryCacheConfig),
    /// `dummy://`: an empty store that accepts nothing.
    Dummy,
    /// A store type this build knows about but cannot open.
    Unsupported { uri: String, kind: StoreKind },
}

impl StoreUri {
    pub fn parse(uri: &str, store_dir: &StoreDir) -> Result<Self, ClientError> {
        let unsupported = |kind| {
            Ok(StoreUri::Unsupported {
                uri: uri.to_string(),
                kind,
            })
        };
        match uri.split_once("://") {
            Some(("file", _)) => Ok(StoreUri::BinaryCache(BinaryCacheConfig::from_uri(
                uri,
                store_dir.clone(),
            )?)),
            Some(("dummy", _)) => Ok(StoreUri::Dummy),
            Some(("ssh" | "ssh-ng", _)) => unsupported(StoreKind::RemoteShell),
            Some(("http" | "https", _)) => unsupported(StoreKind::HttpBinaryCache),
            Some(("local" | "unix", _)) => unsupported(StoreKind::Local),
            Some((scheme, _)) => Err(ClientError::usage(format!(
                "don't know how to open Nix store with scheme '{scheme}'"
            ))),
            None if matches!(uri, "auto" | "daemon" | "local") || uri.starts_with('/') => {
                unsupported(StoreKind::Local)
            }
            None => Err(ClientError::usage(format!(
                "don't know how to open Nix store '{uri}'"
            ))),
        }
    }
}

/// Every store the client can open.
#[derive(Debug)]
pub enum Store {
    BinaryCache(BinaryCacheStore),
    Memory(MemoryStore),
}

impl Store {
    pub async fn open(uri: &str, store_dir: &StoreDir) -> Result<Self, ClientError> {
        let store = match StoreUri::parse(uri, store_dir)? {
            StoreUri::BinaryCache(config) => {
                Store::BinaryCache(BinaryCacheStore::open(config).await?)
            }
            StoreUri::Dummy => Store::Memory(
                MemoryStore::new("dummy")
                    .with_store_dir(store_dir.clone())
                    .read_only(),
            ),
            StoreUri::Unsupported { uri, kind } => {
                return Err(StoreError::unavailable(
                    uri,
                    format!("{kind} stores are not supported by this build"),
                )
                .into());
            }
        };
        debug!(uri = %store.uri(), kind = %store.kind(), "opened store");
        Ok(store)
    }
}

impl StoreAdapter for Store {
    fn kind(&self) -> StoreKind {
        match self {
            Store::BinaryCache(store) => store.kind(),
            Store::Memory(store) => store.kind(),
        }
    }

    fn uri(&self) -> String {
        match self {
            Store::BinaryCache(store) => store.uri(),
            Store::Memory(store) => store.uri(),
        }
    }

    fn store_dir(&self) -> &StoreDir {
        match self {
            Store::BinaryCache(store) => store.store_dir(),
            Store::Memory(store) => store.store_dir(),
        }
    }

    async fn query_path_info(&self, path: &StorePath) -> Result<Option<ValidPathInfo>, StoreError> {
        match self {
            Store::BinaryCache(store) => store.query_path_info(path).await,
            Store::Memory(store) => store.query_path_info(path).await,
        }
    }

    async fn query_valid_paths(
        &self,
        paths: &BTreeSet<StorePath>,
    ) -> Result<BTreeSet<StorePath>, StoreError> {
        match self {
            Store::BinaryCache(store) => store.query_valid_paths(paths).await,
            Store::Memory(store) => store.query_valid_paths(paths).await,
        }
    }

    async fn nar_from_path(&self, path: &StorePath) -> Result<NarReader, StoreError> {
        match self {
            Store::BinaryCache(store) => store.nar_from_path(path).await,
            Store::Memory(store) => store.nar_from_path(path).await,
        }
    }

    async fn add_to_store(
        &self,
        info: &ValidPathInfo,
        nar: NarReader,
        repair: RepairFlag,
    ) -> Result<(), StoreError> {
        match self {
            Store::BinaryCache(store) => store.add_to_store(info, nar, repair).await,
            Store::Memory(store) => store.add_to_store(info, nar, repair).await,
        }
    }
}
