// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! An in-process store keeping path infos and NARs in a map.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use harmonia_store_core::{NarHash, StoreDir, StorePath, ValidPathInfo};
use tokio::io::AsyncReadExt as _;
use tracing::debug;

use crate::error::{IoContext as _, StoreError};
use crate::store::{NarReader, RepairFlag, StoreAdapter, StoreKind};

#[derive(Debug, Clone)]
struct Entry {
    info: ValidPathInfo,
    nar: Bytes,
}

#[derive(Debug)]
pub struct MemoryStore {
    name: String,
    store_dir: StoreDir,
    read_only: bool,
    paths: Mutex<BTreeMap<StorePath, Entry>>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            store_dir: StoreDir::default(),
            read_only: false,
            paths: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn with_store_dir(mut self, store_dir: StoreDir) -> Self {
        self.store_dir = store_dir;
        self
    }

    /// Reject every `add_to_store` with [`StoreError::ReadOnly`].
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<StorePath, Entry>> {
        // The map is never left half-updated, so a poisoned lock is still usable.
        self.paths.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `info.path` valid with content `nar`, bypassing all checks.
    pub fn insert(&self, info: ValidPathInfo, nar: impl Into<Bytes>) {
        let nar = nar.into();
        self.lock().insert(info.path.clone(), Entry { info, nar });
    }

    /// Replace the stored content of a valid path without touching its info.
    /// Returns false if the path is not valid.
    pub fn replace_nar(&self, path: &StorePath, nar: impl Into<Bytes>) -> bool {
        match self.lock().get_mut(path) {
            Some(entry) => {
                entry.nar = nar.into();
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, path: &StorePath) -> Option<ValidPathInfo> {
        self.lock().remove(path).map(|entry| entry.info)
    }

    pub fn path_info(&self, path: &StorePath) -> Option<ValidPathInfo> {
        self.lock().get(path).map(|entry| entry.info.clone())
    }

    pub fn nar(&self, path: &StorePath) -> Option<Bytes> {
        self.lock().get(path).map(|entry| entry.nar.clone())
    }

    pub fn paths(&self) -> BTreeSet<StorePath> {
        self.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl StoreAdapter for MemoryStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Memory
    }

    fn uri(&self) -> String {
        format!("memory://{}", self.name)
    }

    fn store_dir(&self) -> &StoreDir {
        &self.store_dir
    }

    async fn query_path_info(&self, path: &StorePath) -> Result<Option<ValidPathInfo>, StoreError> {
        Ok(self.path_info(path))
    }

    async fn query_valid_paths(
        &self,
        paths: &BTreeSet<StorePath>,
    ) -> Result<BTreeSet<StorePath>, StoreError> {
        let map = self.lock();
        Ok(paths
            .iter()
            .filter(|path| map.contains_key(*path))
            .cloned()
            .collect())
    }

    async fn nar_from_path(&self, path: &StorePath) -> Result<NarReader, StoreError> {
        let nar = self
            .nar(path)
            .ok_or_else(|| StoreError::NotFound(path.clone()))?;
        Ok(Box::pin(Cursor::new(nar)))
    }

    async fn add_to_store(
        &self,
        info: &ValidPathInfo,
        mut nar: NarReader,
        repair: RepairFlag,
    ) -> Result<(), StoreError> {
        if self.read_only {
            return Err(StoreError::ReadOnly { uri: self.uri() });
        }
        if repair == RepairFlag::NoRepair && self.lock().contains_key(&info.path) {
            debug!(path = %info.path, "already valid, skipping");
            return Ok(());
        }
        let mut content = Vec::new();
        nar.read_to_end(&mut content)
            .await
            .io_context(|| format!("receiving NAR of '{}'", info.path))?;
        self.insert(info.clone(), content);
        Ok(())
    }

    async fn query_nar_hash(&self, path: &StorePath) -> Result<(NarHash, u64), StoreError> {
        let nar = self
            .nar(path)
            .ok_or_else(|| StoreError::NotFound(path.clone()))?;
        Ok((NarHash::digest(&nar), nar.len() as u64))
    }
}
