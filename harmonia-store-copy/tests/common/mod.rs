// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Store fixtures shared by the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use harmonia_store_copy::{MemoryStore, NarReader, RepairFlag, StoreAdapter, StoreError, StoreKind};
use harmonia_store_core::{
    NarHash, SecretKey, StoreDir, StorePath, TrustedKeys, ValidPathInfo, base32,
};

/// A store path whose hash part is derived from `name`.
pub fn path(name: &str) -> StorePath {
    let digest = NarHash::digest(name);
    let hash = base32::encode_string(&digest.digest_bytes()[..20]);
    format!("{hash}-{name}").parse().unwrap()
}

pub fn paths(names: &[&str]) -> BTreeSet<StorePath> {
    names.iter().map(|name| path(name)).collect()
}

pub fn nar_of(name: &str) -> String {
    format!("nar contents of {name}")
}

pub fn signing_key() -> SecretKey {
    SecretKey::from_seed("cache.example.com-1", &[42; 32])
}

pub fn trusted_keys() -> TrustedKeys {
    [signing_key().to_public_key()].into_iter().collect()
}

/// Builder for a source store populated with a small reference graph.
pub struct SourceBuilder {
    store: MemoryStore,
}

impl SourceBuilder {
    pub fn new() -> Self {
        Self {
            store: MemoryStore::new("src"),
        }
    }

    fn info(name: &str, refs: &[&str]) -> ValidPathInfo {
        let nar = nar_of(name);
        let mut info = ValidPathInfo::new(path(name), NarHash::digest(&nar), nar.len() as u64);
        info.references = paths(refs);
        info
    }

    /// Add a path signed by [`signing_key`].
    pub fn signed(self, name: &str, refs: &[&str]) -> Self {
        let mut info = Self::info(name, refs);
        info.sign(&StoreDir::default(), &signing_key());
        self.store.insert(info, nar_of(name));
        self
    }

    pub fn unsigned(self, name: &str, refs: &[&str]) -> Self {
        self.store.insert(Self::info(name, refs), nar_of(name));
        self
    }

    /// Add a path built locally.
    pub fn ultimate(self, name: &str, refs: &[&str]) -> Self {
        let mut info = Self::info(name, refs);
        info.ultimate = true;
        self.store.insert(info, nar_of(name));
        self
    }

    pub fn build(self) -> Arc<MemoryStore> {
        Arc::new(self.store)
    }
}

/// Copy `names` from `src` into `dst` as if they had been copied before.
pub fn preload(src: &MemoryStore, dst: &MemoryStore, names: &[&str]) {
    for name in names {
        let p = path(name);
        let mut info = src.path_info(&p).unwrap();
        info.ultimate = false;
        dst.insert(info, src.nar(&p).unwrap());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Started,
    Finished,
}

/// Destination wrapper that records writes, can fail chosen paths and
/// delays each write so concurrency becomes observable.
pub struct RecordingStore {
    pub inner: MemoryStore,
    pub events: Mutex<Vec<(StorePath, Event)>>,
    pub fail_writes: HashSet<StorePath>,
    pub unavailable: bool,
    pub delay: Duration,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new("dst"),
            events: Mutex::new(Vec::new()),
            fail_writes: HashSet::new(),
            unavailable: false,
            delay: Duration::ZERO,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn failing(mut self, names: &[&str]) -> Self {
        self.fail_writes = names.iter().map(|name| path(name)).collect();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub fn events(&self) -> Vec<(StorePath, Event)> {
        self.events.lock().unwrap().clone()
    }

    pub fn position(&self, name: &str, event: Event) -> Option<usize> {
        let p = path(name);
        self.events()
            .iter()
            .position(|(path, e)| *path == p && *e == event)
    }

    pub fn written(&self) -> Vec<StorePath> {
        self.events()
            .into_iter()
            .filter(|(_, e)| *e == Event::Finished)
            .map(|(path, _)| path)
            .collect()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::unavailable(self.uri(), "connection refused"));
        }
        Ok(())
    }
}

impl StoreAdapter for RecordingStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Memory
    }

    fn uri(&self) -> String {
        "recording://dst".into()
    }

    fn store_dir(&self) -> &StoreDir {
        self.inner.store_dir()
    }

    async fn query_path_info(&self, path: &StorePath) -> Result<Option<ValidPathInfo>, StoreError> {
        self.check_available()?;
        self.inner.query_path_info(path).await
    }

    async fn query_valid_paths(
        &self,
        paths: &BTreeSet<StorePath>,
    ) -> Result<BTreeSet<StorePath>, StoreError> {
        self.check_available()?;
        self.inner.query_valid_paths(paths).await
    }

    async fn nar_from_path(&self, path: &StorePath) -> Result<NarReader, StoreError> {
        self.check_available()?;
        self.inner.nar_from_path(path).await
    }

    async fn add_to_store(
        &self,
        info: &ValidPathInfo,
        nar: NarReader,
        repair: RepairFlag,
    ) -> Result<(), StoreError> {
        self.events
            .lock()
            .unwrap()
            .push((info.path.clone(), Event::Started));
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;

        let result = if self.fail_writes.contains(&info.path) {
            Err(StoreError::io(
                format!("writing '{}'", info.path),
                std::io::Error::other("disk full"),
            ))
        } else {
            self.inner.add_to_store(info, nar, repair).await
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        if result.is_ok() {
            self.events
                .lock()
                .unwrap()
                .push((info.path.clone(), Event::Finished));
        }
        result
    }

    async fn query_nar_hash(&self, path: &StorePath) -> Result<(NarHash, u64), StoreError> {
        self.check_available()?;
        self.inner.query_nar_hash(path).await
    }
}
