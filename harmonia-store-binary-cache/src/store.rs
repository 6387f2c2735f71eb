// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use futures::{StreamExt as _, TryStreamExt as _, stream};
use harmonia_store_copy::{
    IoContext as _, NarReader, RepairFlag, StoreAdapter, StoreError, StoreKind,
};
use harmonia_store_core::{NarHasher, StoreDir, StorePath, ValidPathInfo};
use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tracing::{debug, info, warn};

use crate::cacheinfo::CacheInfo;
use crate::narinfo::{NarInfo, nar_url};

const CACHE_INFO_FILE: &str = "nix-cache-info";
const COPY_BUFFER_SIZE: usize = 64 * 1024;
/// Narinfo lookups in flight during a `query_valid_paths`.
const QUERY_CONCURRENCY: usize = 16;

/// Settings for a `file://` binary cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryCacheConfig {
    pub root: PathBuf,
    pub read_only: bool,
    /// Overrides the priority recorded in `nix-cache-info`.
    pub priority: Option<u64>,
    pub store_dir: StoreDir,
}

impl BinaryCacheConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            read_only: false,
            priority: None,
            store_dir: StoreDir::default(),
        }
    }

    /// Parse `file:///path/to/cache?read-only=true&priority=10`.
    pub fn from_uri(uri: &str, store_dir: StoreDir) -> Result<Self, StoreError> {
        let rest = uri
            .strip_prefix("file://")
            .ok_or_else(|| StoreError::unavailable(uri, "not a file:// URI"))?;
        let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
        if !path.starts_with('/') {
            return Err(StoreError::unavailable(uri, "binary cache path must be absolute"));
        }

        let mut config = Self::new(path);
        config.store_dir = store_dir;
        for param in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = param.split_once('=').unwrap_or((param, ""));
            let invalid =
                || StoreError::unavailable(uri, format!("invalid value '{value}' for '{key}'"));
            match key {
                "read-only" => {
                    config.read_only = match value {
                        "true" | "1" | "" => true,
                        "false" | "0" => false,
                        _ => return Err(invalid()),
                    }
                }
                "priority" => config.priority = Some(value.parse().map_err(|_| invalid())?),
                _ => warn!(uri, setting = key, "unknown store setting ignored"),
            }
        }
        Ok(config)
    }
}

/// A binary cache in a local directory.
///
/// Layout: `nix-cache-info`, one `<hash-part>.narinfo` per path and the
/// uncompressed NARs under `nar/`. A path is valid once its narinfo exists,
/// so the NAR is always put in place first.
#[derive(Debug)]
pub struct BinaryCacheStore {
    config: BinaryCacheConfig,
    uri: String,
    cache_info: CacheInfo,
}

impl BinaryCacheStore {
    /// Open the cache, creating it unless it is read-only.
    pub async fn open(config: BinaryCacheConfig) -> Result<Self, StoreError> {
        let uri = format!("file://{}", config.root.display());
        let info_path = config.root.join(CACHE_INFO_FILE);

        let cache_info = match tokio::fs::read_to_string(&info_path).await {
            Ok(text) => CacheInfo::parse(&text).ok_or_else(|| {
                StoreError::unavailable(&uri, format!("{} has no StoreDir", info_path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if config.read_only {
                    return Err(StoreError::unavailable(
                        &uri,
                        format!("{} does not exist", info_path.display()),
                    ));
                }
                let cache_info = CacheInfo::new(
                    config.store_dir.as_str(),
                    config.priority.unwrap_or(crate::cacheinfo::DEFAULT_PRIORITY),
                );
                tokio::fs::create_dir_all(config.root.join("nar"))
                    .await
                    .io_context(|| format!("creating binary cache at {}", config.root.display()))?;
                tokio::fs::write(&info_path, cache_info.to_text())
                    .await
                    .io_context(|| format!("writing {}", info_path.display()))?;
                info!(%uri, "created binary cache");
                cache_info
            }
            Err(e) => {
                return Err(StoreError::unavailable(
                    &uri,
                    format!("cannot read {}: {e}", info_path.display()),
                ));
            }
        };

        if cache_info.store_dir != config.store_dir.as_str() {
            return Err(StoreError::unavailable(
                &uri,
                format!(
                    "binary cache is for store directory '{}', not '{}'",
                    cache_info.store_dir, config.store_dir
                ),
            ));
        }
        if !config.read_only {
            tokio::fs::create_dir_all(config.root.join("nar"))
                .await
                .io_context(|| format!("creating {}/nar", config.root.display()))?;
        }

        Ok(Self {
            config,
            uri,
            cache_info,
        })
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    pub fn is_read_only(&self) -> bool {
        self.config.read_only
    }

    pub fn priority(&self) -> u64 {
        self.config.priority.unwrap_or(self.cache_info.priority)
    }

    fn narinfo_path(&self, path: &StorePath) -> PathBuf {
        self.config.root.join(format!("{}.narinfo", path.hash_part()))
    }

    async fn read_narinfo(&self, path: &StorePath) -> Result<Option<NarInfo>, StoreError> {
        let file = self.narinfo_path(path);
        let text = match tokio::fs::read_to_string(&file).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(format!("reading {}", file.display()), e)),
        };
        let narinfo = NarInfo::parse(&text, &self.config.store_dir)
            .map_err(|e| StoreError::InvalidData(format!("{}: {e}", file.display())))?;
        // Same hash part, different name.
        if narinfo.store_path != *path {
            return Ok(None);
        }
        Ok(Some(narinfo))
    }

    /// Resolve a narinfo `URL` inside the cache root.
    fn nar_file(&self, narinfo: &NarInfo) -> Result<PathBuf, StoreError> {
        let url = narinfo.url.split('?').next().unwrap_or_default();
        let relative = Path::new(url);
        if url.is_empty() || !relative.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(StoreError::InvalidData(format!(
                "narinfo of '{}' has unsupported URL '{}'",
                narinfo.store_path, narinfo.url
            )));
        }
        Ok(self.config.root.join(relative))
    }

    async fn write_nar(
        &self,
        info: &ValidPathInfo,
        mut nar: NarReader,
    ) -> Result<tempfile::TempPath, StoreError> {
        let nar_dir = self.config.root.join("nar");
        let temp = tempfile::Builder::new()
            .prefix(".tmp-nar-")
            .tempfile_in(&nar_dir)
            .io_context(|| format!("creating temporary file in {}", nar_dir.display()))?;
        let (file, temp_path) = temp.into_parts();
        let mut file = tokio::fs::File::from_std(file);

        let mut hasher = NarHasher::new();
        let mut buf = vec![0u8; COPY_BUFFER_SIZE];
        loop {
            let n = nar
                .read(&mut buf)
                .await
                .io_context(|| format!("receiving NAR of '{}'", info.path))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            file.write_all(&buf[..n])
                .await
                .io_context(|| format!("writing {}", temp_path.display()))?;
        }
        file.sync_all()
            .await
            .io_context(|| format!("syncing {}", temp_path.display()))?;

        let (actual_hash, actual_size) = hasher.finish();
        if actual_size != info.nar_size {
            return Err(StoreError::NarSizeMismatch {
                path: info.path.clone(),
                expected: info.nar_size,
                actual: actual_size,
            });
        }
        if actual_hash != info.nar_hash {
            return Err(StoreError::NarHashMismatch {
                path: info.path.clone(),
                expected: info.nar_hash,
                actual: actual_hash,
            });
        }
        Ok(temp_path)
    }
}

impl StoreAdapter for BinaryCacheStore {
    fn kind(&self) -> StoreKind {
        StoreKind::BinaryCache
    }

    fn uri(&self) -> String {
        self.uri.clone()
    }

    fn store_dir(&self) -> &StoreDir {
        &self.config.store_dir
    }

    async fn query_path_info(&self, path: &StorePath) -> Result<Option<ValidPathInfo>, StoreError> {
        Ok(self
            .read_narinfo(path)
            .await?
            .map(|narinfo| narinfo.to_path_info()))
    }

    async fn query_valid_paths(
        &self,
        paths: &BTreeSet<StorePath>,
    ) -> Result<BTreeSet<StorePath>, StoreError> {
        let found: Vec<Option<&StorePath>> = stream::iter(paths)
            .map(|path| async move { Ok(self.read_narinfo(path).await?.map(|_| path)) })
            .buffer_unordered(QUERY_CONCURRENCY)
            .boxed()
            .try_collect()
            .await?;
        Ok(found.into_iter().flatten().cloned().collect())
    }

    async fn nar_from_path(&self, path: &StorePath) -> Result<NarReader, StoreError> {
        let narinfo = self
            .read_narinfo(path)
            .await?
            .ok_or_else(|| StoreError::NotFound(path.clone()))?;
        if narinfo.compression != "none" {
            return Err(StoreError::InvalidData(format!(
                "'{path}' is stored with unsupported compression '{}'",
                narinfo.compression
            )));
        }
        let file = self.nar_file(&narinfo)?;
        let nar = tokio::fs::File::open(&file)
            .await
            .io_context(|| format!("opening {}", file.display()))?;
        Ok(Box::pin(nar))
    }

    async fn add_to_store(
        &self,
        info: &ValidPathInfo,
        nar: NarReader,
        repair: RepairFlag,
    ) -> Result<(), StoreError> {
        if self.config.read_only {
            return Err(StoreError::ReadOnly {
                uri: self.uri.clone(),
            });
        }
        if repair == RepairFlag::NoRepair && self.read_narinfo(&info.path).await?.is_some() {
            debug!(path = %info.path, "already valid, skipping");
            return Ok(());
        }

        let temp_nar = self.write_nar(info, nar).await?;
        let narinfo = NarInfo::from_path_info(info);
        let nar_path = self.config.root.join(nar_url(&info.nar_hash));
        temp_nar
            .persist(&nar_path)
            .map_err(|e| StoreError::io(format!("moving NAR to {}", nar_path.display()), e.error))?;

        // The narinfo goes last: it is what makes the path valid.
        let narinfo_path = self.narinfo_path(&info.path);
        let temp_narinfo = tempfile::Builder::new()
            .prefix(".tmp-narinfo-")
            .tempfile_in(&self.config.root)
            .io_context(|| format!("creating temporary file in {}", self.config.root.display()))?;
        tokio::fs::write(temp_narinfo.path(), narinfo.to_text(&self.config.store_dir))
            .await
            .io_context(|| format!("writing {}", temp_narinfo.path().display()))?;
        temp_narinfo.persist(&narinfo_path).map_err(|e| {
            StoreError::io(format!("moving narinfo to {}", narinfo_path.display()), e.error)
        })?;

        debug!(path = %info.path, nar_size = info.nar_size, "added to binary cache");
        Ok(())
    }
}
