// SPDX-FileCopyrightText: 2024 griff (original Nix.rs)
// SPDX-FileCopyrightText: 2026 Jörg Thalheim (Harmonia adaptation)
// SPDX-License-Identifier: EUPL-1.2 OR MIT

//! Store paths and the store directory they live in.
//!
//! A store path is identified by its base name `<hash>-<name>`, where the
//! hash part is 32 nix-base32 characters (a 160 bit digest). The store
//! directory is a separate value: the same `StorePath` is rendered as
//! `/nix/store/<hash>-<name>` by the default [`StoreDir`] and differently by
//! stores with a custom prefix.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::base32;

/// Length of the nix-base32 encoded hash part.
pub const STORE_PATH_HASH_ENCODED_LEN: usize = base32::encode_len(20);

/// Maximum length of the name component.
pub const MAX_NAME_LEN: usize = 211;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorePathError {
    #[error("store path '{0}' is too short")]
    TooShort(String),

    #[error("store path '{path}' contains illegal base-32 character '{ch}'")]
    InvalidHashChar { path: String, ch: char },

    #[error("store path '{0}' has no '-' after the hash part")]
    MissingDash(String),

    #[error("store path '{0}' has an empty name")]
    EmptyName(String),

    #[error("store path '{path}' has a name longer than {MAX_NAME_LEN} characters")]
    NameTooLong { path: String },

    #[error("store path '{path}' contains illegal character '{ch}'")]
    InvalidNameChar { path: String, ch: char },

    #[error("store path '{0}' starts with illegal character '.'")]
    DotName(String),

    #[error("path '{path}' is not in the Nix store '{store_dir}'")]
    NotInStore { path: String, store_dir: String },

    #[error("store directory '{0}' is not an absolute path")]
    RelativeStoreDir(String),
}

fn is_name_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, b'+' | b'-' | b'.' | b'_' | b'?' | b'=')
}

/// A store path base name, `<hash>-<name>`.
///
/// Ordering, equality and hashing are by the base name, so they agree with
/// the hash part first and the name second.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StorePath(String);

impl StorePath {
    /// Parse a base name such as `7h7qgvs4kgzsn8a6rb273saxyqh4jxlz-hello-2.12.1`.
    pub fn from_base_path(base: &str) -> Result<Self, StorePathError> {
        let bytes = base.as_bytes();
        if bytes.len() < STORE_PATH_HASH_ENCODED_LEN + 1 {
            return Err(StorePathError::TooShort(base.to_string()));
        }
        let (hash, rest) = bytes.split_at(STORE_PATH_HASH_ENCODED_LEN);
        if let Some(&c) = hash.iter().find(|&&c| !base32::is_valid_char(c)) {
            return Err(StorePathError::InvalidHashChar {
                path: base.to_string(),
                ch: c as char,
            });
        }
        if rest[0] != b'-' {
            return Err(StorePathError::MissingDash(base.to_string()));
        }
        let name = &rest[1..];
        match name.first() {
            None => return Err(StorePathError::EmptyName(base.to_string())),
            Some(b'.') => return Err(StorePathError::DotName(base.to_string())),
            Some(_) => {}
        }
        if name.len() > MAX_NAME_LEN {
            return Err(StorePathError::NameTooLong {
                path: base.to_string(),
            });
        }
        if let Some(&c) = name.iter().find(|&&c| !is_name_char(c)) {
            return Err(StorePathError::InvalidNameChar {
                path: base.to_string(),
                ch: c as char,
            });
        }
        Ok(StorePath(base.to_string()))
    }

    /// The 32 character nix-base32 hash part.
    pub fn hash_part(&self) -> &str {
        &self.0[..STORE_PATH_HASH_ENCODED_LEN]
    }

    pub fn name(&self) -> &str {
        &self.0[STORE_PATH_HASH_ENCODED_LEN + 1..]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for StorePath {
    type Err = StorePathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_base_path(s)
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorePath({})", self.0)
    }
}

/// The directory a store keeps its paths in, `/nix/store` by default.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StoreDir(String);

impl StoreDir {
    pub const DEFAULT: &'static str = "/nix/store";

    /// Accepts an absolute directory; trailing slashes are dropped.
    pub fn new(dir: &str) -> Result<Self, StorePathError> {
        if !dir.starts_with('/') {
            return Err(StorePathError::RelativeStoreDir(dir.to_string()));
        }
        let trimmed = dir.trim_end_matches('/');
        Ok(StoreDir(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Render `path` as an absolute path inside this store.
    pub fn display_path(&self, path: &StorePath) -> String {
        format!("{}/{}", self.0, path)
    }

    /// Parse an absolute store path `<store-dir>/<hash>-<name>`.
    ///
    /// Paths below a store path (`.../bin/hello`) are rejected; see
    /// [`StoreDir::to_store_path`] for those.
    pub fn parse_path(&self, full: &str) -> Result<StorePath, StorePathError> {
        let base = self.strip_store_dir(full)?;
        if base.contains('/') {
            return Err(self.not_in_store(full));
        }
        StorePath::from_base_path(base)
    }

    /// Map any path inside the store to the store path containing it, so
    /// `/nix/store/<hash>-hello/bin/hello` yields `<hash>-hello`.
    pub fn to_store_path(&self, full: &str) -> Result<StorePath, StorePathError> {
        let base = self.strip_store_dir(full)?;
        let base = base.split('/').next().unwrap_or(base);
        StorePath::from_base_path(base)
    }

    fn strip_store_dir<'a>(&self, full: &'a str) -> Result<&'a str, StorePathError> {
        full.strip_prefix(self.0.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|base| !base.is_empty())
            .ok_or_else(|| self.not_in_store(full))
    }

    fn not_in_store(&self, full: &str) -> StorePathError {
        StorePathError::NotInStore {
            path: full.to_string(),
            store_dir: self.0.clone(),
        }
    }
}

impl Default for StoreDir {
    fn default() -> Self {
        StoreDir(Self::DEFAULT.to_string())
    }
}

impl fmt::Display for StoreDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
