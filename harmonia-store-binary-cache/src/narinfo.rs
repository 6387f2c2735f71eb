// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! The `.narinfo` text format.
//!
//! ```text
//! StorePath: /nix/store/<hash>-<name>
//! URL: nar/<nar-hash>.nar
//! Compression: none
//! FileHash: sha256:<nix-base32>
//! FileSize: <bytes>
//! NarHash: sha256:<nix-base32>
//! NarSize: <bytes>
//! References: <base name> <base name> ...
//! Deriver: <base name>
//! Sig: <key-name>:<base64>
//! CA: <content address>
//! ```

use std::collections::BTreeSet;

use harmonia_store_core::{
    NarHash, NarSignature, ParseHashError, StoreDir, StorePath, StorePathError, ValidPathInfo,
};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum NarInfoError {
    #[error("line {line}: expected 'Key: value', got '{content}'")]
    MalformedLine { line: usize, content: String },

    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("invalid store path: {0}")]
    StorePath(#[from] StorePathError),

    #[error("invalid hash: {0}")]
    Hash(#[from] ParseHashError),
}

/// Parsed contents of a `.narinfo` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarInfo {
    pub store_path: StorePath,
    /// Location of the NAR file, relative to the cache root.
    pub url: String,
    pub compression: String,
    pub file_hash: Option<NarHash>,
    pub file_size: Option<u64>,
    pub nar_hash: NarHash,
    pub nar_size: u64,
    pub references: BTreeSet<StorePath>,
    pub deriver: Option<StorePath>,
    pub sigs: BTreeSet<NarSignature>,
    pub ca: Option<String>,
}

/// Relative location of an uncompressed NAR with hash `nar_hash`.
pub fn nar_url(nar_hash: &NarHash) -> String {
    format!("nar/{}.nar", nar_hash.to_base32())
}

impl NarInfo {
    /// Describe `info` stored as an uncompressed NAR.
    pub fn from_path_info(info: &ValidPathInfo) -> Self {
        Self {
            store_path: info.path.clone(),
            url: nar_url(&info.nar_hash),
            compression: "none".to_string(),
            file_hash: Some(info.nar_hash),
            file_size: Some(info.nar_size),
            nar_hash: info.nar_hash,
            nar_size: info.nar_size,
            references: info.references.clone(),
            deriver: info.deriver.clone(),
            sigs: info.signatures.clone(),
            ca: info.ca.clone(),
        }
    }

    pub fn to_path_info(&self) -> ValidPathInfo {
        ValidPathInfo {
            path: self.store_path.clone(),
            deriver: self.deriver.clone(),
            nar_hash: self.nar_hash,
            nar_size: self.nar_size,
            references: self.references.clone(),
            signatures: self.sigs.clone(),
            // Nothing fetched from a binary cache was built by this store.
            ultimate: false,
            ca: self.ca.clone(),
        }
    }

    pub fn parse(text: &str, store_dir: &StoreDir) -> Result<Self, NarInfoError> {
        let mut store_path = None;
        let mut url = None;
        let mut compression = None;
        let mut file_hash = None;
        let mut file_size = None;
        let mut nar_hash = None;
        let mut nar_size = None;
        let mut references = BTreeSet::new();
        let mut deriver = None;
        let mut sigs = BTreeSet::new();
        let mut ca = None;

        for (idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let (key, value) =
                line.split_once(": ")
                    .ok_or_else(|| NarInfoError::MalformedLine {
                        line: idx + 1,
                        content: line.to_string(),
                    })
                    .or_else(|err| {
                        // `References:` with no references has no trailing space.
                        line.strip_suffix(':').map(|key| (key, "")).ok_or(err)
                    })?;
            match key {
                "StorePath" => store_path = Some(store_dir.parse_path(value)?),
                "URL" => url = Some(value.to_string()),
                "Compression" => compression = Some(value.to_string()),
                "FileHash" => file_hash = Some(value.parse::<NarHash>()?),
                "FileSize" => file_size = Some(parse_size("FileSize", value)?),
                "NarHash" => nar_hash = Some(value.parse::<NarHash>()?),
                "NarSize" => nar_size = Some(parse_size("NarSize", value)?),
                "References" => {
                    for reference in value.split_whitespace() {
                        references.insert(StorePath::from_base_path(reference)?);
                    }
                }
                "Deriver" if value != "unknown-deriver" => {
                    deriver = Some(StorePath::from_base_path(value)?);
                }
                // An unparsable signature is one that does not verify.
                "Sig" => match value.parse::<NarSignature>() {
                    Ok(sig) => {
                        sigs.insert(sig);
                    }
                    Err(err) => warn!(line = idx + 1, %err, "ignoring malformed signature"),
                },
                "CA" if !value.is_empty() => ca = Some(value.to_string()),
                _ => {}
            }
        }

        Ok(Self {
            store_path: store_path.ok_or(NarInfoError::MissingField("StorePath"))?,
            url: url.ok_or(NarInfoError::MissingField("URL"))?,
            // Nix defaults to bzip2 for narinfos without the field.
            compression: compression.unwrap_or_else(|| "bzip2".to_string()),
            file_hash,
            file_size,
            nar_hash: nar_hash.ok_or(NarInfoError::MissingField("NarHash"))?,
            nar_size: nar_size.ok_or(NarInfoError::MissingField("NarSize"))?,
            references,
            deriver,
            sigs,
            ca,
        })
    }

    pub fn to_text(&self, store_dir: &StoreDir) -> String {
        let mut out = String::new();
        let mut line = |key: &str, value: &str| {
            out.push_str(key);
            out.push_str(": ");
            out.push_str(value);
            out.push('\n');
        };

        line("StorePath", &store_dir.display_path(&self.store_path));
        line("URL", &self.url);
        line("Compression", &self.compression);
        if let Some(file_hash) = &self.file_hash {
            line("FileHash", &file_hash.to_string());
        }
        if let Some(file_size) = self.file_size {
            line("FileSize", &file_size.to_string());
        }
        line("NarHash", &self.nar_hash.to_string());
        line("NarSize", &self.nar_size.to_string());
        if !self.references.is_empty() {
            let refs: Vec<&str> = self.references.iter().map(StorePath::as_str).collect();
            line("References", &refs.join(" "));
        }
        if let Some(deriver) = &self.deriver {
            line("Deriver", deriver.as_str());
        }
        for sig in &self.sigs {
            line("Sig", &sig.to_string());
        }
        if let Some(ca) = &self.ca {
            line("CA", ca);
        }
        out
    }
}

fn parse_size(field: &'static str, value: &str) -> Result<u64, NarInfoError> {
    value.parse().map_err(|e: std::num::ParseIntError| NarInfoError::InvalidField {
        field,
        reason: e.to_string(),
    })
}
