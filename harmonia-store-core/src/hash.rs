// SPDX-FileCopyrightText: 2024 griff (original Nix.rs)
// SPDX-FileCopyrightText: 2026 Jörg Thalheim (Harmonia adaptation)
// SPDX-License-Identifier: EUPL-1.2 OR MIT

//! NAR hashes.
//!
//! Every store path carries the SHA-256 digest of its NAR serialisation.
//! Nix prints it in several encodings; all of them are accepted on input:
//!
//! - `sha256:<nix-base32>` (narinfo files, fingerprints)
//! - `sha256:<hex>` (the local store database)
//! - `sha256-<base64>` (SRI, JSON output)
//!
//! On output the nix-base32 form is canonical.

use std::fmt;
use std::str::FromStr;

use data_encoding::{BASE64, HEXLOWER_PERMISSIVE};
use sha2::{Digest as _, Sha256};
use thiserror::Error;

use crate::base32;

const ALGORITHM: &str = "sha256";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseHashError {
    #[error("hash '{0}' does not start with 'sha256:' or 'sha256-'")]
    UnsupportedAlgorithm(String),

    #[error("hash '{hash}' has wrong length {length} for hash type 'sha256'")]
    InvalidLength { hash: String, length: usize },

    #[error("hash '{hash}' is not correctly encoded: {reason}")]
    Decode { hash: String, reason: String },
}

/// SHA-256 digest of a NAR serialisation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NarHash([u8; NarHash::SIZE]);

impl NarHash {
    /// Digest size in bytes.
    pub const SIZE: usize = 32;

    pub const fn new(digest: [u8; Self::SIZE]) -> Self {
        NarHash(digest)
    }

    pub fn from_slice(digest: &[u8]) -> Result<Self, ParseHashError> {
        let digest: [u8; Self::SIZE] =
            digest.try_into().map_err(|_| ParseHashError::InvalidLength {
                hash: HEXLOWER_PERMISSIVE.encode(digest),
                length: digest.len(),
            })?;
        Ok(NarHash(digest))
    }

    /// Hash `data` in one shot.
    pub fn digest<D: AsRef<[u8]>>(data: D) -> Self {
        NarHash(Sha256::digest(data.as_ref()).into())
    }

    #[inline]
    pub fn digest_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The bare nix-base32 digest, as used in NAR file names.
    pub fn to_base32(&self) -> String {
        base32::encode_string(&self.0)
    }

    pub fn to_hex(&self) -> String {
        HEXLOWER_PERMISSIVE.encode(&self.0)
    }

    pub fn to_sri(&self) -> String {
        format!("{ALGORITHM}-{}", BASE64.encode(&self.0))
    }

    fn decode_digest(full: &str, digest: &str) -> Result<Self, ParseHashError> {
        let decode_err = |reason: String| ParseHashError::Decode {
            hash: full.to_string(),
            reason,
        };
        let bytes = match digest.len() {
            52 => base32::decode(digest.as_bytes()).map_err(|e| decode_err(e.to_string()))?,
            64 => HEXLOWER_PERMISSIVE
                .decode(digest.as_bytes())
                .map_err(|e| decode_err(e.to_string()))?,
            44 => BASE64
                .decode(digest.as_bytes())
                .map_err(|e| decode_err(e.to_string()))?,
            length => {
                return Err(ParseHashError::InvalidLength {
                    hash: full.to_string(),
                    length,
                });
            }
        };
        Self::from_slice(&bytes)
    }
}

impl FromStr for NarHash {
    type Err = ParseHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(digest) = s.strip_prefix("sha256:") {
            Self::decode_digest(s, digest)
        } else if let Some(digest) = s.strip_prefix("sha256-") {
            // SRI is always base64
            if digest.len() != 44 {
                return Err(ParseHashError::InvalidLength {
                    hash: s.to_string(),
                    length: digest.len(),
                });
            }
            Self::decode_digest(s, digest)
        } else {
            Err(ParseHashError::UnsupportedAlgorithm(s.to_string()))
        }
    }
}

impl fmt::Display for NarHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ALGORITHM}:{}", self.to_base32())
    }
}

impl fmt::Debug for NarHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NarHash({self})")
    }
}

/// Incremental NAR hash computation that also counts the bytes hashed.
#[derive(Clone, Default)]
pub struct NarHasher {
    ctx: Sha256,
    bytes: u64,
}

impl NarHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.ctx.update(data);
        self.bytes += data.len() as u64;
    }

    /// Number of bytes fed so far.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Returns the digest and the total number of bytes hashed.
    pub fn finish(self) -> (NarHash, u64) {
        (NarHash(self.ctx.finalize().into()), self.bytes)
    }
}

impl fmt::Debug for NarHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NarHasher")
            .field("bytes", &self.bytes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use rstest::rstest;

    use super::*;

    const ABC: NarHash = NarHash::new(hex!(
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    ));

    #[rstest]
    #[case::base32("sha256:1b8m03r63zqhnjf7l5wnldhh7c134ap5vpj0850ymkq1iyzicy5s")]
    #[case::hex("sha256:ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")]
    #[case::base64("sha256:ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0=")]
    #[case::sri("sha256-ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0=")]
    fn parse_all_encodings(#[case] input: &str) {
        assert_eq!(input.parse::<NarHash>().unwrap(), ABC);
    }

    #[test]
    fn digest_and_display() {
        let hash = NarHash::digest("abc");
        assert_eq!(hash, ABC);
        assert_eq!(
            hash.to_string(),
            "sha256:1b8m03r63zqhnjf7l5wnldhh7c134ap5vpj0850ymkq1iyzicy5s"
        );
        assert_eq!(
            hash.to_sri(),
            "sha256-ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0="
        );
    }

    #[rstest]
    #[case::algo("md5:1b8m03r63zqhnjf7l5wnldhh7c134ap5vpj0850ymkq1iyzicy5s")]
    #[case::short("sha256:1b8m03r63zqhnjf7l5wnldhh7c134ap5vpj0850ymkq1iyzicy5")]
    #[case::symbol("sha256:1b8m03r63zqhnjf7l5wnldhh7c134ap5vpj0850ymkq1iyzicyee")]
    fn parse_rejects(#[case] input: &str) {
        assert!(input.parse::<NarHash>().is_err(), "{input} should not parse");
    }

    #[test]
    fn incremental_matches_one_shot() {
        let mut hasher = NarHasher::new();
        hasher.update(b"a");
        hasher.update(b"bc");
        assert_eq!(hasher.bytes(), 3);
        assert_eq!(hasher.finish(), (ABC, 3));
    }
}
