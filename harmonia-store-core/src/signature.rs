// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: EUPL-1.2 OR MIT

//! Ed25519 keys and detached signatures over path fingerprints.
//!
//! All three types share the `<key-name>:<base64>` text form that Nix uses in
//! `nix.conf` (`trusted-public-keys`), secret key files and the `Sig:` lines
//! of narinfo files.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use data_encoding::BASE64;
use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("'{0}' does not contain a ':' separator")]
    MissingSeparator(String),

    #[error("'{0}' has an empty key name")]
    EmptyKeyName(String),

    #[error("failed to decode base64 in '{input}': {source}")]
    Base64 {
        input: String,
        #[source]
        source: data_encoding::DecodeError,
    },

    #[error("invalid {what} length for key '{name}': expected {expected} bytes, got {actual}")]
    InvalidLength {
        what: &'static str,
        name: String,
        expected: &'static str,
        actual: usize,
    },

    #[error("invalid ed25519 key '{name}': {reason}")]
    InvalidKey { name: String, reason: String },
}

/// Split `name:base64` and decode the payload.
fn split_named(input: &str) -> Result<(&str, Vec<u8>), SignatureError> {
    let input = input.trim();
    let (name, payload) = input
        .split_once(':')
        .ok_or_else(|| SignatureError::MissingSeparator(input.to_string()))?;
    if name.is_empty() {
        return Err(SignatureError::EmptyKeyName(input.to_string()));
    }
    let bytes = BASE64
        .decode(payload.as_bytes())
        .map_err(|source| SignatureError::Base64 {
            input: input.to_string(),
            source,
        })?;
    Ok((name, bytes))
}

/// A signature by a named key, as found in narinfo `Sig:` lines.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct NarSignature {
    key_name: String,
    sig: [u8; Signature::BYTE_SIZE],
}

impl NarSignature {
    pub fn new(key_name: impl Into<String>, sig: Signature) -> Self {
        Self {
            key_name: key_name.into(),
            sig: sig.to_bytes(),
        }
    }

    /// The name of the key that produced this signature (e.g. `cache.nixos.org-1`).
    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    pub fn signature(&self) -> Signature {
        Signature::from_bytes(&self.sig)
    }
}

impl FromStr for NarSignature {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, bytes) = split_named(s)?;
        let sig: [u8; Signature::BYTE_SIZE] =
            bytes.as_slice().try_into().map_err(|_| SignatureError::InvalidLength {
                what: "signature",
                name: name.to_string(),
                expected: "64",
                actual: bytes.len(),
            })?;
        Ok(Self {
            key_name: name.to_string(),
            sig,
        })
    }
}

impl fmt::Display for NarSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.key_name, BASE64.encode(&self.sig))
    }
}

impl fmt::Debug for NarSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NarSignature({self})")
    }
}

// Sets of signatures are kept in text order so narinfo output is stable.
impl PartialOrd for NarSignature {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NarSignature {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (&self.key_name, &self.sig).cmp(&(&other.key_name, &other.sig))
    }
}

/// A named ed25519 verifying key.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    name: String,
    key: VerifyingKey,
}

impl PublicKey {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True if `sig` was made by this key over `msg`. The key name must match.
    pub fn verify(&self, msg: &[u8], sig: &NarSignature) -> bool {
        sig.key_name == self.name && self.key.verify(msg, &sig.signature()).is_ok()
    }
}

impl FromStr for PublicKey {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, bytes) = split_named(s)?;
        let raw: [u8; 32] =
            bytes.as_slice().try_into().map_err(|_| SignatureError::InvalidLength {
                what: "public key",
                name: name.to_string(),
                expected: "32",
                actual: bytes.len(),
            })?;
        let key = VerifyingKey::from_bytes(&raw).map_err(|e| SignatureError::InvalidKey {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            name: name.to_string(),
            key,
        })
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, BASE64.encode(self.key.as_bytes()))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({self})")
    }
}

/// A named ed25519 signing key.
///
/// Accepts both the 32 byte seed form and the 64 byte keypair form written
/// by `nix-store --generate-binary-cache-key`.
#[derive(Clone)]
pub struct SecretKey {
    name: String,
    key: SigningKey,
}

impl SecretKey {
    pub fn from_seed(name: impl Into<String>, seed: &[u8; 32]) -> Self {
        Self {
            name: name.into(),
            key: SigningKey::from_bytes(seed),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn to_public_key(&self) -> PublicKey {
        PublicKey {
            name: self.name.clone(),
            key: self.key.verifying_key(),
        }
    }

    pub fn sign(&self, msg: &[u8]) -> NarSignature {
        NarSignature::new(self.name.clone(), self.key.sign(msg))
    }
}

impl FromStr for SecretKey {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, bytes) = split_named(s)?;
        let key = match bytes.len() {
            32 => {
                let mut seed = [0u8; 32];
                seed.copy_from_slice(&bytes);
                SigningKey::from_bytes(&seed)
            }
            64 => {
                let mut keypair = [0u8; 64];
                keypair.copy_from_slice(&bytes);
                SigningKey::from_keypair_bytes(&keypair).map_err(|e| {
                    SignatureError::InvalidKey {
                        name: name.to_string(),
                        reason: e.to_string(),
                    }
                })?
            }
            actual => {
                return Err(SignatureError::InvalidLength {
                    what: "secret key",
                    name: name.to_string(),
                    expected: "32 or 64",
                    actual,
                });
            }
        };
        Ok(Self {
            name: name.to_string(),
            key,
        })
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// The set of public keys whose signatures make a path trusted.
///
/// Built once from configuration and shared read-only. A later key with the
/// same name replaces an earlier one.
#[derive(Clone, Debug, Default)]
pub struct TrustedKeys {
    keys: BTreeMap<String, PublicKey>,
}

impl TrustedKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: PublicKey) {
        self.keys.insert(key.name.clone(), key);
    }

    pub fn get(&self, name: &str) -> Option<&PublicKey> {
        self.keys.get(name)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Parse every entry in `nix.conf` text form.
    pub fn parse_all<I, S>(entries: I) -> Result<Self, SignatureError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        entries
            .into_iter()
            .map(|entry| entry.as_ref().parse::<PublicKey>())
            .collect()
    }

    /// True if `sig` is by a trusted key and verifies over `msg`.
    pub fn verify(&self, msg: &[u8], sig: &NarSignature) -> bool {
        self.get(sig.key_name())
            .is_some_and(|key| key.verify(msg, sig))
    }
}

impl FromIterator<PublicKey> for TrustedKeys {
    fn from_iter<T: IntoIterator<Item = PublicKey>>(iter: T) -> Self {
        let mut keys = TrustedKeys::new();
        for key in iter {
            keys.insert(key);
        }
        keys
    }
}
