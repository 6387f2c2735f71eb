// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: EUPL-1.2 OR MIT

use std::collections::BTreeSet;

use crate::fingerprint::fingerprint_path;
use crate::hash::NarHash;
use crate::signature::{NarSignature, SecretKey, TrustedKeys};
use crate::store_path::{StoreDir, StorePath};

/// Metadata a store holds about one valid path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidPathInfo {
    pub path: StorePath,
    pub deriver: Option<StorePath>,
    pub nar_hash: NarHash,
    pub nar_size: u64,
    /// May contain `path` itself.
    pub references: BTreeSet<StorePath>,
    pub signatures: BTreeSet<NarSignature>,
    /// The path was built or added locally, so it is trusted without a
    /// signature.
    pub ultimate: bool,
    /// Content address, kept verbatim (e.g. `fixed:r:sha256:...`).
    pub ca: Option<String>,
}

impl ValidPathInfo {
    pub fn new(path: StorePath, nar_hash: NarHash, nar_size: u64) -> Self {
        Self {
            path,
            deriver: None,
            nar_hash,
            nar_size,
            references: BTreeSet::new(),
            signatures: BTreeSet::new(),
            ultimate: false,
            ca: None,
        }
    }

    pub fn fingerprint(&self, store_dir: &StoreDir) -> String {
        fingerprint_path(
            store_dir,
            &self.path,
            &self.nar_hash,
            self.nar_size,
            &self.references,
        )
    }

    /// References other than the path itself.
    pub fn references_excluding_self(&self) -> impl Iterator<Item = &StorePath> {
        self.references.iter().filter(move |r| **r != self.path)
    }

    pub fn sign(&mut self, store_dir: &StoreDir, key: &SecretKey) {
        let sig = key.sign(self.fingerprint(store_dir).as_bytes());
        self.signatures.insert(sig);
    }

    /// Number of signatures on this path by keys in `trusted`.
    pub fn count_valid_signatures(&self, store_dir: &StoreDir, trusted: &TrustedKeys) -> usize {
        if self.signatures.is_empty() {
            return 0;
        }
        let fingerprint = self.fingerprint(store_dir);
        self.signatures
            .iter()
            .filter(|sig| trusted.verify(fingerprint.as_bytes(), sig))
            .count()
    }
}
