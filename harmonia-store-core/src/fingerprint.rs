// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: EUPL-1.2 OR MIT

use std::collections::BTreeSet;

use crate::hash::NarHash;
use crate::store_path::{StoreDir, StorePath};

/// Generate the fingerprint that binary cache signatures are made over.
///
/// The fingerprint format is:
/// `1;<store-path>;<nar-hash>;<nar-size>;<comma-separated-references>`
///
/// All paths are rendered in full (with `store_dir`), the NAR hash in its
/// `sha256:<nix-base32>` form, and references in sorted order.
pub fn fingerprint_path(
    store_dir: &StoreDir,
    store_path: &StorePath,
    nar_hash: &NarHash,
    nar_size: u64,
    references: &BTreeSet<StorePath>,
) -> String {
    let refs = references
        .iter()
        .map(|r| store_dir.display_path(r))
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "1;{};{nar_hash};{nar_size};{refs}",
        store_dir.display_path(store_path)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(base: &str) -> StorePath {
        base.parse().unwrap()
    }

    #[test]
    fn fingerprint_basic() {
        let references = BTreeSet::from([
            path("0jqd0rlxzra1rs38rdxl43yh6rxchgc6-curl-7.82.0"),
            path("5dq2jj6d7k197p6fzqn8l5n0jfmhxmcg-glibc-2.33-59"),
        ]);
        let nar_hash = "sha256:1b4sb93wp679q4zx9k1ignby1yna3z7c4c2ri3wphylbc2dwsys0"
            .parse()
            .unwrap();

        let fingerprint = fingerprint_path(
            &StoreDir::default(),
            &path("syd87l2rxw8cbsxmxl853h0r6pdwhwjr-curl-7.82.0-bin"),
            &nar_hash,
            196040,
            &references,
        );
        assert_eq!(
            fingerprint,
            "1;/nix/store/syd87l2rxw8cbsxmxl853h0r6pdwhwjr-curl-7.82.0-bin;sha256:1b4sb93wp679q4zx9k1ignby1yna3z7c4c2ri3wphylbc2dwsys0;196040;/nix/store/0jqd0rlxzra1rs38rdxl43yh6rxchgc6-curl-7.82.0,/nix/store/5dq2jj6d7k197p6fzqn8l5n0jfmhxmcg-glibc-2.33-59"
        );
    }

    #[test]
    fn fingerprint_no_references() {
        let nar_hash = "sha256:1mkvday29m2qxg1fnbv8xh9s6151bh8a2xzhh0k86j7lqhyfwibh"
            .parse()
            .unwrap();
        let fingerprint = fingerprint_path(
            &StoreDir::default(),
            &path("26xbg1ndr7hbcncrlf9nhx5is2b25d13-hello-2.12.1"),
            &nar_hash,
            226560,
            &BTreeSet::new(),
        );
        assert_eq!(
            fingerprint,
            "1;/nix/store/26xbg1ndr7hbcncrlf9nhx5is2b25d13-hello-2.12.1;sha256:1mkvday29m2qxg1fnbv8xh9s6151bh8a2xzhh0k86j7lqhyfwibh;226560;"
        );
    }

    #[test]
    fn fingerprint_custom_store_dir() {
        let store_dir = StoreDir::new("/gnu/store").unwrap();
        let fingerprint = fingerprint_path(
            &store_dir,
            &path("26xbg1ndr7hbcncrlf9nhx5is2b25d13-hello-2.12.1"),
            &NarHash::digest(b""),
            0,
            &BTreeSet::from([path("sl141d1g77wvhr050ah87lcyz2czdxa3-glibc-2.40-36")]),
        );
        assert!(
            fingerprint.starts_with("1;/gnu/store/26xbg1ndr7hbcncrlf9nhx5is2b25d13-hello-2.12.1;")
        );
        assert!(
            fingerprint.ends_with(";0;/gnu/store/sl141d1g77wvhr050ah87lcyz2czdxa3-glibc-2.40-36")
        );
    }
}
