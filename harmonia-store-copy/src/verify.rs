// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

use harmonia_store_core::{StoreDir, TrustedKeys, ValidPathInfo};

use crate::error::PathError;
use crate::store::CheckSigsFlag;

/// Decides whether a path may be added to the destination.
///
/// A path passes if signature checking is off, if it is locally trusted
/// (`ultimate`), or if at least one of its signatures verifies under a
/// trusted key. Fingerprints are rendered with `store_dir`.
#[derive(Debug, Clone, Copy)]
pub struct SignatureVerifier<'a> {
    store_dir: &'a StoreDir,
    trusted_keys: &'a TrustedKeys,
}

impl<'a> SignatureVerifier<'a> {
    pub fn new(store_dir: &'a StoreDir, trusted_keys: &'a TrustedKeys) -> Self {
        Self {
            store_dir,
            trusted_keys,
        }
    }

    pub fn check(&self, info: &ValidPathInfo, check_sigs: CheckSigsFlag) -> Result<(), PathError> {
        if check_sigs == CheckSigsFlag::NoCheckSigs || info.ultimate {
            return Ok(());
        }
        if info.count_valid_signatures(self.store_dir, self.trusted_keys) > 0 {
            Ok(())
        } else {
            Err(PathError::Untrusted(info.path.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use harmonia_store_core::{NarHash, SecretKey};
    use rstest::rstest;

    use super::*;
    use crate::error::ErrorKind;

    fn info() -> ValidPathInfo {
        ValidPathInfo::new(
            "7h7qgvs4kgzsn8a6rb273saxyqh4jxlz-hello-2.12.1".parse().unwrap(),
            NarHash::digest(b"hello"),
            5,
        )
    }

    fn trusted_key() -> SecretKey {
        SecretKey::from_seed("cache.example.com-1", &[1; 32])
    }

    fn untrusted_key() -> SecretKey {
        SecretKey::from_seed("attacker-1", &[2; 32])
    }

    #[rstest]
    #[case::unsigned(None, false, CheckSigsFlag::CheckSigs, false)]
    #[case::trusted_sig(Some(trusted_key()), false, CheckSigsFlag::CheckSigs, true)]
    #[case::untrusted_sig(Some(untrusted_key()), false, CheckSigsFlag::CheckSigs, false)]
    #[case::ultimate(None, true, CheckSigsFlag::CheckSigs, true)]
    #[case::no_check_sigs(Some(untrusted_key()), false, CheckSigsFlag::NoCheckSigs, true)]
    fn gate(
        #[case] signer: Option<SecretKey>,
        #[case] ultimate: bool,
        #[case] check_sigs: CheckSigsFlag,
        #[case] passes: bool,
    ) {
        let store_dir = StoreDir::default();
        let trusted: TrustedKeys = [trusted_key().to_public_key()].into_iter().collect();
        let mut info = info();
        info.ultimate = ultimate;
        if let Some(key) = signer {
            info.sign(&store_dir, &key);
        }

        let result = SignatureVerifier::new(&store_dir, &trusted).check(&info, check_sigs);
        assert_eq!(result.is_ok(), passes, "{result:?}");
        if let Err(err) = result {
            assert_eq!(err.kind(), ErrorKind::UntrustedPath);
        }
    }

    #[test]
    fn signature_over_other_content_is_rejected() {
        let store_dir = StoreDir::default();
        let trusted: TrustedKeys = [trusted_key().to_public_key()].into_iter().collect();
        let mut info = info();
        info.sign(&store_dir, &trusted_key());
        info.nar_hash = NarHash::digest(b"evil");

        let verifier = SignatureVerifier::new(&store_dir, &trusted);
        assert!(verifier.check(&info, CheckSigsFlag::CheckSigs).is_err());
    }
}
