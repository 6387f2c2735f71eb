// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

use futures::{StreamExt as _, stream};
use harmonia_store_core::ValidPathInfo;
use tracing::{info, instrument, warn};

use crate::store::{RepairFlag, StoreAdapter};

const DEFAULT_PARALLELISM: usize = 4;

/// Picks the already present paths whose destination content is damaged.
#[derive(Debug, Clone, Copy)]
pub struct RepairCoordinator {
    repair: RepairFlag,
    max_jobs: usize,
}

impl RepairCoordinator {
    pub fn new(repair: RepairFlag) -> Self {
        Self {
            repair,
            max_jobs: DEFAULT_PARALLELISM,
        }
    }

    /// Bound the number of destination paths re-hashed at once.
    pub fn max_jobs(mut self, max_jobs: usize) -> Self {
        self.max_jobs = max_jobs.max(1);
        self
    }

    /// Return the members of `present` that must be transferred again.
    ///
    /// `present` carries the source's path infos. Without repair nothing is
    /// returned and the destination is not touched. With repair each path's
    /// destination NAR is re-hashed; a hash or size that differs from the
    /// source's declaration, or content that cannot be read, selects the path.
    #[instrument(skip_all, fields(store = %dst.uri(), paths = present.len()))]
    pub async fn select<D>(&self, dst: &D, present: &[ValidPathInfo]) -> Vec<ValidPathInfo>
    where
        D: StoreAdapter + ?Sized,
    {
        if self.repair == RepairFlag::NoRepair || present.is_empty() {
            return Vec::new();
        }

        let checked: Vec<(&ValidPathInfo, bool)> = stream::iter(present)
            .map(|expected| async move {
                let damaged = match dst.query_nar_hash(&expected.path).await {
                    Ok((hash, size)) if hash == expected.nar_hash && size == expected.nar_size => {
                        false
                    }
                    Ok((hash, size)) => {
                        warn!(
                            path = %expected.path,
                            expected = %expected.nar_hash,
                            actual = %hash,
                            expected_size = expected.nar_size,
                            actual_size = size,
                            "destination content is corrupt"
                        );
                        true
                    }
                    Err(err) => {
                        warn!(
                            path = %expected.path,
                            error = %err,
                            "cannot read destination content"
                        );
                        true
                    }
                };
                (expected, damaged)
            })
            .buffered(self.max_jobs)
            .collect()
            .await;

        let selected: Vec<ValidPathInfo> = checked
            .into_iter()
            .filter(|(_, damaged)| *damaged)
            .map(|(info, _)| info.clone())
            .collect();
        info!(checked = present.len(), damaged = selected.len(), "verified destination paths");
        selected
    }
}
