// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::Arc;

use harmonia_store_core::{StorePath, TrustedKeys, ValidPathInfo};
use tracing::{info, instrument};

use crate::closure::compute_closure;
use crate::error::{CopyError, ErrorKind, PathError};
use crate::missing::filter_missing;
use crate::repair::RepairCoordinator;
use crate::scheduler::{PlannedTransfer, TransferScheduler};
use crate::store::{CheckSigsFlag, RepairFlag, StoreAdapter};
use crate::verify::SignatureVerifier;

#[derive(Debug, Clone)]
pub struct CopyOptions {
    pub repair: RepairFlag,
    pub check_sigs: CheckSigsFlag,
    /// Maximum number of concurrent transfers.
    pub max_jobs: usize,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            repair: RepairFlag::NoRepair,
            check_sigs: CheckSigsFlag::CheckSigs,
            max_jobs: default_max_jobs(),
        }
    }
}

/// The available hardware parallelism, or 1 if it cannot be determined.
pub fn default_max_jobs() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Summary of a finished copy.
#[derive(Debug, Default)]
pub struct CopyReport {
    /// Number of paths in the closure of the requested roots.
    pub closure_size: usize,
    /// Closure members the destination already had and that were left alone.
    pub already_present: usize,
    /// Paths newly added to the destination, dependencies first.
    pub copied: Vec<StorePath>,
    /// Present paths whose content was replaced.
    pub repaired: Vec<StorePath>,
    pub bytes_copied: u64,
    /// Every path that was not copied, in dependency order.
    pub failures: Vec<(StorePath, PathError)>,
}

impl CopyReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failure_kinds(&self) -> Vec<(StorePath, ErrorKind)> {
        self.failures
            .iter()
            .map(|(path, err)| (path.clone(), err.kind()))
            .collect()
    }
}

/// Copy the closure of `roots` from `src` to `dst`.
///
/// Paths already valid in `dst` are skipped unless `options.repair` finds
/// their content damaged. Every other path must pass the signature gate
/// and is then transferred after its references. An `Err` means nothing
/// was scheduled; per-path problems are collected in
/// [`CopyReport::failures`].
#[instrument(skip_all, fields(from = %src.uri(), to = %dst.uri()))]
pub async fn copy_paths<S, D>(
    src: Arc<S>,
    dst: Arc<D>,
    roots: &BTreeSet<StorePath>,
    trusted_keys: &TrustedKeys,
    options: &CopyOptions,
) -> Result<CopyReport, CopyError>
where
    S: StoreAdapter,
    D: StoreAdapter,
{
    if src.store_dir() != dst.store_dir() {
        return Err(CopyError::StoreDirMismatch {
            from: src.store_dir().to_string(),
            to: dst.store_dir().to_string(),
        });
    }

    let closure = compute_closure(&*src, roots).await?;
    let (missing, present) = filter_missing(&*dst, &closure).await?;

    let present_infos: Vec<ValidPathInfo> = closure
        .iter()
        .filter(|info| present.contains(&info.path))
        .cloned()
        .collect();
    let damaged: BTreeSet<StorePath> = RepairCoordinator::new(options.repair)
        .max_jobs(options.max_jobs)
        .select(&*dst, &present_infos)
        .await
        .into_iter()
        .map(|info| info.path)
        .collect();

    info!(
        closure = closure.len(),
        missing = missing.len(),
        present = present.len(),
        damaged = damaged.len(),
        "computed transfer set"
    );

    let missing: BTreeSet<StorePath> = missing.into_iter().map(|info| info.path).collect();
    let verifier = SignatureVerifier::new(src.store_dir(), trusted_keys);
    let plan: Vec<PlannedTransfer> = closure
        .iter()
        .filter(|info| missing.contains(&info.path) || damaged.contains(&info.path))
        .map(|info| PlannedTransfer {
            rejected: verifier.check(info, options.check_sigs).err(),
            repair: if damaged.contains(&info.path) {
                RepairFlag::Repair
            } else {
                RepairFlag::NoRepair
            },
            info: info.clone(),
        })
        .collect();

    let mut report = CopyReport {
        closure_size: closure.len(),
        already_present: present.len() - damaged.len(),
        ..CopyReport::default()
    };
    if plan.is_empty() {
        info!("all paths already present");
        return Ok(report);
    }

    info!(paths = plan.len(), "copying paths");
    let transfer = TransferScheduler::new(options.max_jobs)
        .run(src, dst, plan)
        .await;
    for path in transfer.transferred {
        if damaged.contains(&path) {
            report.repaired.push(path);
        } else {
            report.copied.push(path);
        }
    }
    report.bytes_copied = transfer.bytes;
    report.failures = transfer.failures;
    info!(
        copied = report.copied.len(),
        repaired = report.repaired.len(),
        failed = report.failures.len(),
        bytes = report.bytes_copied,
        "copy finished"
    );
    Ok(report)
}
