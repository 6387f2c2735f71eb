// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! The `harmonia copy` command.

use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::Arc;

use harmonia_store_copy::{CopyOptions, CopyReport, StoreAdapter as _, copy_paths, default_max_jobs};
use harmonia_store_core::{StoreDir, StorePath};
use tracing::{debug, info};

use crate::cli::CopyArgs;
use crate::config::Config;
use crate::error::ClientError;
use crate::store::Store;

/// Accept `/nix/store/<hash>-<name>[/sub/path]` or a bare `<hash>-<name>`.
pub fn parse_path_arg(arg: &str, store_dir: &StoreDir) -> Result<StorePath, ClientError> {
    let path = if arg.starts_with('/') {
        store_dir.to_store_path(arg)?
    } else {
        StorePath::from_base_path(arg)?
    };
    Ok(path)
}

/// Effective engine options from the command line and the configuration.
pub fn copy_options(args: &CopyArgs, config: &Config) -> CopyOptions {
    CopyOptions {
        repair: args.repair.into(),
        check_sigs: (config.check_sigs && !args.no_check_sigs).into(),
        max_jobs: args
            .max_jobs
            .map(NonZeroUsize::get)
            .or(config.max_jobs)
            .unwrap_or_else(default_max_jobs),
    }
}

pub async fn run(args: &CopyArgs, config: &Config) -> Result<CopyReport, ClientError> {
    let (from, to) = args.stores(&config.store)?;
    let store_dir = config.store_dir()?;
    let roots = args
        .paths
        .iter()
        .map(|arg| parse_path_arg(arg, &store_dir))
        .collect::<Result<BTreeSet<_>, _>>()?;
    let trusted_keys = config.trusted_keys()?;
    let options = copy_options(args, config);
    if !args.recursive {
        debug!("copying full closures even without --recursive");
    }

    let src = Arc::new(Store::open(&from, &store_dir).await?);
    let dst = Arc::new(Store::open(&to, &store_dir).await?);
    info!(from = %src.uri(), to = %dst.uri(), roots = roots.len(), "starting copy");

    Ok(copy_paths(src, dst, &roots, &trusted_keys, &options).await?)
}

/// One line per failed path, for stderr.
pub fn failure_lines(report: &CopyReport) -> Vec<String> {
    report
        .failures
        .iter()
        .map(|(path, err)| format!("error: {path}: {}: {err}", err.kind()))
        .collect()
}
