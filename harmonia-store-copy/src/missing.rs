// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

use std::collections::BTreeSet;

use harmonia_store_core::{StorePath, ValidPathInfo};
use tracing::instrument;

use crate::error::CopyError;
use crate::store::StoreAdapter;

/// Split `closure` into the paths `dst` lacks and the paths it already has.
///
/// Presence is determined with a single batched query. The missing paths
/// keep the order of `closure`.
#[instrument(skip_all, fields(store = %dst.uri(), paths = closure.len()))]
pub async fn filter_missing<D>(
    dst: &D,
    closure: &[ValidPathInfo],
) -> Result<(Vec<ValidPathInfo>, BTreeSet<StorePath>), CopyError>
where
    D: StoreAdapter + ?Sized,
{
    let wanted: BTreeSet<StorePath> = closure.iter().map(|info| info.path.clone()).collect();
    let mut present = dst
        .query_valid_paths(&wanted)
        .await
        .map_err(|source| CopyError::StoreUnavailable {
            uri: dst.uri(),
            source,
        })?;
    present.retain(|path| wanted.contains(path));

    let missing = closure
        .iter()
        .filter(|info| !present.contains(&info.path))
        .cloned()
        .collect();
    Ok((missing, present))
}
