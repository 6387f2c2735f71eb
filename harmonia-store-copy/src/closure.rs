// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Reference closures.

use std::collections::{BTreeMap, BTreeSet};

use futures::future::try_join_all;
use harmonia_store_core::{StorePath, ValidPathInfo};
use tracing::{debug, instrument};

use crate::error::CopyError;
use crate::store::StoreAdapter;

/// Compute the closure of `roots` in `store`, dependencies first.
///
/// The store is walked one frontier at a time; all paths of a frontier are
/// queried concurrently. Any root or reference the store does not know
/// fails the whole computation with [`CopyError::MissingPath`].
#[instrument(skip_all, fields(store = %store.uri(), roots = roots.len()))]
pub async fn compute_closure<S>(
    store: &S,
    roots: &BTreeSet<StorePath>,
) -> Result<Vec<ValidPathInfo>, CopyError>
where
    S: StoreAdapter + ?Sized,
{
    let mut infos: BTreeMap<StorePath, ValidPathInfo> = BTreeMap::new();
    let mut frontier: BTreeSet<StorePath> = roots.clone();
    let mut depth = 0usize;

    while !frontier.is_empty() {
        let queried = try_join_all(frontier.iter().map(|path| async move {
            match store.query_path_info(path).await {
                Ok(Some(info)) => Ok(info),
                Ok(None) => Err(CopyError::MissingPath(path.clone())),
                Err(source) => Err(CopyError::from_query(store.uri(), source)),
            }
        }))
        .await?;

        for info in queried {
            infos.insert(info.path.clone(), info);
        }
        let next: BTreeSet<StorePath> = frontier
            .iter()
            .filter_map(|path| infos.get(path))
            .flat_map(|info| info.references.iter())
            .filter(|reference| !infos.contains_key(*reference))
            .cloned()
            .collect();
        debug!(depth, frontier = frontier.len(), next = next.len(), "walked frontier");
        frontier = next;
        depth += 1;
    }

    sort_topologically(infos)
}

/// Order `infos` so every path comes after the paths it references.
///
/// References to paths outside `infos` and self-references are ignored.
/// Among paths whose dependencies are all placed, the smallest `StorePath`
/// goes first, which makes the order deterministic.
pub fn sort_topologically(
    mut infos: BTreeMap<StorePath, ValidPathInfo>,
) -> Result<Vec<ValidPathInfo>, CopyError> {
    let mut pending: BTreeMap<StorePath, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<StorePath, Vec<StorePath>> = BTreeMap::new();
    for info in infos.values() {
        let mut count = 0;
        for reference in info.references_excluding_self() {
            if infos.contains_key(reference) {
                count += 1;
                dependents
                    .entry(reference.clone())
                    .or_default()
                    .push(info.path.clone());
            }
        }
        pending.insert(info.path.clone(), count);
    }

    let mut ready: BTreeSet<StorePath> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(path, _)| path.clone())
        .collect();
    let mut sorted = Vec::with_capacity(infos.len());

    while let Some(path) = ready.pop_first() {
        pending.remove(&path);
        for dependent in dependents.remove(&path).unwrap_or_default() {
            if let Some(count) = pending.get_mut(&dependent) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(dependent);
                }
            }
        }
        if let Some(info) = infos.remove(&path) {
            sorted.push(info);
        }
    }

    // Whatever is still pending sits on or behind a cycle.
    if let Some(info) = infos.values().next() {
        let reference = info
            .references_excluding_self()
            .find(|reference| pending.contains_key(*reference))
            .unwrap_or(&info.path)
            .clone();
        return Err(CopyError::ReferenceCycle {
            path: info.path.clone(),
            reference,
        });
    }
    Ok(sorted)
}
