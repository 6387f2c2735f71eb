// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

mod common;

use std::collections::{BTreeSet, HashMap};

use common::{nar_of, path};
use harmonia_store_copy::MemoryStore;
use harmonia_store_copy::closure::compute_closure;
use harmonia_store_core::{NarHash, StorePath, ValidPathInfo};
use proptest::prelude::*;

/// A random DAG over `n` nodes: node `i` may only reference nodes below it,
/// plus optionally itself.
fn arb_graph() -> impl Strategy<Value = (Vec<BTreeSet<usize>>, BTreeSet<usize>)> {
    (1usize..16).prop_flat_map(|n| {
        let edges = (0..n)
            .map(|i| proptest::collection::btree_set(0..=i, 0..=i.min(4)))
            .collect::<Vec<_>>();
        let roots = proptest::collection::btree_set(0..n, 0..=n.min(3));
        (edges, roots)
    })
}

fn node(i: usize) -> StorePath {
    path(&format!("node-{i}"))
}

fn populate(edges: &[BTreeSet<usize>]) -> MemoryStore {
    let store = MemoryStore::new("src");
    for (i, refs) in edges.iter().enumerate() {
        let nar = nar_of(&format!("node-{i}"));
        let mut info = ValidPathInfo::new(node(i), NarHash::digest(&nar), nar.len() as u64);
        info.references = refs.iter().map(|&r| node(r)).collect();
        store.insert(info, nar);
    }
    store
}

fn reachable(edges: &[BTreeSet<usize>], roots: &BTreeSet<usize>) -> BTreeSet<StorePath> {
    let mut seen = BTreeSet::new();
    let mut stack: Vec<usize> = roots.iter().copied().collect();
    while let Some(i) = stack.pop() {
        if seen.insert(i) {
            stack.extend(edges[i].iter().copied());
        }
    }
    seen.into_iter().map(node).collect()
}

proptest! {
    #[test]
    fn closure_is_complete_and_ordered((edges, roots) in arb_graph()) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let store = populate(&edges);
        let root_paths: BTreeSet<StorePath> = roots.iter().map(|&i| node(i)).collect();

        let closure = runtime.block_on(compute_closure(&store, &root_paths)).unwrap();

        let members: BTreeSet<StorePath> = closure.iter().map(|info| info.path.clone()).collect();
        prop_assert_eq!(members.len(), closure.len(), "duplicate closure members");
        prop_assert!(members.is_superset(&root_paths));
        prop_assert_eq!(&members, &reachable(&edges, &roots));

        let position: HashMap<&StorePath, usize> = closure
            .iter()
            .enumerate()
            .map(|(pos, info)| (&info.path, pos))
            .collect();
        for (pos, info) in closure.iter().enumerate() {
            for reference in &info.references {
                prop_assert!(members.contains(reference), "{} escapes the closure", reference);
                if *reference != info.path {
                    prop_assert!(
                        position[reference] < pos,
                        "{} listed before {}",
                        info.path,
                        reference
                    );
                }
            }
        }
    }
}
