// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{Event, RecordingStore, SourceBuilder, path, paths, preload, trusted_keys};
use harmonia_store_copy::{
    CheckSigsFlag, CopyError, CopyOptions, ErrorKind, MemoryStore, PathError, RepairFlag,
    StoreAdapter, StoreError, copy_paths,
};
use harmonia_store_core::{StoreDir, StorePath, TrustedKeys};

fn options() -> CopyOptions {
    CopyOptions {
        max_jobs: 4,
        ..CopyOptions::default()
    }
}

/// X references Y and Z, all signed by the trusted key.
fn signed_xyz() -> Arc<MemoryStore> {
    SourceBuilder::new()
        .signed("y", &[])
        .signed("z", &[])
        .signed("x", &["y", "z"])
        .build()
}

#[test_log::test(tokio::test)]
async fn copies_closure_dependencies_first() {
    let src = signed_xyz();
    let dst = Arc::new(RecordingStore::new());

    let report = copy_paths(src, dst.clone(), &paths(&["x"]), &trusted_keys(), &options())
        .await
        .unwrap();

    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(report.closure_size, 3);
    assert_eq!(report.copied.len(), 3);
    assert_eq!(report.already_present, 0);
    let x_started = dst.position("x", Event::Started).unwrap();
    assert!(dst.position("y", Event::Finished).unwrap() < x_started);
    assert!(dst.position("z", Event::Finished).unwrap() < x_started);
    assert_eq!(dst.inner.paths(), paths(&["x", "y", "z"]));
}

#[tokio::test]
async fn only_missing_paths_are_copied() {
    let src = signed_xyz();
    let dst = Arc::new(RecordingStore::new());
    preload(&src, &dst.inner, &["y", "z"]);

    let report = copy_paths(src, dst.clone(), &paths(&["x"]), &trusted_keys(), &options())
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.copied, [path("x")]);
    assert_eq!(report.already_present, 2);
    assert_eq!(dst.written(), [path("x")]);
}

#[tokio::test]
async fn untrusted_path_fails_with_its_dependents() {
    let src = SourceBuilder::new()
        .signed("y", &[])
        .unsigned("z", &[])
        .signed("x", &["y", "z"])
        .build();
    let dst = Arc::new(RecordingStore::new());

    let report = copy_paths(src, dst.clone(), &paths(&["x"]), &trusted_keys(), &options())
        .await
        .unwrap();

    assert!(!report.is_success());
    assert_eq!(
        report.failure_kinds(),
        [
            (path("z"), ErrorKind::UntrustedPath),
            (path("x"), ErrorKind::UntrustedPath)
        ]
    );
    assert_eq!(report.copied, [path("y")]);
    // Nothing of z or x reached the destination, not even a started write.
    assert_eq!(dst.position("z", Event::Started), None);
    assert_eq!(dst.position("x", Event::Started), None);
}

#[tokio::test]
async fn second_copy_transfers_nothing() {
    let src = signed_xyz();
    let dst = Arc::new(MemoryStore::new("dst"));
    let roots = paths(&["x"]);

    let first = copy_paths(src.clone(), dst.clone(), &roots, &trusted_keys(), &options())
        .await
        .unwrap();
    assert_eq!(first.copied.len(), 3);

    let second = copy_paths(src, dst, &roots, &trusted_keys(), &options())
        .await
        .unwrap();
    assert!(second.is_success());
    assert!(second.copied.is_empty());
    assert_eq!(second.already_present, 3);
    assert_eq!(second.bytes_copied, 0);
}

#[tokio::test]
async fn no_check_sigs_accepts_unsigned_paths() {
    let src = SourceBuilder::new().unsigned("a", &[]).build();
    let dst = Arc::new(MemoryStore::new("dst"));
    let options = CopyOptions {
        check_sigs: CheckSigsFlag::NoCheckSigs,
        ..options()
    };

    let report = copy_paths(src, dst, &paths(&["a"]), &TrustedKeys::new(), &options)
        .await
        .unwrap();
    assert_eq!(report.copied, [path("a")]);
}

#[tokio::test]
async fn locally_built_paths_need_no_signature() {
    let src = SourceBuilder::new().ultimate("a", &[]).build();
    let dst = Arc::new(MemoryStore::new("dst"));

    let report = copy_paths(src, dst.clone(), &paths(&["a"]), &TrustedKeys::new(), &options())
        .await
        .unwrap();
    assert!(report.is_success());
    // The destination did not build it.
    assert!(!dst.path_info(&path("a")).unwrap().ultimate);
}

#[tokio::test]
async fn failure_does_not_spread_to_unrelated_paths() {
    // a <- b, and an unrelated chain c <- d.
    let src = SourceBuilder::new()
        .signed("a", &[])
        .signed("b", &["a"])
        .signed("c", &[])
        .signed("d", &["c"])
        .build();
    let dst = Arc::new(RecordingStore::new().failing(&["a"]));

    let report = copy_paths(src, dst.clone(), &paths(&["b", "d"]), &trusted_keys(), &options())
        .await
        .unwrap();

    let mut failed = report.failure_kinds();
    failed.sort();
    let mut expected = vec![
        (path("a"), ErrorKind::TransferIo),
        (path("b"), ErrorKind::TransferIo),
    ];
    expected.sort();
    assert_eq!(failed, expected);
    assert_eq!(dst.inner.paths(), paths(&["c", "d"]));
    assert_eq!(dst.position("b", Event::Started), None);
}

#[tokio::test]
async fn read_only_destination_fails_every_path() {
    let src = signed_xyz();
    let dst = Arc::new(MemoryStore::new("cache").read_only());

    let report = copy_paths(src, dst.clone(), &paths(&["x"]), &trusted_keys(), &options())
        .await
        .unwrap();

    assert_eq!(report.failures.len(), 3);
    for (_, err) in &report.failures {
        assert_eq!(err.kind(), ErrorKind::ReadOnlyStore);
    }
    assert!(dst.is_empty());
}

#[tokio::test]
async fn corrupt_source_content_is_not_committed() {
    let src = signed_xyz();
    src.replace_nar(&path("y"), "some other nar contents");
    let dst = Arc::new(MemoryStore::new("dst"));

    let report = copy_paths(src, dst.clone(), &paths(&["x"]), &trusted_keys(), &options())
        .await
        .unwrap();

    let kinds = report.failure_kinds();
    assert!(kinds.contains(&(path("y"), ErrorKind::TransferIo)), "{kinds:?}");
    assert!(kinds.contains(&(path("x"), ErrorKind::TransferIo)), "{kinds:?}");
    let (_, y_err) = report
        .failures
        .iter()
        .find(|(p, _)| *p == path("y"))
        .unwrap();
    assert!(
        matches!(
            y_err,
            PathError::TransferIo {
                source: StoreError::NarSizeMismatch { .. },
                ..
            }
        ),
        "{y_err}"
    );
    assert_eq!(dst.paths(), paths(&["z"]));
}

#[tokio::test]
async fn repair_replaces_damaged_content() {
    let src = signed_xyz();
    let dst = Arc::new(MemoryStore::new("dst"));
    preload(&src, &dst, &["x", "y", "z"]);
    dst.replace_nar(&path("y"), "bit rot");

    let repair = CopyOptions {
        repair: RepairFlag::Repair,
        ..options()
    };
    let report = copy_paths(src.clone(), dst.clone(), &paths(&["x"]), &trusted_keys(), &repair)
        .await
        .unwrap();

    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(report.repaired, [path("y")]);
    assert!(report.copied.is_empty());
    assert_eq!(report.already_present, 2);
    assert_eq!(dst.nar(&path("y")).unwrap(), src.nar(&path("y")).unwrap());
}

#[tokio::test]
async fn without_repair_damaged_content_stays() {
    let src = signed_xyz();
    let dst = Arc::new(MemoryStore::new("dst"));
    preload(&src, &dst, &["x", "y", "z"]);
    dst.replace_nar(&path("y"), "bit rot");

    let report = copy_paths(src, dst.clone(), &paths(&["x"]), &trusted_keys(), &options())
        .await
        .unwrap();

    assert!(report.is_success());
    assert!(report.repaired.is_empty());
    assert_eq!(report.already_present, 3);
    assert_eq!(dst.nar(&path("y")).unwrap(), "bit rot");
}

#[tokio::test]
async fn repaired_path_passes_the_signature_gate() {
    let src = SourceBuilder::new().unsigned("a", &[]).build();
    let dst = Arc::new(MemoryStore::new("dst"));
    preload(&src, &dst, &["a"]);
    dst.replace_nar(&path("a"), "bit rot");

    let repair = CopyOptions {
        repair: RepairFlag::Repair,
        ..options()
    };
    let report = copy_paths(src, dst.clone(), &paths(&["a"]), &trusted_keys(), &repair)
        .await
        .unwrap();

    assert_eq!(report.failure_kinds(), [(path("a"), ErrorKind::UntrustedPath)]);
    assert_eq!(dst.nar(&path("a")).unwrap(), "bit rot");
}

#[tokio::test]
async fn missing_reference_aborts_before_transfer() {
    let src = SourceBuilder::new().signed("x", &["y"]).build();
    let dst = Arc::new(RecordingStore::new());

    let err = copy_paths(src, dst.clone(), &paths(&["x"]), &trusted_keys(), &options())
        .await
        .unwrap_err();

    assert!(matches!(&err, CopyError::MissingPath(p) if *p == path("y")));
    assert_eq!(err.kind(), ErrorKind::MissingPath);
    assert!(dst.events().is_empty());
}

#[tokio::test]
async fn unreachable_destination_is_fatal() {
    let src = signed_xyz();
    let dst = Arc::new(RecordingStore::new().unavailable());

    let err = copy_paths(src, dst, &paths(&["x"]), &trusted_keys(), &options())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
}

#[tokio::test]
async fn different_store_dirs_are_refused() {
    let src = signed_xyz();
    let gnu = StoreDir::new("/gnu/store").unwrap();
    let dst = Arc::new(MemoryStore::new("dst").with_store_dir(gnu));

    let err = copy_paths(src, dst.clone(), &paths(&["x"]), &trusted_keys(), &options())
        .await
        .unwrap_err();
    assert!(matches!(err, CopyError::StoreDirMismatch { .. }));
    assert!(dst.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_transfers_are_bounded() {
    let mut builder = SourceBuilder::new();
    let names: Vec<String> = (0..12).map(|i| format!("leaf-{i}")).collect();
    for name in &names {
        builder = builder.signed(name, &[]);
    }
    let src = builder.build();
    let dst = Arc::new(RecordingStore::new().with_delay(Duration::from_millis(20)));
    let roots: BTreeSet<StorePath> = names.iter().map(|name| path(name)).collect();
    let options = CopyOptions {
        max_jobs: 3,
        ..CopyOptions::default()
    };

    let report = copy_paths(src, dst.clone(), &roots, &trusted_keys(), &options)
        .await
        .unwrap();

    assert_eq!(report.copied.len(), 12);
    let max_active = dst.max_active.load(Ordering::SeqCst);
    assert!(max_active <= 3, "{max_active} transfers ran at once");
    assert!(max_active >= 2, "transfers never overlapped");
}

#[tokio::test]
async fn empty_root_set_is_a_no_op() {
    let src = signed_xyz();
    let dst = Arc::new(MemoryStore::new("dst"));

    let report = copy_paths(src, dst.clone(), &paths(&[]), &trusted_keys(), &options())
        .await
        .unwrap();
    assert!(report.is_success());
    assert_eq!(report.closure_size, 0);
    assert!(dst.is_empty());
    assert_eq!(dst.uri(), "memory://dst");
}
