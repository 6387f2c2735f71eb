// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Copying path closures between Nix stores.
//!
//! [`copy_paths`] ties the stages together:
//!
//! 1. [`closure::compute_closure`] walks the references of the requested
//!    roots in the source store.
//! 2. [`missing::filter_missing`] asks the destination which of them it
//!    already has.
//! 3. [`repair::RepairCoordinator`] re-hashes present paths when repairing.
//! 4. [`verify::SignatureVerifier`] refuses paths nobody trusted signed.
//! 5. [`scheduler::TransferScheduler`] streams the rest, dependencies first,
//!    with a bounded number of concurrent transfers.
//!
//! Stores plug in through [`StoreAdapter`]; [`MemoryStore`] is an
//! in-process implementation.

pub mod closure;
pub mod copy;
pub mod error;
pub mod memory;
pub mod missing;
pub mod repair;
pub mod scheduler;
pub mod store;
pub mod verify;
pub mod verifying_reader;

pub use copy::{CopyOptions, CopyReport, copy_paths, default_max_jobs};
pub use error::{CopyError, ErrorKind, IoContext, PathError, StoreError};
pub use memory::MemoryStore;
pub use store::{CheckSigsFlag, NarReader, RepairFlag, StoreAdapter, StoreKind};
