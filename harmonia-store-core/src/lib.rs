// SPDX-FileCopyrightText: 2024 griff
// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: EUPL-1.2 OR MIT
//
// This crate is derived from Nix.rs (https://github.com/griff/Nix.rs)
// Upstream commit: f5d129b71bb30b476ce21e6da2a53dcb28607a89

//! Core Nix store semantics.
//!
//! This crate provides the fundamental types used when moving paths between
//! stores. It is intentionally IO-free: everything here operates on values,
//! so the copy engine and the store backends can share it freely.
//!
//! # Key Modules
//!
//! - `store_path` - Store paths and the store directory
//! - `hash` - NAR hashes and incremental hashing
//! - `signature` - Ed25519 keys, signatures and the trusted key set
//! - `path_info` - Per-path metadata and its signing fingerprint
//!
//! # Design Principles
//!
//! 1. **No IO**: No filesystem, no network, no `async`
//! 2. **Explicit errors**: All fallible operations return `Result`
//! 3. **Validated at the edge**: Parsed values are always well formed

pub mod base32;
pub mod fingerprint;
pub mod hash;
pub mod path_info;
pub mod signature;
pub mod store_path;

pub use hash::{NarHash, NarHasher, ParseHashError};
pub use path_info::ValidPathInfo;
pub use signature::{NarSignature, PublicKey, SecretKey, SignatureError, TrustedKeys};
pub use store_path::{StoreDir, StorePath, StorePathError};
