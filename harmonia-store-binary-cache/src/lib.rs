// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! A binary cache in a local directory, addressed as `file://<dir>`.

pub mod cacheinfo;
pub mod narinfo;
pub mod store;

pub use cacheinfo::CacheInfo;
pub use narinfo::{NarInfo, NarInfoError};
pub use store::{BinaryCacheConfig, BinaryCacheStore};
