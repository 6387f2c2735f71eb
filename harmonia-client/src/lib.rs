// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

pub mod cli;
pub mod config;
pub mod copy;
pub mod error;
pub mod store;

use tracing_subscriber::EnvFilter;

/// Log to stderr, filtered by `RUST_LOG` or else `default_level`.
pub fn init_logging(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
