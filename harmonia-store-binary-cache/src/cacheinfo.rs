// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! The `nix-cache-info` file at the root of every binary cache.

/// Default priority of binary caches; lower is preferred.
pub const DEFAULT_PRIORITY: u64 = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheInfo {
    pub store_dir: String,
    pub want_mass_query: bool,
    pub priority: u64,
}

impl CacheInfo {
    pub fn new(store_dir: impl Into<String>, priority: u64) -> Self {
        Self {
            store_dir: store_dir.into(),
            want_mass_query: true,
            priority,
        }
    }

    /// Parse the file leniently, like Nix does: unknown keys and unparsable
    /// values are skipped. Returns `None` without a `StoreDir` line.
    pub fn parse(text: &str) -> Option<Self> {
        let mut store_dir = None;
        let mut want_mass_query = false;
        let mut priority = DEFAULT_PRIORITY;
        for line in text.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "StoreDir" => store_dir = Some(value.to_string()),
                "WantMassQuery" => want_mass_query = value == "1",
                "Priority" => priority = value.parse().unwrap_or(priority),
                _ => {}
            }
        }
        Some(Self {
            store_dir: store_dir?,
            want_mass_query,
            priority,
        })
    }

    pub fn to_text(&self) -> String {
        format!(
            "StoreDir: {}\nWantMassQuery: {}\nPriority: {}\n",
            self.store_dir,
            u8::from(self.want_mass_query),
            self.priority
        )
    }
}
