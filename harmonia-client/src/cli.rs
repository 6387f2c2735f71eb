// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::error::ClientError;

#[derive(Parser, Debug)]
#[command(name = "harmonia", version, about = "Copy Nix store paths between stores")]
pub struct Cli {
    /// Configuration file; defaults to $HARMONIA_CONFIG
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Copy paths and their closures from one store to another
    Copy(CopyArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct CopyArgs {
    /// Store to copy from [default: the configured `store`]
    ///
    /// The configured `store` defaults to `auto`, the local daemon, which
    /// this build cannot open; pass a `file://` URI for both sides.
    #[arg(long, value_name = "STORE-URI")]
    pub from: Option<String>,

    /// Store to copy to [default: the configured `store`]
    ///
    /// See `--from` for what the configured store defaults to.
    #[arg(long, value_name = "STORE-URI")]
    pub to: Option<String>,

    /// Do not require signatures from a trusted key
    #[arg(long)]
    pub no_check_sigs: bool,

    /// Replace paths whose content at the destination is damaged
    #[arg(long)]
    pub repair: bool,

    /// Copy the closure of each path (always done)
    #[arg(short = 'r', long)]
    pub recursive: bool,

    /// Maximum number of concurrent transfers
    #[arg(short = 'j', long, value_name = "N")]
    pub max_jobs: Option<NonZeroUsize>,

    /// Store paths, absolute or as `<hash>-<name>`
    #[arg(value_name = "PATH")]
    pub paths: Vec<String>,
}

impl CopyArgs {
    pub fn check(&self) -> Result<(), ClientError> {
        if self.from.is_none() && self.to.is_none() {
            return Err(ClientError::usage("you must pass '--from' and/or '--to'"));
        }
        Ok(())
    }

    /// Source and destination URIs, with `default` for the omitted side.
    pub fn stores(&self, default: &str) -> Result<(String, String), ClientError> {
        self.check()?;
        let pick = |uri: &Option<String>| uri.clone().unwrap_or_else(|| default.to_string());
        Ok((pick(&self.from), pick(&self.to)))
    }
}
