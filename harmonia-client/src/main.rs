// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

use std::process::ExitCode;

use clap::Parser;
use harmonia_client::cli::{Cli, Command};
use harmonia_client::config::Config;
use harmonia_client::error::ClientError;
use harmonia_client::{copy, init_logging};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, ClientError> {
    let Command::Copy(args) = cli.command;
    args.check()?;

    let config = Config::load(cli.config.as_deref())?;
    init_logging(&config.log_level);

    let report = copy::run(&args, &config).await?;
    if !report.repaired.is_empty() {
        info!("repaired {} paths", report.repaired.len());
    }
    info!(
        "copied {} paths ({} bytes), {} already present",
        report.copied.len(),
        report.bytes_copied,
        report.already_present
    );

    if report.is_success() {
        return Ok(ExitCode::SUCCESS);
    }
    for line in copy::failure_lines(&report) {
        eprintln!("{line}");
    }
    error!("{} of {} paths could not be copied", report.failures.len(), report.closure_size);
    Ok(ExitCode::FAILURE)
}
