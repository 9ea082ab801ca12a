// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Woopsa server entry point.

use clap::Parser;

use woopsa_bin::cli::Cli;
use woopsa_bin::error::report_error_and_exit;
use woopsa_bin::{commands, logging};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let file_logging = woopsa_config::ConfigLoader::new()
        .load(&cli.config)
        .map(|config| config.logging)
        .unwrap_or_default();
    logging::init_logging(
        cli.effective_log_level(&file_logging),
        cli.effective_log_format(&file_logging),
    );

    if let Err(error) = commands::execute(cli).await {
        report_error_and_exit(error);
    }
}
