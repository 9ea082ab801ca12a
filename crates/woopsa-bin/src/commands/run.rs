// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `run` command.

use tracing::info;

use crate::cli::Cli;
use crate::error::BinResult;
use crate::runtime::ServerRuntime;

/// Loads the configuration and serves until shutdown.
pub async fn run(cli: &Cli) -> BinResult<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "Starting Woopsa server"
    );

    let runtime = ServerRuntime::builder()
        .config_path(&cli.config)
        .build()
        .map_err(|e| e.with_context("building the server"))?;

    info!(
        addr = %runtime.config().api.socket_addr(),
        base_path = %runtime.config().api.base_path,
        "Server configured"
    );

    runtime.run().await
}
