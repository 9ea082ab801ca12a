// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use crate::cli::Cli;
use crate::error::BinResult;

/// Prints the version of every component.
pub fn version(_cli: &Cli) -> BinResult<()> {
    println!("Woopsa server");
    println!();
    println!("Version Information:");
    println!("  woopsa-bin:          {}", env!("CARGO_PKG_VERSION"));
    println!("  woopsa-core:         {}", woopsa_core::VERSION);
    println!("  woopsa-subscription: {}", woopsa_subscription::VERSION);
    println!("  woopsa-client:       {}", woopsa_client::VERSION);
    println!("  woopsa-api:          {}", woopsa_api::VERSION);
    println!("  woopsa-config:       {}", woopsa_config::VERSION);
    println!();
    println!("Build Information:");
    println!("  Target:       {}", std::env::consts::ARCH);
    println!("  OS:           {}", std::env::consts::OS);
    println!();
    println!("License: PolyForm Noncommercial License 1.0.0");
    println!("Copyright (c) 2025 Sylvex. All rights reserved.");

    Ok(())
}
