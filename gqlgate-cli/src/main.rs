// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! gqlgate CLI entry point

use clap::Parser;
use colored::Colorize;

mod cli;
use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        log::LevelFilter::Debug
    } else if let Some(level) = cli.log_level {
        level.to_level_filter()
    } else {
        // RUST_LOG can still raise it
        log::LevelFilter::Warn
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    match cli.command {
        Commands::Version => {
            println!("{} {}", "gqlgate".bold().green(), gqlgate::VERSION);
            println!("Operation compilation and plan caching for federated GraphQL");
            Ok(())
        }

        Commands::Normalize {
            schema,
            query,
            operation_name,
            format,
        } => cli::handle_normalize(schema, query, operation_name, format),

        Commands::Warm {
            schema,
            config,
            operations,
            feature_flags,
            format,
        } => cli::handle_warm(schema, config, operations, feature_flags, format),
    }
}
