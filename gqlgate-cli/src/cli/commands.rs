// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Command-line arguments

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gqlgate", version, about = "Plan cache tooling for a federated GraphQL gateway")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level (overridden by --verbose)
    #[arg(long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print version information
    Version,

    /// Print the canonical form and identity hash of an operation
    Normalize {
        /// Supergraph schema (JSON)
        #[arg(short, long)]
        schema: PathBuf,

        /// Operation text, or @path to read it from a file
        query: String,

        /// Operation to select from a multi-operation document
        #[arg(short = 'n', long)]
        operation_name: Option<String>,

        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Build cache sets for a schema, run warmup and report the results
    Warm {
        /// Supergraph schema (JSON) for the base graph
        #[arg(short, long)]
        schema: PathBuf,

        /// Gateway configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory of operations to warm from; added as the first source
        #[arg(short, long)]
        operations: Option<PathBuf>,

        /// Feature flag schema as NAME=PATH; repeatable
        #[arg(long = "flag", value_name = "NAME=PATH")]
        feature_flags: Vec<String>,

        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}
