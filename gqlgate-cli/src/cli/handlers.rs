// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! CLI command handlers for gqlgate

use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::commands::OutputFormat;
use super::output::ResultFormatter;
use gqlgate::schema::validate_operation;
use gqlgate::{
    normalize_operation, FederatedPlanner, GatewayConfig, GatewayError, OperationCoordinator,
    Schema, SchemaUpdate, WarmupSourceConfig,
};

/// Handle the normalize command
pub fn handle_normalize(
    schema: PathBuf,
    query: String,
    operation_name: Option<String>,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let schema = load_schema(&schema)?;
    let text = read_query(&query)?;

    let normalized = normalize_operation(&text, operation_name.as_deref(), &schema)?;
    let validation = validate_operation(&normalized.definition, &schema);

    print!(
        "{}",
        ResultFormatter::format_normalized(
            &normalized,
            &schema.version(),
            validation.as_ref().err(),
            format
        )
    );
    Ok(())
}

/// Handle the warm command
///
/// Builds a coordinator the way the gateway would at startup, applies the
/// schema (which warms every new cache set) and prints what was compiled.
pub fn handle_warm(
    schema: PathBuf,
    config: Option<PathBuf>,
    operations: Option<PathBuf>,
    feature_flags: Vec<String>,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match config {
        Some(path) => GatewayConfig::from_file(path)?,
        None => GatewayConfig::default(),
    };
    config.warmup.enabled = true;
    if let Some(path) = operations {
        config
            .warmup
            .sources
            .insert(0, WarmupSourceConfig::Filesystem { path });
    }

    let mut update = SchemaUpdate::new(load_schema(&schema)?);
    for flag in &feature_flags {
        let (name, path) = flag
            .split_once('=')
            .ok_or_else(|| format!("Invalid --flag '{}', expected NAME=PATH", flag))?;
        update = update.with_feature_flag(name, load_schema(Path::new(path))?);
    }

    if matches!(format, OutputFormat::Table) {
        println!("{}", "Warming plan caches...".bold().green());
    }

    let runtime = tokio::runtime::Runtime::new()?;
    let (report, stats) = runtime.block_on(async {
        let coordinator = OperationCoordinator::new(config, Arc::new(FederatedPlanner::new()))?;
        let report = coordinator.apply_schema_update(update).await?;
        let stats = coordinator.stats();
        coordinator.shutdown();
        Ok::<_, GatewayError>((report, stats))
    })?;

    print!("{}", ResultFormatter::format_warm(&report, &stats, format));
    Ok(())
}

fn load_schema(path: &Path) -> Result<Schema, Box<dyn std::error::Error>> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read schema {}: {}", path.display(), e))?;
    let schema = Schema::from_json_str(&json)
        .map_err(|e| format!("Failed to parse schema {}: {}", path.display(), e))?;
    Ok(schema)
}

/// `@path` reads the operation from a file
fn read_query(argument: &str) -> Result<String, Box<dyn std::error::Error>> {
    match argument.strip_prefix('@') {
        Some(path) => Ok(std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read operation {}: {}", path, e))?),
        None => Ok(argument.to_string()),
    }
}
