// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Result formatting for CLI output

use colored::*;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use gqlgate::coordinator::CoordinatorStatsSnapshot;
use gqlgate::schema::ValidationError;
use gqlgate::{NormalizedOperation, SchemaUpdateReport};

use super::commands::OutputFormat;

/// Result formatter for the CLI output formats
pub struct ResultFormatter;

impl ResultFormatter {
    pub fn format_normalized(
        operation: &NormalizedOperation,
        schema_version: &str,
        validation: Option<&ValidationError>,
        format: OutputFormat,
    ) -> String {
        match format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "operation_name": operation.name,
                    "kind": operation.kind.keyword(),
                    "hash": format!("{:016x}", operation.hash),
                    "schema_version": schema_version,
                    "canonical": operation.canonical,
                    "valid": validation.is_none(),
                    "validation_error": validation.map(|e| e.to_string()),
                });
                Self::pretty(&json)
            }
            OutputFormat::Table => {
                let mut table = Table::new();
                table.load_preset(UTF8_FULL);
                table.set_header(vec![
                    Cell::new("Property").fg(Color::Green),
                    Cell::new("Value").fg(Color::Green),
                ]);
                table.add_row(vec![
                    "Operation",
                    operation.name.as_deref().unwrap_or("<anonymous>"),
                ]);
                table.add_row(vec!["Kind", operation.kind.keyword()]);
                table.add_row(vec![
                    "Identity hash".to_string(),
                    format!("{:016x}", operation.hash),
                ]);
                table.add_row(vec!["Schema version", schema_version]);

                let mut output = String::new();
                output.push_str(&format!("{}\n", "Canonical form".bold().green()));
                output.push_str(&format!("{}\n\n", operation.canonical));
                output.push_str(&table.to_string());
                output.push('\n');
                match validation {
                    None => output.push_str(&format!("{}\n", "✅ Valid".green())),
                    Some(err) => output.push_str(&format!("{}\n", format!("❌ {}", err).red())),
                }
                output
            }
        }
    }

    pub fn format_warm(
        report: &SchemaUpdateReport,
        stats: &CoordinatorStatsSnapshot,
        format: OutputFormat,
    ) -> String {
        match format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "update": report,
                    "stats": stats,
                });
                Self::pretty(&json)
            }
            OutputFormat::Table => {
                if report.warmups.is_empty() {
                    return format!("{}\n", "No warmup source had operations".yellow());
                }

                let mut table = Table::new();
                table.load_preset(UTF8_FULL);
                table.set_header(
                    [
                        "Tenant", "Source", "Planned", "Completed", "Failed", "Skipped", "Time (ms)",
                    ]
                    .iter()
                    .map(|h| Cell::new(h).fg(Color::Green))
                    .collect::<Vec<_>>(),
                );
                for warmup in &report.warmups {
                    let tenant = if warmup.tenant_key.is_empty() {
                        "<base>".to_string()
                    } else {
                        warmup.tenant_key.clone()
                    };
                    let failed = if warmup.failed > 0 {
                        Cell::new(warmup.failed).fg(Color::Red)
                    } else {
                        Cell::new(warmup.failed)
                    };
                    table.add_row(vec![
                        Cell::new(tenant),
                        Cell::new(&warmup.source),
                        Cell::new(warmup.planned),
                        Cell::new(warmup.completed),
                        failed,
                        Cell::new(warmup.skipped),
                        Cell::new(warmup.elapsed_ms),
                    ]);
                }

                let mut output = String::new();
                output.push_str(&table.to_string());
                output.push('\n');
                output.push_str(&format!(
                    "Compilations: {}  Cached plans: {}\n",
                    stats.counters.compilations,
                    stats
                        .cache_sets
                        .iter()
                        .map(|set| set.plans.current_entries)
                        .sum::<usize>()
                ));
                if report.warmups.iter().any(|w| w.timed_out) {
                    output.push_str(&format!(
                        "{}\n",
                        "Warmup deadline reached; some operations were skipped".yellow()
                    ));
                }
                output
            }
        }
    }

    fn pretty(json: &serde_json::Value) -> String {
        let mut text = serde_json::to_string_pretty(json).unwrap_or_else(|_| {
            "{\"status\": \"error\", \"error\": \"Could not serialize results to JSON\"}".to_string()
        });
        text.push('\n');
        text
    }
}
