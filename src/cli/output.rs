//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::{Fingerprint, GatewayConfig, ValidationResult};
use crate::orchestrator::{PushOutcome, PushStatus};
use crate::sync::{ChangeType, SyncPlan};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug, Clone, Copy)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// What one target reports, for the `status` command.
#[derive(Debug, Clone, Serialize)]
pub struct TargetStatus {
    /// Admin URL.
    pub target: String,
    /// Delivery protocol in use.
    pub protocol: String,
    /// Proxy version.
    pub version: String,
    /// Configuration hash reported by the proxy, if any.
    pub configuration_hash: Option<String>,
    /// Last fingerprint applied by this tool, if recorded.
    pub last_applied: Option<Fingerprint>,
}

/// Target status row for table display.
#[derive(Tabled)]
struct TargetStatusRow {
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Protocol")]
    protocol: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Proxy hash")]
    configuration_hash: String,
    #[tabled(rename = "Last applied")]
    last_applied: String,
}

/// Plan change row for table display.
#[derive(Tabled)]
struct PlanChangeRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Entity")]
    entity: String,
}

#[derive(Serialize)]
struct OutcomeJson<'a> {
    target: &'a str,
    status: PushStatus,
    fingerprint: Fingerprint,
    protocol: Option<&'static str>,
    failure_reason: Option<&'static str>,
    error: Option<String>,
    elapsed_ms: u128,
}

#[derive(Serialize)]
struct PlanJson<'a> {
    target: &'a str,
    created_at: String,
    create: usize,
    update: usize,
    delete: usize,
    changes: Vec<ChangeJson>,
}

#[derive(Serialize)]
struct ChangeJson {
    action: String,
    kind: &'static str,
    key: String,
    id: String,
}

#[derive(Serialize)]
struct ValidationJson<'a> {
    valid: bool,
    errors: Vec<String>,
    warnings: &'a [String],
    entities: usize,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the outcome of one push.
    #[must_use]
    pub fn format_outcome(&self, target: &str, outcome: &PushOutcome) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = OutcomeJson {
                    target,
                    status: outcome.status,
                    fingerprint: outcome.fingerprint,
                    protocol: outcome.protocol.map(|p| p.as_label()),
                    failure_reason: outcome.failure_reason.map(|r| r.as_label()),
                    error: outcome.error.as_ref().map(ToString::to_string),
                    elapsed_ms: outcome.elapsed.as_millis(),
                };
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => match (&outcome.status, &outcome.error) {
                (PushStatus::Applied, _) => format!(
                    "{} {target}: applied {} via {} in {} ms",
                    "✓".green(),
                    outcome.fingerprint.short(),
                    outcome.protocol.map_or("-", |p| p.as_label()),
                    outcome.elapsed.as_millis()
                ),
                (PushStatus::Skipped, _) => format!(
                    "{} {target}: unchanged ({})",
                    "=".dimmed(),
                    outcome.fingerprint.short()
                ),
                (PushStatus::Failed, error) => format!(
                    "{} {target}: failed ({}): {}",
                    "✗".red(),
                    outcome.failure_reason.map_or("other", |r| r.as_label()),
                    error.as_ref().map(ToString::to_string).unwrap_or_default()
                ),
            },
        }
    }

    /// Formats target status rows.
    #[must_use]
    pub fn format_status(&self, statuses: &[TargetStatus]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(statuses).unwrap_or_default(),
            OutputFormat::Text => {
                let rows: Vec<TargetStatusRow> = statuses
                    .iter()
                    .map(|s| TargetStatusRow {
                        target: s.target.clone(),
                        protocol: s.protocol.clone(),
                        version: s.version.clone(),
                        configuration_hash: s
                            .configuration_hash
                            .as_deref()
                            .map_or_else(|| "none".dimmed().to_string(), |h| Self::truncate(h, 12)),
                        last_applied: s
                            .last_applied
                            .map_or_else(|| "none".dimmed().to_string(), |f| f.short()),
                    })
                    .collect();
                format!("{}\n", Table::new(rows))
            }
        }
    }

    /// Formats a reconciled sync plan.
    #[must_use]
    pub fn format_plan(&self, target: &str, plan: &SyncPlan) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = PlanJson {
                    target,
                    created_at: plan.created_at.to_rfc3339(),
                    create: plan.count(ChangeType::Create),
                    update: plan.count(ChangeType::Update),
                    delete: plan.count(ChangeType::Delete),
                    changes: plan
                        .changes()
                        .map(|c| ChangeJson {
                            action: c.change.to_string(),
                            kind: c.kind.singular(),
                            key: c.entity.key.clone(),
                            id: c.entity.id.clone(),
                        })
                        .collect(),
                };
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => Self::format_plan_text(target, plan),
        }
    }

    fn format_plan_text(target: &str, plan: &SyncPlan) -> String {
        if plan.is_empty() {
            return format!("{} {target}: no changes required\n", "✓".green());
        }

        let mut output = String::new();
        let _ = writeln!(output, "\nSync plan for {target}\n");

        let rows: Vec<PlanChangeRow> = plan
            .changes()
            .enumerate()
            .map(|(i, c)| PlanChangeRow {
                index: i + 1,
                action: Self::format_change_type(c.change),
                kind: c.kind.singular().to_string(),
                entity: Self::truncate(&c.entity.key, 48),
            })
            .collect();
        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let _ = write!(
            output,
            "\nPlan: {} to create, {} to update, {} to delete\n",
            plan.count(ChangeType::Create).to_string().green(),
            plan.count(ChangeType::Update).to_string().yellow(),
            plan.count(ChangeType::Delete).to_string().red()
        );
        output
    }

    /// Formats a validation result.
    #[must_use]
    pub fn format_validation(
        &self,
        config: &GatewayConfig,
        result: &ValidationResult,
        show_warnings: bool,
    ) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = ValidationJson {
                    valid: result.is_valid(),
                    errors: result.errors.iter().map(ToString::to_string).collect(),
                    warnings: &result.warnings,
                    entities: config.entity_count(),
                };
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = String::new();
                if result.is_valid() {
                    let _ = writeln!(output, "{} Configuration is valid", "✓".green());
                } else {
                    let _ = writeln!(
                        output,
                        "{} {} validation errors:",
                        "✗".red(),
                        result.error_count()
                    );
                    for error in &result.errors {
                        let _ = writeln!(output, "   - {error}");
                    }
                }

                if show_warnings && !result.warnings.is_empty() {
                    let _ = writeln!(output, "\n{} Warnings:", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }

                let _ = writeln!(output, "\nConfiguration summary:");
                let _ = writeln!(output, "   Format version: {}", config.format_version);
                let _ = writeln!(output, "   Services: {}", config.services.len());
                let _ = writeln!(output, "   Routes: {}", config.routes.len());
                let _ = writeln!(output, "   Consumers: {}", config.consumers.len());
                let _ = writeln!(output, "   Plugins: {}", config.plugins.len());
                let _ = writeln!(output, "   CA certificates: {}", config.ca_certificates.len());
                if !config.select_tags().is_empty() {
                    let _ = writeln!(output, "   Select tags: {}", config.select_tags().join(", "));
                }
                output
            }
        }
    }

    /// Formats a content fingerprint.
    #[must_use]
    pub fn format_fingerprint(&self, fingerprint: &Fingerprint) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&serde_json::json!({ "fingerprint": fingerprint }))
                    .unwrap_or_default()
            }
            OutputFormat::Text => fingerprint.to_hex(),
        }
    }

    /// Formats a change type with color.
    fn format_change_type(change: ChangeType) -> String {
        match change {
            ChangeType::Create => "+create".green().to_string(),
            ChangeType::Update => "~update".yellow().to_string(),
            ChangeType::Delete => "-delete".red().to_string(),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{head}...")
        }
    }
}
