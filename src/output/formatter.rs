use colored::Colorize;
use serde_json::Value;

use crate::config::types::SourceResourceConfig;
use crate::extract::ExtractionWarning;
use crate::output::result::{MigrationReport, Outcome};

/// Print a success message.
pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg.green());
}

/// Print an error message.
pub fn print_error(msg: &str) {
    println!("{} {}", "✗".red().bold(), msg.red());
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    println!("{} {}", "!".yellow().bold(), msg.yellow());
}

/// Print the per-component breakdown of an apply/migrate run.
pub fn print_report(report: &MigrationReport) {
    println!();
    let title = if report.dry_run {
        "Migration plan (dry run)"
    } else {
        "Migration result"
    };
    println!("{}", title.bold().cyan());
    println!("{}", "─".repeat(80));

    for (component, outcome) in &report.components {
        let symbol = match outcome {
            Outcome::Success { .. } => "✓".green().bold(),
            Outcome::Skipped { .. } => "-".dimmed(),
            Outcome::Error { .. } => "✗".red().bold(),
            Outcome::DryRun { .. } => "~".yellow().bold(),
        };
        let status = match outcome {
            Outcome::Success { .. } => outcome.status().green(),
            Outcome::Skipped { .. } => outcome.status().dimmed(),
            Outcome::Error { .. } => outcome.status().red(),
            Outcome::DryRun { .. } => outcome.status().yellow(),
        };
        println!("  {} {:<18} {:<10} {}", symbol, component.bold(), status, outcome.message());

        if let Some(Value::Object(detail)) = outcome.detail() {
            for (key, value) in detail {
                println!("      {:<24} {}", key.dimmed(), format_value_short(value));
            }
        }
    }

    println!("{}", "─".repeat(80));
    let errors = report.error_count();
    if errors == 0 {
        println!("  {} component(s), no errors.", report.components.len());
    } else {
        println!(
            "  {} component(s), {}.",
            report.components.len(),
            format!("{} with errors", errors).red()
        );
    }
    println!();
}

/// Print a summary of an extracted source config.
pub fn print_source_summary(config: &SourceResourceConfig, warnings: &[ExtractionWarning]) {
    println!();
    println!("{} {}", "Cluster:".bold().cyan(), config.identifier.bold());
    println!("{}", "─".repeat(60));
    println!("  {:<20} {}", "VPC:".bold(), config.network.vpc_id);
    println!("  {:<20} {}", "Subnets:".bold(), config.network.subnet_ids.join(", "));
    println!(
        "  {:<20} {}",
        "Security groups:".bold(),
        config.network.security_group_ids.join(", ")
    );
    println!("  {:<20} {}", "IAM roles:".bold(), config.iam_roles.len());
    if let Some(role) = config.default_role() {
        println!("  {:<20} {}", "Default role:".bold(), role);
    }
    if let Some(pg) = &config.parameter_group {
        println!(
            "  {:<20} {} ({} non-default)",
            "Parameter group:".bold(),
            pg.name,
            pg.parameters.len()
        );
    }
    println!("  {:<20} {}", "Scheduled tasks:".bold(), config.scheduled_tasks.len());
    println!("  {:<20} {}", "Usage limits:".bold(), config.usage_limits.len());
    println!("  {:<20} {}", "Tags:".bold(), config.tags.len());

    for warning in warnings {
        print_warning(&warning.to_string());
    }
    println!();
}

/// Format a JSON value for short inline display.
fn format_value_short(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        Value::Null => "(none)".dimmed().to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(arr) => {
            if arr.is_empty() {
                "[]".to_string()
            } else if arr.len() <= 4 && arr.iter().all(|v| matches!(v, Value::String(_))) {
                let items: Vec<String> = arr.iter().map(format_value_short).collect();
                format!("[{}]", items.join(", "))
            } else {
                format!("[...{} items]", arr.len())
            }
        }
        Value::Object(obj) => {
            if obj.is_empty() {
                "{}".to_string()
            } else if obj.len() <= 4 {
                let items: Vec<String> = obj
                    .iter()
                    .map(|(k, v)| format!("{} = {}", k, format_value_short(v)))
                    .collect();
                format!("{{ {} }}", items.join(", "))
            } else {
                format!("{{...{} keys}}", obj.len())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn short_values() {
        colored::control::set_override(false);
        assert_eq!(format_value_short(&json!(["a", "b"])), "[\"a\", \"b\"]");
        assert_eq!(format_value_short(&json!([1, 2, 3, 4, 5])), "[...5 items]");
        assert_eq!(format_value_short(&json!({"k": true})), "{ k = true }");
        assert_eq!(format_value_short(&Value::Null), "(none)");
    }
}
