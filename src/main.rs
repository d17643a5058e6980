use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Reset SIGPIPE to default behavior so piping (e.g. `redshift-migrate extract --json | jq`)
/// exits cleanly instead of panicking on broken pipe.
#[cfg(unix)]
fn reset_sigpipe() {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }
}

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use redshift_migrate::config::loader;
use redshift_migrate::config::settings::Settings;
use redshift_migrate::config::types::ApplyOptions;
use redshift_migrate::executor::MigrationEngine;
use redshift_migrate::output::formatter;
use redshift_migrate::output::MigrationReport;
use redshift_migrate::provider::aws::AwsControlPlane;

/// redshift-migrate - move a provisioned cluster onto a serverless namespace and workgroup
#[derive(Parser)]
#[command(name = "redshift-migrate", version, about, long_about = None)]
struct Cli {
    /// Settings file (YAML) with poll budgets, retry policy and defaults
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Region override; defaults to the environment's configured region
    #[arg(short, long)]
    region: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a cluster's configuration
    Extract {
        /// Source cluster identifier
        #[arg(long)]
        cluster_id: String,

        /// Write the extracted configuration to this JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the configuration as JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply a previously extracted configuration to a serverless target
    Apply {
        /// Extracted configuration file
        #[arg(short, long)]
        config: PathBuf,

        #[command(flatten)]
        options: ApplyArgs,
    },

    /// Extract and apply in one step
    Migrate {
        /// Source cluster identifier
        #[arg(long)]
        cluster_id: String,

        #[command(flatten)]
        options: ApplyArgs,
    },
}

#[derive(Args)]
struct ApplyArgs {
    /// Target workgroup name (defaults to the cluster identifier)
    #[arg(long)]
    workgroup: Option<String>,

    /// Target namespace name (defaults to the workgroup name)
    #[arg(long)]
    namespace: Option<String>,

    /// Create the namespace and workgroup if they do not exist
    #[arg(long)]
    create_if_missing: bool,

    /// Snapshot the cluster and restore it into the new target
    #[arg(long)]
    create_snapshot: bool,

    /// Restore this existing snapshot into the new target
    #[arg(long)]
    snapshot_name: Option<String>,

    /// Restore the cluster's most recent manual snapshot
    #[arg(long)]
    use_latest_snapshot: bool,

    /// Admin user for a newly created namespace
    #[arg(long)]
    admin_username: Option<String>,

    /// Admin password for a newly created namespace (generated if omitted)
    #[arg(long, env = "REDSHIFT_MIGRATE_ADMIN_PASSWORD", hide_env_values = true)]
    admin_password: Option<String>,

    /// Maximum capacity (RPUs) for a newly created workgroup
    #[arg(long)]
    max_capacity: Option<i32>,

    /// Show what would be done without changing anything
    #[arg(long)]
    dry_run: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

impl ApplyArgs {
    fn to_options(&self) -> ApplyOptions {
        ApplyOptions {
            workgroup_name: self.workgroup.clone(),
            namespace_name: self.namespace.clone(),
            create_if_missing: self.create_if_missing,
            create_snapshot: self.create_snapshot,
            snapshot_name: self.snapshot_name.clone(),
            use_latest_snapshot: self.use_latest_snapshot,
            admin_username: self.admin_username.clone(),
            admin_password: self.admin_password.clone(),
            max_capacity: self.max_capacity,
            dry_run: self.dry_run,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    #[cfg(unix)]
    reset_sigpipe();

    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut settings = match &cli.settings {
        Some(path) => Settings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::default(),
    };
    if cli.region.is_some() {
        settings.region = cli.region.clone();
    }

    let plane = Arc::new(AwsControlPlane::new(settings.region.clone()).await);
    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());
    let engine = MigrationEngine::new(plane, settings).with_cancellation(cancel);
    tracing::debug!(region = ?engine.settings().region, "Engine ready");

    let failed = match cli.command {
        Commands::Extract {
            ref cluster_id,
            ref output,
            json,
        } => cmd_extract(&engine, cluster_id, output.as_deref(), json).await?,
        Commands::Apply {
            ref config,
            ref options,
        } => cmd_apply(&engine, config, options).await?,
        Commands::Migrate {
            ref cluster_id,
            ref options,
        } => cmd_migrate(&engine, cluster_id, options).await?,
    };

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// First Ctrl-C cancels the running workflow at its next poll boundary.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Interrupted, stopping at the next checkpoint...".yellow());
            cancel.cancel();
        }
    });
}

/// Render a report and tell the caller whether any component failed.
fn render_report(report: &MigrationReport, json: bool) -> Result<bool> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        formatter::print_report(report);
        if report.has_errors() {
            formatter::print_error(&format!("{} component(s) failed", report.error_count()));
        } else if report.dry_run {
            formatter::print_success("Dry run complete. No changes were made.");
        } else {
            formatter::print_success("Migration complete.");
        }
    }
    Ok(report.has_errors())
}

// ─── Commands ────────────────────────────────────────────────────────────────

async fn cmd_extract(
    engine: &MigrationEngine<AwsControlPlane>,
    cluster_id: &str,
    output: Option<&Path>,
    json: bool,
) -> Result<bool> {
    let extraction = engine
        .extract_with_warnings(cluster_id)
        .await
        .with_context(|| format!("Failed to extract cluster {}", cluster_id))?;

    if let Some(path) = output {
        loader::save_config(&extraction.config, path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&extraction.config)?);
    } else {
        formatter::print_source_summary(&extraction.config, &extraction.warnings);
        if let Some(path) = output {
            formatter::print_success(&format!("Configuration saved to {}", path.display()));
        }
    }
    Ok(false)
}

async fn cmd_apply(
    engine: &MigrationEngine<AwsControlPlane>,
    config_path: &Path,
    args: &ApplyArgs,
) -> Result<bool> {
    let config = loader::load_config(config_path)
        .with_context(|| format!("Failed to read {}", config_path.display()))?;
    let report = engine
        .apply(&config, &args.to_options())
        .await
        .with_context(|| format!("Failed to apply configuration of {}", config.identifier))?;
    render_report(&report, args.json)
}

async fn cmd_migrate(
    engine: &MigrationEngine<AwsControlPlane>,
    cluster_id: &str,
    args: &ApplyArgs,
) -> Result<bool> {
    let report = engine
        .migrate(cluster_id, &args.to_options())
        .await
        .with_context(|| format!("Failed to migrate cluster {}", cluster_id))?;
    render_report(&report, args.json)
}
