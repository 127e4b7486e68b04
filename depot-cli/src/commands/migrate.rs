//! Schema migration command

use anyhow::{Context, Result};
use clap::Parser;
use depot_repo::{MigrationReport, MigrationStatus, Repository};

use crate::config::DepotConfig;

/// Arguments for the migrate command
#[derive(Parser, Debug)]
pub struct MigrateArgs {
    /// Report current and pending versions without migrating
    #[arg(long)]
    pub status: bool,
}

/// Connect, run (or report) migrations, disconnect.
pub async fn run_migrate(args: MigrateArgs, config: &DepotConfig) -> Result<()> {
    let mut settings = config.to_repository_settings();
    // migrations run explicitly below, not as part of start
    settings.migrations.enabled = false;

    let mut repo = Repository::new(settings);
    repo.start()
        .await
        .context("Failed to start repository")?;

    let outcome = if args.status {
        repo.migration_status().await.map(|status| {
            println!("{}", describe_status(&status));
        })
    } else {
        repo.migrate().await.map(|report| {
            println!("{}", describe_report(&report));
        })
    };

    repo.stop().await.context("Failed to stop repository")?;
    outcome.context("Migration failed")?;
    Ok(())
}

fn describe_status(status: &MigrationStatus) -> String {
    if status.pending.is_empty() {
        format!("schema at version {}, up to date", status.current)
    } else {
        format!(
            "schema at version {}, pending: {}",
            status.current,
            join_versions(&status.pending)
        )
    }
}

fn describe_report(report: &MigrationReport) -> String {
    if report.is_noop() {
        format!("schema at version {}, nothing to apply", report.to)
    } else {
        format!(
            "migrated {} -> {} (applied {})",
            report.from,
            report.to,
            join_versions(&report.applied)
        )
    }
}

fn join_versions(versions: &[i64]) -> String {
    versions
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
