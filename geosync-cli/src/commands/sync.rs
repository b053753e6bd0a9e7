//! `geosync sync` — upload pending changes and update the journal.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use dialoguer::{Confirm, Input, Password};

use geosync_core::{config, Config, OperationKind};
use geosync_osm::OsmClient;
use geosync_sync::{prepare, ReconcileReport, Reconciler};

use super::plan::{print_summary, print_table};

/// Arguments for `geosync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// CSV file with columns uniqueid,name,amenity,building,latlng.
    pub csv: PathBuf,

    /// Configuration file (defaults to `~/.geosync.json`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Journal file (defaults to `<csv>.log`).
    #[arg(short, long)]
    pub journal: Option<PathBuf>,

    /// Never prompt: upload without confirmation and fail if no
    /// configuration exists.
    #[arg(short, long)]
    pub quiet: bool,

    /// Print the plan and exit without contacting the server.
    #[arg(long)]
    pub dry_run: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let journal_path = super::journal_path(&self.csv, self.journal.clone());
        let prepared = prepare(&self.csv, &journal_path)
            .with_context(|| format!("failed to plan '{}'", self.csv.display()))?;

        print_summary(&prepared);
        if self.dry_run {
            print_table(&prepared.plan.operations());
            println!("[dry-run] nothing uploaded, journal not written");
            return Ok(());
        }
        if prepared.plan.is_empty() {
            println!("✓ '{}' is up to date", self.csv.display());
            return Ok(());
        }

        let config = self.resolve_config()?;
        if !self.quiet && !confirm_upload(config.host())? {
            println!("Aborted; nothing uploaded.");
            return Ok(());
        }

        let mut client = OsmClient::new(&config);
        tracing::debug!(
            "uploading to {} with journal {}",
            client.api_base(),
            journal_path.display()
        );
        let mut journal = prepared.journal;
        let report = Reconciler::new(&mut client, &mut journal, &journal_path)
            .run(prepared.plan)
            .with_context(|| format!("sync failed for '{}'", self.csv.display()))?;

        print_report(&report, &journal_path);
        Ok(())
    }

    fn resolve_config(&self) -> Result<Config> {
        let path = match &self.config {
            Some(path) => path.clone(),
            None => config::default_path().context("could not locate configuration file")?,
        };
        if let Some(config) = config::load(&path)
            .with_context(|| format!("failed to load configuration '{}'", path.display()))?
        {
            return Ok(config);
        }
        if self.quiet {
            bail!("no configuration found at '{}'", path.display());
        }
        prompt_config(&path)
    }
}

fn prompt_config(path: &Path) -> Result<Config> {
    println!("No configuration found; it will be saved to {}", path.display());
    let user: String = Input::new()
        .with_prompt("OSM username")
        .interact_text()
        .context("failed to read username")?;
    let password = Password::new()
        .with_prompt("OSM password")
        .interact()
        .context("failed to read password")?;
    let host: String = Input::new()
        .with_prompt("OSM host")
        .default(config::DEFAULT_HOST.to_string())
        .interact_text()
        .context("failed to read host")?;

    let config = Config::new(user.trim(), password, &host);
    config::save(path, &config)
        .with_context(|| format!("failed to save configuration '{}'", path.display()))?;
    Ok(config)
}

fn confirm_upload(host: &str) -> Result<bool> {
    Confirm::new()
        .with_prompt(format!("Upload to {host}?"))
        .default(true)
        .interact()
        .context("failed to read confirmation")
}

fn print_report(report: &ReconcileReport, journal_path: &Path) {
    println!(
        "✓ Applied {} insertions, {} updates and {} deletions",
        report.applied(OperationKind::Insert),
        report.applied(OperationKind::Update),
        report.applied(OperationKind::Delete),
    );
    for outcome in report.unconfirmed() {
        println!(
            "  {} {} of '{}' was not confirmed; it will be retried next run",
            "!".yellow().bold(),
            outcome.kind,
            outcome.unique_id
        );
    }
    println!("  journal: {}", journal_path.display());
}
