//! `geosync plan` — show pending operations without contacting the server.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use geosync_core::{Operation, OperationKind, UniqueId};
use geosync_sync::{prepare, PlanCounts, Prepared};

/// Arguments for `geosync plan`.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// CSV file with columns uniqueid,name,amenity,building,latlng.
    pub csv: PathBuf,

    /// Journal file (defaults to `<csv>.log`).
    #[arg(short, long)]
    pub journal: Option<PathBuf>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl PlanArgs {
    pub fn run(self) -> Result<()> {
        let journal_path = super::journal_path(&self.csv, self.journal);
        let prepared = prepare(&self.csv, &journal_path)
            .with_context(|| format!("failed to plan '{}'", self.csv.display()))?;

        if self.json {
            return print_json(&prepared);
        }
        print_summary(&prepared);
        print_table(&prepared.plan.operations());
        Ok(())
    }
}

#[derive(Serialize)]
struct PlanJson<'a> {
    journal: String,
    counts: PlanCounts,
    operations: Vec<Operation>,
    orphaned: &'a [UniqueId],
}

#[derive(Tabled)]
struct OperationRow {
    #[tabled(rename = "op")]
    op: String,
    #[tabled(rename = "unique id")]
    unique_id: String,
    #[tabled(rename = "node")]
    node: String,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "latlng")]
    position: String,
}

fn print_json(prepared: &Prepared) -> Result<()> {
    let payload = PlanJson {
        journal: prepared.journal_path.display().to_string(),
        counts: prepared.plan.counts(),
        operations: prepared.plan.operations(),
        orphaned: &prepared.orphaned,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize plan JSON")?
    );
    Ok(())
}

/// Counts line plus a warning for journal ids no longer in the source.
pub fn print_summary(prepared: &Prepared) {
    let counts = prepared.plan.counts();
    println!(
        "Found {} insertions, {} updates and {} deletions",
        counts.inserts, counts.updates, counts.deletes
    );
    if !prepared.orphaned.is_empty() {
        let ids: Vec<&str> = prepared.orphaned.iter().map(|id| id.0.as_str()).collect();
        println!(
            "{} {} journal entr{} no longer in the source (left untouched): {}",
            "warning:".yellow().bold(),
            ids.len(),
            if ids.len() == 1 { "y is" } else { "ies are" },
            ids.join(", ")
        );
    }
}

pub fn print_table(operations: &[Operation]) {
    if operations.is_empty() {
        println!("Nothing to do.");
        return;
    }
    let rows: Vec<OperationRow> = operations
        .iter()
        .map(|operation| {
            let record = operation.record();
            OperationRow {
                op: kind_label(operation.kind()),
                unique_id: record.unique_id.to_string(),
                node: operation
                    .remote_id()
                    .map_or_else(|| "new".to_string(), |id| id.to_string()),
                name: record.name.clone(),
                position: record.position.to_string(),
            }
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn kind_label(kind: OperationKind) -> String {
    match kind {
        OperationKind::Insert => "insert".green().to_string(),
        OperationKind::Update => "update".yellow().to_string(),
        OperationKind::Delete => "delete".red().to_string(),
    }
}
