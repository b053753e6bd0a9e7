//! Reconciliation entrypoint used by the CLI.
//!
//! [`prepare`] reads the source and journal and computes the plan without
//! touching the network. [`Reconciler::run`] uploads the plan in the fixed
//! phase order insert → update → delete and folds every confirmation back
//! into the journal.
//!
//! ## Journal checkpoints
//!
//! After each phase's batch is confirmed, the journal is updated and saved
//! *before* that phase's changeset is closed. A failure later in the run
//! therefore never loses identifiers the service already assigned. The
//! journal is saved once more when the run completes.

use std::path::{Path, PathBuf};

use chrono::Utc;

use geosync_core::{source, GeodataService, JournalEntry, NodeId, Operation, OperationKind, UniqueId};

use crate::changeset::DEFAULT_GENERATOR;
use crate::diff::{self, ReconciliationPlan};
use crate::error::SyncError;
use crate::journal::{self, Journal};
use crate::upload::{self, PhaseReceipt};

/// Everything needed to decide whether to upload.
#[derive(Debug)]
pub struct Prepared {
    pub journal_path: PathBuf,
    pub journal: Journal,
    pub plan: ReconciliationPlan,
    /// Journal ids with no row in the source; reported, never acted on.
    pub orphaned: Vec<UniqueId>,
}

/// Read `source`, load the journal at `journal_path` and compute the plan.
pub fn prepare(source: &Path, journal_path: &Path) -> Result<Prepared, SyncError> {
    let records = source::read_records(source)?;
    let journal = journal::load(journal_path)?;
    let orphaned = diff::orphaned(&records, &journal)
        .into_iter()
        .cloned()
        .collect();
    let plan = diff::plan(records, &journal);
    plan.check_positions()?;
    tracing::debug!(
        "planned {} inserts, {} updates, {} deletes",
        plan.inserts.len(),
        plan.updates.len(),
        plan.deletes.len()
    );
    Ok(Prepared {
        journal_path: journal_path.to_path_buf(),
        journal,
        plan,
        orphaned,
    })
}

/// Result of one uploaded operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOutcome {
    pub kind: OperationKind,
    pub unique_id: UniqueId,
    /// Id the operation was submitted under (placeholder for inserts).
    pub submitted_id: NodeId,
    /// Confirmed remote id; `None` when the service did not confirm it.
    pub remote_id: Option<NodeId>,
}

impl OperationOutcome {
    pub fn confirmed(&self) -> bool {
        self.remote_id.is_some()
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub outcomes: Vec<OperationOutcome>,
}

impl ReconcileReport {
    /// Confirmed operations of `kind`.
    pub fn applied(&self, kind: OperationKind) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.kind == kind && o.confirmed())
            .count()
    }

    pub fn unconfirmed(&self) -> impl Iterator<Item = &OperationOutcome> {
        self.outcomes.iter().filter(|o| !o.confirmed())
    }
}

/// Drives one upload run against a service session.
pub struct Reconciler<'a, S: GeodataService> {
    service: &'a mut S,
    journal: &'a mut Journal,
    journal_path: PathBuf,
    generator: String,
}

impl<'a, S: GeodataService> Reconciler<'a, S> {
    pub fn new(service: &'a mut S, journal: &'a mut Journal, journal_path: impl Into<PathBuf>) -> Self {
        Self {
            service,
            journal,
            journal_path: journal_path.into(),
            generator: DEFAULT_GENERATOR.to_string(),
        }
    }

    /// Override the generator label sent with each changeset.
    pub fn with_generator(mut self, generator: impl Into<String>) -> Self {
        self.generator = generator.into();
        self
    }

    /// Upload `plan` and persist the journal.
    ///
    /// Phases with nothing to do are skipped without opening a changeset.
    /// The first remote error ends the run; phases already closed stay
    /// committed remotely and their confirmations stay in the journal.
    pub fn run(self, plan: ReconciliationPlan) -> Result<ReconcileReport, SyncError> {
        let Reconciler {
            service,
            journal,
            journal_path,
            generator,
        } = self;
        let ReconciliationPlan {
            inserts,
            updates,
            deletes,
        } = plan;
        let mut report = ReconcileReport::default();

        if inserts.is_empty() {
            tracing::debug!("insert phase skipped");
        } else {
            let outcomes = upload::upload_inserts(&mut *service, inserts, &generator, |receipt| {
                record_phase(&mut *journal, &journal_path, &receipt)
            })?;
            report.outcomes.extend(outcomes);
        }

        if updates.is_empty() {
            tracing::debug!("update phase skipped");
        } else {
            let outcomes = upload::upload_updates(&mut *service, updates, &generator, |receipt| {
                record_phase(&mut *journal, &journal_path, &receipt)
            })?;
            report.outcomes.extend(outcomes);
        }

        if deletes.is_empty() {
            tracing::debug!("delete phase skipped");
        } else {
            let outcomes = upload::upload_deletes(&mut *service, deletes, &generator, |receipt| {
                record_phase(&mut *journal, &journal_path, &receipt)
            })?;
            report.outcomes.extend(outcomes);
        }

        journal.synced_at = Utc::now();
        journal::save(&journal_path, journal)?;
        Ok(report)
    }
}

/// Apply the confirmed part of a phase to the journal and checkpoint it.
///
/// Operations missing from the confirmation map leave the journal untouched,
/// whatever their kind.
fn record_phase(
    journal: &mut Journal,
    journal_path: &Path,
    receipt: &PhaseReceipt,
) -> Result<Vec<OperationOutcome>, SyncError> {
    let mut outcomes = Vec::with_capacity(receipt.staged.len());
    for staged in &receipt.staged {
        let record = staged.operation.record();
        let confirmed = receipt
            .confirmed_id(staged)
            .filter(|id| !id.is_placeholder());

        let remote_id = match (&staged.operation, confirmed) {
            (_, None) => {
                tracing::warn!(
                    "{} of '{}' (node {}) was not confirmed; journal left unchanged",
                    receipt.kind,
                    record.unique_id,
                    staged.submitted_id
                );
                None
            }
            (Operation::Insert(record), Some(new_id)) => {
                journal.upsert(JournalEntry::from_record(record.clone(), new_id));
                tracing::info!(
                    "added node {new_id} ({}: {})",
                    record.unique_id,
                    record.position
                );
                Some(new_id)
            }
            (Operation::Update(linked), Some(_)) => {
                journal.upsert(JournalEntry::from_record(
                    linked.record.clone(),
                    linked.remote_id,
                ));
                tracing::info!(
                    "updated node {} ({}: {})",
                    linked.remote_id,
                    record.unique_id,
                    record.position
                );
                Some(linked.remote_id)
            }
            (Operation::Delete(linked), Some(_)) => {
                journal.remove(&linked.record.unique_id);
                tracing::info!(
                    "deleted node {} ({}: {})",
                    linked.remote_id,
                    record.unique_id,
                    staged.coordinates
                );
                Some(linked.remote_id)
            }
        };

        outcomes.push(OperationOutcome {
            kind: receipt.kind,
            unique_id: record.unique_id.clone(),
            submitted_id: staged.submitted_id,
            remote_id,
        });
    }

    if outcomes.iter().any(OperationOutcome::confirmed) {
        journal.synced_at = Utc::now();
        journal::save(journal_path, journal)?;
    }
    Ok(outcomes)
}
