//! # geosync-sync
//!
//! Journal-driven reconciliation of a record source against a remote
//! geodata service.
//!
//! Call [`reconcile::prepare`] to compute the [`ReconciliationPlan`] for a
//! source file, then [`Reconciler::run`] to upload it and fold the
//! confirmations back into the journal.

pub mod changeset;
pub mod diff;
pub mod error;
pub mod journal;
pub mod reconcile;
pub mod upload;

pub use diff::{PlanCounts, ReconciliationPlan};
pub use error::{RemoteStage, SyncError};
pub use journal::Journal;
pub use reconcile::{prepare, OperationOutcome, Prepared, ReconcileReport, Reconciler};
pub use upload::PhaseReceipt;
