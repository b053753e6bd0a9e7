//! Classification of source records against the journal.
//!
//! Each record lands in at most one of three buckets, in source order:
//!
//! | journal entry | attributes | position | result  |
//! |---------------|------------|----------|---------|
//! | absent        | —          | —        | insert  |
//! | present       | equal      | —        | nothing |
//! | present       | differ     | empty    | delete  |
//! | present       | differ     | set      | update  |

use std::collections::HashSet;

use serde::Serialize;

use geosync_core::{Linked, Operation, OperationKind, Record, UniqueId};

use crate::error::SyncError;
use crate::journal::Journal;

/// The operations a run has to upload, grouped by phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationPlan {
    pub inserts: Vec<Record>,
    pub updates: Vec<Linked>,
    pub deletes: Vec<Linked>,
}

/// Number of pending operations per phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanCounts {
    pub inserts: usize,
    pub updates: usize,
    pub deletes: usize,
}

impl PlanCounts {
    pub fn get(&self, kind: OperationKind) -> usize {
        match kind {
            OperationKind::Insert => self.inserts,
            OperationKind::Update => self.updates,
            OperationKind::Delete => self.deletes,
        }
    }
}

impl ReconciliationPlan {
    pub fn counts(&self) -> PlanCounts {
        PlanCounts {
            inserts: self.inserts.len(),
            updates: self.updates.len(),
            deletes: self.deletes.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.inserts.len() + self.updates.len() + self.deletes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All operations in upload order: inserts, then updates, then deletes.
    pub fn operations(&self) -> Vec<Operation> {
        self.inserts
            .iter()
            .cloned()
            .map(Operation::Insert)
            .chain(self.updates.iter().cloned().map(Operation::Update))
            .chain(self.deletes.iter().cloned().map(Operation::Delete))
            .collect()
    }

    /// Reject a plan containing a record that cannot be placed on the map.
    ///
    /// A new record with a blank position has nothing to create; it is an
    /// input error, reported before anything is uploaded.
    pub fn check_positions(&self) -> Result<(), SyncError> {
        let placed = self
            .inserts
            .iter()
            .map(|r| (OperationKind::Insert, r))
            .chain(self.updates.iter().map(|l| (OperationKind::Update, &l.record)));
        for (phase, record) in placed {
            if let Err(source) = record.position.coordinates() {
                return Err(SyncError::Position {
                    phase,
                    id: record.unique_id.clone(),
                    source,
                });
            }
        }
        Ok(())
    }

    fn push(&mut self, operation: Operation) {
        match operation {
            Operation::Insert(record) => self.inserts.push(record),
            Operation::Update(linked) => self.updates.push(linked),
            Operation::Delete(linked) => self.deletes.push(linked),
        }
    }
}

/// Classify a single record. `None` means the journal is already up to date.
pub fn classify(record: Record, journal: &Journal) -> Option<Operation> {
    let Some(entry) = journal.get(&record.unique_id) else {
        return Some(Operation::Insert(record));
    };
    if record.matches(entry) {
        return None;
    }
    let linked = Linked {
        remote_id: entry.remote_id,
        record,
    };
    if linked.record.position.is_empty() {
        Some(Operation::Delete(linked))
    } else {
        Some(Operation::Update(linked))
    }
}

/// Partition `records` into the operations needed to bring the remote store
/// in line with them.
pub fn plan(records: Vec<Record>, journal: &Journal) -> ReconciliationPlan {
    let mut plan = ReconciliationPlan::default();
    for record in records {
        if let Some(operation) = classify(record, journal) {
            tracing::debug!(
                "{}: {}",
                operation.kind(),
                operation.record().unique_id
            );
            plan.push(operation);
        }
    }
    plan
}

/// Journal ids that no longer appear in the source.
///
/// These are never deleted remotely; removing a row from the source is not a
/// deletion request. Blank the position instead.
pub fn orphaned<'j>(records: &[Record], journal: &'j Journal) -> Vec<&'j UniqueId> {
    let present: HashSet<&UniqueId> = records.iter().map(|r| &r.unique_id).collect();
    journal
        .entries
        .keys()
        .filter(|id| !present.contains(id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geosync_core::{JournalEntry, NodeId, Position};
    use rstest::rstest;

    fn record(uid: &str, name: &str, amenity: &str, position: &str) -> Record {
        Record {
            unique_id: UniqueId::from(uid),
            name: name.to_string(),
            amenity: amenity.to_string(),
            building: String::new(),
            position: Position::from(position),
        }
    }

    fn journal_with(records: &[(Record, i64)]) -> Journal {
        let mut journal = Journal::default();
        for (record, id) in records {
            journal.upsert(JournalEntry::from_record(record.clone(), NodeId(*id)));
        }
        journal
    }

    #[rstest]
    #[case::unknown_id(record("B", "Y", "cafe", "2,2"), Some(OperationKind::Insert))]
    #[case::unknown_id_blank_position(record("B", "Y", "", ""), Some(OperationKind::Insert))]
    #[case::unchanged(record("A", "X", "", "1,1"), None)]
    #[case::renamed(record("A", "Z", "", "1,1"), Some(OperationKind::Update))]
    #[case::moved(record("A", "X", "", "1,2"), Some(OperationKind::Update))]
    #[case::retagged(record("A", "X", "pub", "1,1"), Some(OperationKind::Update))]
    #[case::blanked(record("A", "X", "", ""), Some(OperationKind::Delete))]
    fn classification(#[case] input: Record, #[case] expected: Option<OperationKind>) {
        let journal = journal_with(&[(record("A", "X", "", "1,1"), 100)]);
        let kind = classify(input, &journal).map(|op| op.kind());
        assert_eq!(kind, expected);
    }

    #[test]
    fn update_and_delete_carry_journal_remote_id() {
        let journal = journal_with(&[
            (record("A", "X", "", "1,1"), 100),
            (record("C", "W", "", "3,3"), 300),
        ]);
        let plan = plan(
            vec![record("A", "X", "", ""), record("C", "W2", "", "3,3")],
            &journal,
        );
        assert_eq!(plan.deletes[0].remote_id, NodeId(100));
        assert_eq!(plan.updates[0].remote_id, NodeId(300));
    }

    #[test]
    fn buckets_are_disjoint_and_keep_source_order() {
        let journal = journal_with(&[
            (record("A", "X", "", "1,1"), 100),
            (record("C", "W", "", "3,3"), 300),
            (record("D", "V", "", "4,4"), 400),
        ]);
        let source = vec![
            record("E", "new", "", "5,5"),
            record("A", "X", "", ""),
            record("C", "W", "", "3,3"),
            record("B", "Y", "cafe", "2,2"),
            record("D", "V", "bar", "4,4"),
        ];
        let plan = plan(source, &journal);

        let ids = |records: Vec<&Record>| -> Vec<String> {
            records.iter().map(|r| r.unique_id.0.clone()).collect()
        };
        assert_eq!(ids(plan.inserts.iter().collect()), ["E", "B"]);
        assert_eq!(ids(plan.updates.iter().map(|l| &l.record).collect()), ["D"]);
        assert_eq!(ids(plan.deletes.iter().map(|l| &l.record).collect()), ["A"]);
        assert_eq!(plan.len(), 4, "unchanged record C must not be planned");
    }

    #[test]
    fn operations_follow_phase_order() {
        let journal = journal_with(&[
            (record("A", "X", "", "1,1"), 100),
            (record("C", "W", "", "3,3"), 300),
        ]);
        let plan = plan(
            vec![
                record("A", "X", "", ""),
                record("C", "W", "pub", "3,3"),
                record("B", "Y", "cafe", "2,2"),
            ],
            &journal,
        );
        let kinds: Vec<_> = plan.operations().iter().map(Operation::kind).collect();
        assert_eq!(
            kinds,
            [
                OperationKind::Insert,
                OperationKind::Update,
                OperationKind::Delete
            ]
        );
        assert_eq!(plan.counts().get(OperationKind::Update), 1);
    }

    #[test]
    fn rows_missing_from_source_are_reported_not_planned() {
        let journal = journal_with(&[
            (record("A", "X", "", "1,1"), 100),
            (record("Z", "gone", "", "9,9"), 900),
        ]);
        let source = vec![record("A", "X", "", "1,1")];

        assert_eq!(orphaned(&source, &journal), [&UniqueId::from("Z")]);
        assert!(plan(source, &journal).is_empty());
    }

    #[test]
    fn new_record_without_position_fails_position_check() {
        let journal = journal_with(&[(record("A", "X", "", "1,1"), 100)]);
        let plan = plan(
            vec![record("A", "X", "", ""), record("N", "never-uploaded", "", "")],
            &journal,
        );
        assert_eq!(plan.counts().inserts, 1);

        match plan.check_positions().unwrap_err() {
            SyncError::Position { phase, id, source } => {
                assert_eq!(phase, OperationKind::Insert);
                assert_eq!(id, UniqueId::from("N"));
                assert_eq!(source, geosync_core::PositionError::Empty);
            }
            other => panic!("expected position error, got {other:?}"),
        }
    }

    #[test]
    fn blanked_known_record_passes_position_check() {
        let journal = journal_with(&[(record("A", "X", "", "1,1"), 100)]);
        let plan = plan(vec![record("A", "X", "", "")], &journal);
        assert!(plan.check_positions().is_ok());
    }
}
