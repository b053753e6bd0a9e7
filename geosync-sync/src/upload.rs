//! Changeset uploader, one phase per operation kind.
//!
//! Every phase follows the same protocol:
//!
//! 1. Parse the coordinates of every record to be placed, once.
//! 2. Open a changeset tagged `create`, `modify` or `delete`.
//! 3. Stage one node mutation per operation (loading existing nodes first).
//! 4. Submit the batch once.
//! 5. Hand the [`PhaseReceipt`] to the caller's `on_submitted` hook.
//! 6. Close the changeset.
//!
//! Any remote failure aborts the phase immediately; nothing is retried.

use std::collections::BTreeMap;

use geosync_core::{
    ChangesetId, ConfirmationMap, Coordinates, GeodataService, Linked, Node, NodeId,
    NodeMutation, Operation, OperationKind, Record,
};

use crate::changeset::ChangeSet;
use crate::error::SyncError;

/// Tag carrying the record name.
pub const NAME_TAG: &str = "name:en";
/// Tag carrying the record amenity.
pub const AMENITY_TAG: &str = "amenity";
/// Tag carrying the record building type.
pub const BUILDING_TAG: &str = "building";

/// An operation as it was staged in a changeset.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedOperation {
    pub operation: Operation,
    /// Placeholder for inserts, existing remote id otherwise.
    pub submitted_id: NodeId,
    /// Position of the staged node (the remote position for deletes).
    pub coordinates: Coordinates,
}

/// What a phase submitted and what the service confirmed.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseReceipt {
    pub kind: OperationKind,
    pub changeset: ChangesetId,
    pub staged: Vec<StagedOperation>,
    pub confirmations: ConfirmationMap,
}

impl PhaseReceipt {
    /// Final remote id of a staged operation, if the service confirmed it.
    pub fn confirmed_id(&self, staged: &StagedOperation) -> Option<NodeId> {
        self.confirmations.get(&staged.submitted_id).copied()
    }
}

/// Create one node per record, keyed by placeholder ids.
pub fn upload_inserts<S, T, F>(
    service: &mut S,
    records: Vec<Record>,
    generator: &str,
    on_submitted: F,
) -> Result<T, SyncError>
where
    S: GeodataService,
    F: FnOnce(PhaseReceipt) -> Result<T, SyncError>,
{
    let operations = records.into_iter().map(Operation::Insert).collect();
    run_phase(service, OperationKind::Insert, operations, generator, on_submitted)
}

/// Move and retag existing nodes.
pub fn upload_updates<S, T, F>(
    service: &mut S,
    updates: Vec<Linked>,
    generator: &str,
    on_submitted: F,
) -> Result<T, SyncError>
where
    S: GeodataService,
    F: FnOnce(PhaseReceipt) -> Result<T, SyncError>,
{
    let operations = updates.into_iter().map(Operation::Update).collect();
    run_phase(service, OperationKind::Update, operations, generator, on_submitted)
}

/// Delete existing nodes.
pub fn upload_deletes<S, T, F>(
    service: &mut S,
    deletes: Vec<Linked>,
    generator: &str,
    on_submitted: F,
) -> Result<T, SyncError>
where
    S: GeodataService,
    F: FnOnce(PhaseReceipt) -> Result<T, SyncError>,
{
    let operations = deletes.into_iter().map(Operation::Delete).collect();
    run_phase(service, OperationKind::Delete, operations, generator, on_submitted)
}

fn run_phase<S, T, F>(
    service: &mut S,
    kind: OperationKind,
    operations: Vec<Operation>,
    generator: &str,
    on_submitted: F,
) -> Result<T, SyncError>
where
    S: GeodataService,
    F: FnOnce(PhaseReceipt) -> Result<T, SyncError>,
{
    // Step 1: resolve coordinates before anything is opened remotely.
    let pending = operations
        .iter()
        .map(Pending::resolve)
        .collect::<Result<Vec<_>, _>>()?;

    // Steps 2-3: open and stage.
    let mut changeset = ChangeSet::open(service, kind, generator)?;
    let mut placements = Vec::with_capacity(pending.len());
    for item in &pending {
        placements.push(stage(&mut changeset, item)?);
    }
    drop(pending);
    let staged = operations
        .into_iter()
        .zip(placements)
        .map(|(operation, (submitted_id, coordinates))| StagedOperation {
            operation,
            submitted_id,
            coordinates,
        })
        .collect();

    // Step 4: one batch upload.
    let mut submitted = changeset.submit()?;
    let receipt = PhaseReceipt {
        kind,
        changeset: submitted.id(),
        staged,
        confirmations: submitted.take_confirmations(),
    };

    // Steps 5-6: let the caller record the outcome, then commit.
    let output = on_submitted(receipt)?;
    submitted.close()?;
    Ok(output)
}

/// An operation with its local position already parsed.
#[derive(Debug)]
enum Pending<'o> {
    Create(&'o Record, Coordinates),
    Modify(&'o Linked, Coordinates),
    Remove(&'o Linked),
}

impl<'o> Pending<'o> {
    fn resolve(operation: &'o Operation) -> Result<Self, SyncError> {
        Ok(match operation {
            Operation::Insert(record) => Pending::Create(record, coordinates_of(operation)?),
            Operation::Update(linked) => Pending::Modify(linked, coordinates_of(operation)?),
            Operation::Delete(linked) => Pending::Remove(linked),
        })
    }
}

fn stage<S: GeodataService>(
    changeset: &mut ChangeSet<'_, S>,
    pending: &Pending<'_>,
) -> Result<(NodeId, Coordinates), SyncError> {
    match *pending {
        Pending::Create(record, coordinates) => {
            let mut node = Node {
                id: changeset.next_placeholder(),
                version: None,
                coordinates,
                tags: BTreeMap::new(),
            };
            apply_attributes(&mut node, record);
            let id = node.id;
            changeset.stage(NodeMutation::Create(node));
            Ok((id, coordinates))
        }
        Pending::Modify(linked, coordinates) => {
            let mut node = changeset.load_node(linked.remote_id)?;
            node.coordinates = coordinates;
            apply_attributes(&mut node, &linked.record);
            changeset.stage(NodeMutation::Modify(node));
            Ok((linked.remote_id, coordinates))
        }
        Pending::Remove(linked) => {
            let node = changeset.load_node(linked.remote_id)?;
            let coordinates = node.coordinates;
            changeset.stage(NodeMutation::Delete(node));
            Ok((linked.remote_id, coordinates))
        }
    }
}

fn coordinates_of(operation: &Operation) -> Result<Coordinates, SyncError> {
    let record = operation.record();
    record
        .position
        .coordinates()
        .map_err(|source| SyncError::Position {
            phase: operation.kind(),
            id: record.unique_id.clone(),
            source,
        })
}

/// Write the record attributes onto `node`; other tags are left alone.
fn apply_attributes(node: &mut Node, record: &Record) {
    node.set_tag(NAME_TAG, &record.name);
    node.set_tag(AMENITY_TAG, &record.amenity);
    node.set_tag(BUILDING_TAG, &record.building);
}
