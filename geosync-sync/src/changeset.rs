//! Transactional batches against the remote service.
//!
//! A changeset moves through three states, each a separate type:
//!
//! 1. [`ChangeSet::open`] opens it remotely; mutations are staged locally.
//! 2. [`ChangeSet::submit`] uploads every staged mutation in one request and
//!    yields the confirmation map.
//! 3. [`SubmittedChangeSet::close`] commits it.
//!
//! A changeset cannot be closed before its batch was submitted, and nothing
//! can be staged after submission.

use geosync_core::{
    ChangesetId, ChangesetTags, ConfirmationMap, GeodataService, Node, NodeId, NodeMutation,
    OperationKind,
};

use crate::error::{remote_err, RemoteStage, SyncError};

/// Generator label sent with every changeset.
pub const DEFAULT_GENERATOR: &str = concat!("GeoSync v", env!("CARGO_PKG_VERSION"));

/// Hands out placeholder ids for nodes created in one changeset: -1, -2, …
#[derive(Debug)]
pub struct PlaceholderIds {
    next: i64,
}

impl PlaceholderIds {
    pub fn new() -> Self {
        Self { next: -1 }
    }

    pub fn next_id(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next -= 1;
        id
    }
}

impl Default for PlaceholderIds {
    fn default() -> Self {
        Self::new()
    }
}

/// An open changeset collecting mutations of one operation kind.
pub struct ChangeSet<'s, S: GeodataService> {
    service: &'s mut S,
    id: ChangesetId,
    kind: OperationKind,
    staged: Vec<NodeMutation>,
    placeholders: PlaceholderIds,
}

impl<'s, S: GeodataService> ChangeSet<'s, S> {
    /// Open a changeset tagged with the purpose of `kind`.
    pub fn open(service: &'s mut S, kind: OperationKind, generator: &str) -> Result<Self, SyncError> {
        let tags = ChangesetTags {
            purpose: kind.purpose().to_string(),
            generator: generator.to_string(),
        };
        let id = service
            .open_changeset(&tags)
            .map_err(|e| remote_err(kind, RemoteStage::Open, e))?;
        tracing::info!("opened {} changeset {id}", kind.purpose());
        Ok(Self {
            service,
            id,
            kind,
            staged: Vec::new(),
            placeholders: PlaceholderIds::new(),
        })
    }

    pub fn id(&self) -> ChangesetId {
        self.id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Next placeholder for a node created in this changeset.
    pub fn next_placeholder(&mut self) -> NodeId {
        self.placeholders.next_id()
    }

    /// Fetch the current remote state of `id`.
    pub fn load_node(&mut self, id: NodeId) -> Result<Node, SyncError> {
        self.service
            .load_node(id)
            .map_err(|e| remote_err(self.kind, RemoteStage::Load(id), e))
    }

    pub fn stage(&mut self, mutation: NodeMutation) {
        self.staged.push(mutation);
    }

    pub fn staged(&self) -> &[NodeMutation] {
        &self.staged
    }

    /// Upload every staged mutation in one batch.
    pub fn submit(self) -> Result<SubmittedChangeSet<'s, S>, SyncError> {
        let confirmations = self
            .service
            .upload(self.id, &self.staged)
            .map_err(|e| remote_err(self.kind, RemoteStage::Upload, e))?;
        tracing::info!(
            "uploaded changeset {} ({} staged, {} confirmed)",
            self.id,
            self.staged.len(),
            confirmations.len()
        );
        Ok(SubmittedChangeSet {
            service: self.service,
            id: self.id,
            kind: self.kind,
            confirmations,
        })
    }
}

/// A changeset whose batch has been uploaded and awaits closing.
pub struct SubmittedChangeSet<'s, S: GeodataService> {
    service: &'s mut S,
    id: ChangesetId,
    kind: OperationKind,
    confirmations: ConfirmationMap,
}

impl<'s, S: GeodataService> SubmittedChangeSet<'s, S> {
    pub fn id(&self) -> ChangesetId {
        self.id
    }

    pub fn confirmations(&self) -> &ConfirmationMap {
        &self.confirmations
    }

    /// Give up ownership of the confirmation map, keeping the handle closable.
    pub fn take_confirmations(&mut self) -> ConfirmationMap {
        std::mem::take(&mut self.confirmations)
    }

    pub fn close(self) -> Result<(), SyncError> {
        self.service
            .close_changeset(self.id)
            .map_err(|e| remote_err(self.kind, RemoteStage::Close, e))?;
        tracing::info!("closed {} changeset {}", self.kind.purpose(), self.id);
        Ok(())
    }
}
