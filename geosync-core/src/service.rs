//! Remote geodata service seam.
//!
//! [`GeodataService`] is the set of primitives the reconciliation engine
//! needs from a session with the remote store. `geosync-osm` implements it
//! over the OSM API 0.6; tests implement it in memory.

use std::collections::BTreeMap;
use std::fmt;

use crate::types::{Coordinates, NodeId};

/// Identifier of an open changeset on the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChangesetId(pub u64);

impl fmt::Display for ChangesetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Descriptive tags sent when a changeset is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangesetTags {
    /// What the changeset does: `create`, `modify` or `delete`.
    pub purpose: String,
    /// Name and version of the uploading tool.
    pub generator: String,
}

/// A node as known to (or about to be sent to) the remote service.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    /// Present for nodes loaded from the service; `None` for new nodes.
    pub version: Option<u64>,
    pub coordinates: Coordinates,
    pub tags: BTreeMap<String, String>,
}

impl Node {
    /// Set `key` to `value`, or drop the tag when `value` is empty.
    pub fn set_tag(&mut self, key: &str, value: &str) {
        if value.is_empty() {
            self.tags.remove(key);
        } else {
            self.tags.insert(key.to_string(), value.to_string());
        }
    }
}

/// One staged change inside a changeset batch.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeMutation {
    Create(Node),
    Modify(Node),
    Delete(Node),
}

impl NodeMutation {
    pub fn node(&self) -> &Node {
        match self {
            NodeMutation::Create(node) | NodeMutation::Modify(node) | NodeMutation::Delete(node) => {
                node
            }
        }
    }
}

/// Submitted node id → final node id, as confirmed by the service.
///
/// Placeholders map to their newly assigned ids; modified and deleted nodes
/// map to themselves.
pub type ConfirmationMap = BTreeMap<NodeId, NodeId>;

/// Session-scoped primitives of a remote geodata store.
///
/// All calls block until the service answers. Implementations decide their
/// own timeout policy.
pub trait GeodataService {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open a new changeset.
    fn open_changeset(&mut self, tags: &ChangesetTags) -> Result<ChangesetId, Self::Error>;

    /// Fetch the current state of an existing node.
    fn load_node(&mut self, id: NodeId) -> Result<Node, Self::Error>;

    /// Submit a batch of mutations to an open changeset in one request.
    fn upload(
        &mut self,
        changeset: ChangesetId,
        mutations: &[NodeMutation],
    ) -> Result<ConfirmationMap, Self::Error>;

    /// Close (commit) a changeset.
    fn close_changeset(&mut self, changeset: ChangesetId) -> Result<(), Self::Error>;
}

impl<S: GeodataService + ?Sized> GeodataService for &mut S {
    type Error = S::Error;

    fn open_changeset(&mut self, tags: &ChangesetTags) -> Result<ChangesetId, Self::Error> {
        (**self).open_changeset(tags)
    }

    fn load_node(&mut self, id: NodeId) -> Result<Node, Self::Error> {
        (**self).load_node(id)
    }

    fn upload(
        &mut self,
        changeset: ChangesetId,
        mutations: &[NodeMutation],
    ) -> Result<ConfirmationMap, Self::Error> {
        (**self).upload(changeset, mutations)
    }

    fn close_changeset(&mut self, changeset: ChangesetId) -> Result<(), Self::Error> {
        (**self).close_changeset(changeset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tag_value_removes_key() {
        let mut node = Node {
            id: NodeId(1),
            version: Some(2),
            coordinates: Coordinates::new(1.0, 1.0).unwrap(),
            tags: BTreeMap::from([("amenity".to_string(), "cafe".to_string())]),
        };
        node.set_tag("amenity", "");
        node.set_tag("building", "yes");
        assert!(!node.tags.contains_key("amenity"));
        assert_eq!(node.tags.get("building").map(String::as_str), Some("yes"));
    }
}
