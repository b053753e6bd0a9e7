//! Domain types for geosync.
//!
//! Attribute fields are kept as the raw text read from the source so the
//! differ can compare them byte-for-byte against the journal.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PositionError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Stable, source-assigned identifier of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UniqueId(pub String);

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for UniqueId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UniqueId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Identifier of a node on the remote service.
///
/// Negative values are placeholders that only exist inside one create
/// changeset; the service replaces them with permanent positive ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub i64);

impl NodeId {
    pub fn is_placeholder(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i64> for NodeId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Raw `"lat,lon"` text of a record. Empty means the record should be deleted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Position(pub String);

impl Position {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse the text into coordinates.
    ///
    /// Accepts exactly two comma-separated decimal numbers, surrounding
    /// whitespace allowed, within the WGS84 latitude/longitude ranges.
    pub fn coordinates(&self) -> Result<Coordinates, PositionError> {
        if self.is_empty() {
            return Err(PositionError::Empty);
        }
        let mut parts = self.0.split(',');
        let (Some(lat), Some(lon), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(PositionError::Malformed(self.0.clone()));
        };
        let parse = |s: &str| {
            s.trim()
                .parse::<f64>()
                .map_err(|_| PositionError::Malformed(self.0.clone()))
        };
        Coordinates::new(parse(lat)?, parse(lon)?)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for Position {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for Position {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A validated latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Result<Self, PositionError> {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(PositionError::OutOfRange { lat, lon });
        }
        Ok(Self { lat, lon })
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lon)
    }
}

// ---------------------------------------------------------------------------
// Records and journal entries
// ---------------------------------------------------------------------------

/// One geographic entity as described by the record source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub unique_id: UniqueId,
    pub name: String,
    pub amenity: String,
    pub building: String,
    pub position: Position,
}

impl Record {
    /// True when every attribute field equals the journaled state.
    pub fn matches(&self, entry: &JournalEntry) -> bool {
        self.name == entry.name
            && self.amenity == entry.amenity
            && self.building == entry.building
            && self.position == entry.position
    }
}

/// Last confirmed synchronized state of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub unique_id: UniqueId,
    pub name: String,
    pub amenity: String,
    pub building: String,
    pub position: Position,
    pub remote_id: NodeId,
}

impl JournalEntry {
    pub fn from_record(record: Record, remote_id: NodeId) -> Self {
        Self {
            unique_id: record.unique_id,
            name: record.name,
            amenity: record.amenity,
            building: record.building,
            position: record.position,
            remote_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// The three kinds of remote mutation, in the order they are uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Insert,
    Update,
    Delete,
}

impl OperationKind {
    /// Upload order of the phases.
    pub fn all() -> &'static [OperationKind] {
        &[OperationKind::Insert, OperationKind::Update, OperationKind::Delete]
    }

    /// Purpose tag of the changeset carrying this kind of operation.
    pub fn purpose(self) -> &'static str {
        match self {
            OperationKind::Insert => "create",
            OperationKind::Update => "modify",
            OperationKind::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Insert => write!(f, "insert"),
            OperationKind::Update => write!(f, "update"),
            OperationKind::Delete => write!(f, "delete"),
        }
    }
}

/// A record paired with the remote node it is already linked to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Linked {
    pub record: Record,
    pub remote_id: NodeId,
}

/// A pending change to the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Operation {
    Insert(Record),
    Update(Linked),
    Delete(Linked),
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Insert(_) => OperationKind::Insert,
            Operation::Update(_) => OperationKind::Update,
            Operation::Delete(_) => OperationKind::Delete,
        }
    }

    pub fn record(&self) -> &Record {
        match self {
            Operation::Insert(record) => record,
            Operation::Update(linked) | Operation::Delete(linked) => &linked.record,
        }
    }

    /// Remote id the operation targets; `None` for inserts.
    pub fn remote_id(&self) -> Option<NodeId> {
        match self {
            Operation::Insert(_) => None,
            Operation::Update(linked) | Operation::Delete(linked) => Some(linked.remote_id),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn record(position: &str) -> Record {
        Record {
            unique_id: UniqueId::from("A"),
            name: "X".to_string(),
            amenity: String::new(),
            building: String::new(),
            position: Position::from(position),
        }
    }

    #[test]
    fn position_parses_lat_lon_pair() {
        let coords = Position::from("51.5, -0.12").coordinates().unwrap();
        assert_eq!(coords.lat, 51.5);
        assert_eq!(coords.lon, -0.12);
    }

    #[test]
    fn position_rejects_wrong_arity_and_garbage() {
        assert!(matches!(
            Position::from("1").coordinates(),
            Err(PositionError::Malformed(_))
        ));
        assert!(matches!(
            Position::from("1,2,3").coordinates(),
            Err(PositionError::Malformed(_))
        ));
        assert!(matches!(
            Position::from("north,south").coordinates(),
            Err(PositionError::Malformed(_))
        ));
        assert!(matches!(
            Position::default().coordinates(),
            Err(PositionError::Empty)
        ));
    }

    #[test]
    fn position_rejects_out_of_range() {
        assert!(matches!(
            Position::from("91,0").coordinates(),
            Err(PositionError::OutOfRange { .. })
        ));
        assert!(matches!(
            Position::from("0,-180.5").coordinates(),
            Err(PositionError::OutOfRange { .. })
        ));
    }

    #[test]
    fn record_matches_compares_all_attributes() {
        let entry = JournalEntry::from_record(record("1,1"), NodeId(100));
        assert!(record("1,1").matches(&entry));
        assert!(!record("1,2").matches(&entry));

        let mut renamed = record("1,1");
        renamed.name = "Y".to_string();
        assert!(!renamed.matches(&entry));
    }

    #[test]
    fn node_id_placeholder_sign() {
        assert!(NodeId(-1).is_placeholder());
        assert!(!NodeId(1).is_placeholder());
    }

    #[test]
    fn operation_kind_purpose_tags() {
        let purposes: Vec<_> = OperationKind::all().iter().map(|k| k.purpose()).collect();
        assert_eq!(purposes, ["create", "modify", "delete"]);
    }

    #[test]
    fn operation_accessors() {
        let op = Operation::Delete(Linked {
            record: record(""),
            remote_id: NodeId(100),
        });
        assert_eq!(op.kind(), OperationKind::Delete);
        assert_eq!(op.remote_id(), Some(NodeId(100)));
        assert_eq!(op.record().unique_id, UniqueId::from("A"));
        assert_eq!(Operation::Insert(record("1,1")).remote_id(), None);
    }
}
