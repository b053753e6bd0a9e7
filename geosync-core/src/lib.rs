//! geosync core library: domain types, record source, configuration and the
//! remote service seam.
//!
//! - [`types`]: records, journal entries, operations
//! - [`source`]: CSV record source
//! - [`config`]: credentials / endpoint document
//! - [`service`]: [`GeodataService`] trait and node model
//! - [`error`]: [`SourceError`], [`ConfigError`], [`PositionError`]

pub mod config;
pub mod error;
pub mod service;
pub mod source;
pub mod types;

pub use config::Config;
pub use error::{ConfigError, PositionError, SourceError};
pub use service::{
    ChangesetId, ChangesetTags, ConfirmationMap, GeodataService, Node, NodeMutation,
};
pub use types::{
    Coordinates, JournalEntry, Linked, NodeId, Operation, OperationKind, Position, Record,
    UniqueId,
};
