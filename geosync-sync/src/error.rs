//! Error types for geosync-sync.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use geosync_core::{NodeId, OperationKind, PositionError, SourceError, UniqueId};

/// Which remote call of a phase failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStage {
    Open,
    Load(NodeId),
    Upload,
    Close,
}

impl fmt::Display for RemoteStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteStage::Open => write!(f, "opening changeset"),
            RemoteStage::Load(id) => write!(f, "loading node {id}"),
            RemoteStage::Upload => write!(f, "uploading changeset"),
            RemoteStage::Close => write!(f, "closing changeset"),
        }
    }
}

/// All errors that can arise from a reconciliation run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The record source could not be read.
    #[error("record source error: {0}")]
    Source(#[from] SourceError),

    /// The journal exists but is not a journal document.
    #[error("failed to parse journal at {path}: {source}")]
    JournalParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// JSON serialization error (journal save path).
    #[error("journal JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A remote call failed; the run stops here.
    #[error("{phase} phase failed while {stage}: {source}")]
    Remote {
        phase: OperationKind,
        stage: RemoteStage,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A record to be uploaded carries no usable coordinates.
    #[error("cannot {phase} '{id}': {source}")]
    Position {
        phase: OperationKind,
        id: UniqueId,
        #[source]
        source: PositionError,
    },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`SyncError::Remote`].
pub(crate) fn remote_err<E>(phase: OperationKind, stage: RemoteStage, source: E) -> SyncError
where
    E: std::error::Error + Send + Sync + 'static,
{
    SyncError::Remote {
        phase,
        stage,
        source: Box::new(source),
    }
}
