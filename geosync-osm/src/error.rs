//! Error types for geosync-osm.

use thiserror::Error;

use geosync_core::PositionError;

/// All errors that can arise from talking to an OSM API server.
#[derive(Debug, Error)]
pub enum OsmError {
    /// The server answered with a non-success status.
    #[error("{method} {url} returned {status}: {body}")]
    Status {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    /// Connection, TLS or timeout failure.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<ureq::Transport>,
    },

    /// Reading a response body or writing a request body failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),

    #[error("<{element}> is missing attribute '{attribute}'")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },

    #[error("<{element}> attribute '{attribute}' has invalid value {value:?}")]
    InvalidAttribute {
        element: &'static str,
        attribute: &'static str,
        value: String,
    },

    #[error("response contains no <{0}> element")]
    MissingElement(&'static str),

    #[error("node has invalid coordinates: {0}")]
    Position(#[from] PositionError),

    #[error("server returned invalid changeset id {0:?}")]
    InvalidChangesetId(String),
}
