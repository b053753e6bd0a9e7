//! Blocking OSM API 0.6 client.

use std::fmt;
use std::time::Duration;

use base64::{engine::general_purpose, Engine};

use geosync_core::{
    ChangesetId, ChangesetTags, Config, ConfirmationMap, GeodataService, Node, NodeId,
    NodeMutation,
};

use crate::error::OsmError;
use crate::xml;

const USER_AGENT: &str = concat!("geosync/", env!("CARGO_PKG_VERSION"));

/// An authenticated session with an OSM API server.
pub struct OsmClient {
    agent: ureq::Agent,
    api_base: String,
    authorization: String,
    /// Generator of the most recently opened changeset, echoed in uploads.
    generator: String,
}

impl OsmClient {
    /// Build a session from the configured credentials and endpoint.
    ///
    /// No request is made until the first changeset is opened.
    pub fn new(config: &Config) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build();
        let credentials = format!("{}:{}", config.user, config.password);
        Self {
            agent,
            api_base: format!("{}/api/0.6", config.host().trim_end_matches('/')),
            authorization: format!("Basic {}", general_purpose::STANDARD.encode(credentials)),
            generator: USER_AGENT.to_string(),
        }
    }

    /// `<host>/api/0.6`
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn send(&self, method: &str, path: &str, body: Option<&str>) -> Result<String, OsmError> {
        let url = format!("{}/{}", self.api_base, path);
        tracing::debug!("{method} {url}");

        let request = self
            .agent
            .request(method, &url)
            .set("Authorization", &self.authorization);
        let result = match body {
            Some(body) => request
                .set("Content-Type", "text/xml; charset=utf-8")
                .send_string(body),
            None => request.call(),
        };

        match result {
            Ok(response) => Ok(response.into_string()?),
            Err(ureq::Error::Status(status, response)) => Err(OsmError::Status {
                method: method.to_string(),
                url,
                status,
                body: response.into_string().unwrap_or_default().trim().to_string(),
            }),
            Err(ureq::Error::Transport(transport)) => Err(OsmError::Transport {
                url,
                source: Box::new(transport),
            }),
        }
    }
}

impl fmt::Debug for OsmClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OsmClient")
            .field("api_base", &self.api_base)
            .field("authorization", &"<redacted>")
            .finish()
    }
}

impl GeodataService for OsmClient {
    type Error = OsmError;

    fn open_changeset(&mut self, tags: &ChangesetTags) -> Result<ChangesetId, OsmError> {
        let body = xml::encode_changeset(tags)?;
        let id = xml::parse_changeset_id(&self.send("PUT", "changeset/create", Some(&body))?)?;
        self.generator = tags.generator.clone();
        Ok(id)
    }

    fn load_node(&mut self, id: NodeId) -> Result<Node, OsmError> {
        let body = self.send("GET", &format!("node/{id}"), None)?;
        xml::parse_node(&body)
    }

    fn upload(
        &mut self,
        changeset: ChangesetId,
        mutations: &[NodeMutation],
    ) -> Result<ConfirmationMap, OsmError> {
        let body = xml::encode_osm_change(changeset, &self.generator, mutations)?;
        let response = self.send("POST", &format!("changeset/{changeset}/upload"), Some(&body))?;
        xml::parse_diff_result(&response)
    }

    fn close_changeset(&mut self, changeset: ChangesetId) -> Result<(), OsmError> {
        self.send("PUT", &format!("changeset/{changeset}/close"), None)?;
        Ok(())
    }
}
