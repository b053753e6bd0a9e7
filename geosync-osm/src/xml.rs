//! OSM API 0.6 XML documents.
//!
//! Only the handful of documents geosync exchanges are supported:
//!
//! - `<osm><changeset>`: body of `changeset/create`
//! - `<osmChange>`: body of `changeset/{id}/upload`
//! - `<osm><node>`: response of `node/{id}`
//! - `<diffResult>`: response of `changeset/{id}/upload`

use std::collections::{BTreeMap, HashMap};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use geosync_core::{
    ChangesetId, ChangesetTags, ConfirmationMap, Coordinates, Node, NodeId, NodeMutation,
};

use crate::error::OsmError;

const API_VERSION: &str = "0.6";

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// `<osm><changeset>` carrying `created_by` and `comment` tags.
pub fn encode_changeset(tags: &ChangesetTags) -> Result<String, OsmError> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("osm")))?;
    writer.write_event(Event::Start(BytesStart::new("changeset")))?;
    write_tag(&mut writer, "created_by", &tags.generator)?;
    write_tag(&mut writer, "comment", &tags.purpose)?;
    writer.write_event(Event::End(BytesEnd::new("changeset")))?;
    writer.write_event(Event::End(BytesEnd::new("osm")))?;
    Ok(into_string(writer))
}

/// `<osmChange>` with one `<create>`, `<modify>` and `<delete>` block per
/// kind present, in that order. Mutations keep their relative order.
pub fn encode_osm_change(
    changeset: ChangesetId,
    generator: &str,
    mutations: &[NodeMutation],
) -> Result<String, OsmError> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    let mut root = BytesStart::new("osmChange");
    root.push_attribute(("version", API_VERSION));
    root.push_attribute(("generator", generator));
    writer.write_event(Event::Start(root))?;

    for block in ["create", "modify", "delete"] {
        let nodes: Vec<&Node> = mutations
            .iter()
            .filter(|m| block_name(m) == block)
            .map(NodeMutation::node)
            .collect();
        if nodes.is_empty() {
            continue;
        }
        writer.write_event(Event::Start(BytesStart::new(block)))?;
        for node in nodes {
            write_node(&mut writer, changeset, node, block != "delete")?;
        }
        writer.write_event(Event::End(BytesEnd::new(block)))?;
    }

    writer.write_event(Event::End(BytesEnd::new("osmChange")))?;
    Ok(into_string(writer))
}

fn block_name(mutation: &NodeMutation) -> &'static str {
    match mutation {
        NodeMutation::Create(_) => "create",
        NodeMutation::Modify(_) => "modify",
        NodeMutation::Delete(_) => "delete",
    }
}

fn write_node(
    writer: &mut Writer<Vec<u8>>,
    changeset: ChangesetId,
    node: &Node,
    with_tags: bool,
) -> Result<(), OsmError> {
    let id = node.id.to_string();
    let changeset = changeset.to_string();
    let lat = node.coordinates.lat.to_string();
    let lon = node.coordinates.lon.to_string();

    let mut element = BytesStart::new("node");
    element.push_attribute(("id", id.as_str()));
    let version = node.version.map(|v| v.to_string());
    if let Some(version) = version.as_deref() {
        element.push_attribute(("version", version));
    }
    element.push_attribute(("changeset", changeset.as_str()));
    element.push_attribute(("lat", lat.as_str()));
    element.push_attribute(("lon", lon.as_str()));

    if !with_tags || node.tags.is_empty() {
        writer.write_event(Event::Empty(element))?;
        return Ok(());
    }
    writer.write_event(Event::Start(element))?;
    for (k, v) in &node.tags {
        write_tag(writer, k, v)?;
    }
    writer.write_event(Event::End(BytesEnd::new("node")))?;
    Ok(())
}

fn write_tag(writer: &mut Writer<Vec<u8>>, k: &str, v: &str) -> Result<(), OsmError> {
    let mut tag = BytesStart::new("tag");
    tag.push_attribute(("k", k));
    tag.push_attribute(("v", v));
    writer.write_event(Event::Empty(tag))?;
    Ok(())
}

fn into_string(writer: Writer<Vec<u8>>) -> String {
    // Every byte written came from a `&str`.
    String::from_utf8_lossy(&writer.into_inner()).into_owned()
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Parse the first `<node>` of an `<osm>` document, with its tags.
pub fn parse_node(xml: &str) -> Result<Node, OsmError> {
    let mut reader = Reader::from_str(xml);
    let mut node: Option<Node> = None;
    let mut inside_node = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == b"node" && node.is_none() => {
                node = Some(node_from(&e)?);
                inside_node = true;
            }
            Event::Empty(e) if e.name().as_ref() == b"node" && node.is_none() => {
                node = Some(node_from(&e)?);
            }
            Event::Empty(e) if e.name().as_ref() == b"tag" && inside_node => {
                let attrs = attributes(&e)?;
                let k = required(&attrs, "tag", "k")?;
                let v = required(&attrs, "tag", "v")?;
                if let Some(node) = node.as_mut() {
                    node.tags.insert(k.to_string(), v.to_string());
                }
            }
            Event::End(e) if e.name().as_ref() == b"node" => inside_node = false,
            Event::Eof => break,
            _ => {}
        }
    }

    node.ok_or(OsmError::MissingElement("node"))
}

fn node_from(e: &BytesStart<'_>) -> Result<Node, OsmError> {
    let attrs = attributes(e)?;
    let id = parse_attr::<i64>(&attrs, "node", "id")?;
    let version = parse_attr::<u64>(&attrs, "node", "version")?;
    let lat = parse_attr::<f64>(&attrs, "node", "lat")?;
    let lon = parse_attr::<f64>(&attrs, "node", "lon")?;
    Ok(Node {
        id: NodeId(id),
        version: Some(version),
        coordinates: Coordinates::new(lat, lon)?,
        tags: BTreeMap::new(),
    })
}

/// Parse a `<diffResult>` into submitted id → final id.
///
/// Deleted nodes carry no `new_id` and map to themselves.
pub fn parse_diff_result(xml: &str) -> Result<ConfirmationMap, OsmError> {
    let mut reader = Reader::from_str(xml);
    let mut confirmations = ConfirmationMap::new();
    let mut seen_root = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => match e.name().as_ref() {
                b"diffResult" => seen_root = true,
                b"node" => {
                    let attrs = attributes(&e)?;
                    let old_id = NodeId(parse_attr::<i64>(&attrs, "node", "old_id")?);
                    let new_id = match attrs.get("new_id") {
                        Some(_) => NodeId(parse_attr::<i64>(&attrs, "node", "new_id")?),
                        None => old_id,
                    };
                    confirmations.insert(old_id, new_id);
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(OsmError::MissingElement("diffResult"));
    }
    Ok(confirmations)
}

/// Parse the plain-text body of `changeset/create`.
pub fn parse_changeset_id(body: &str) -> Result<ChangesetId, OsmError> {
    body.trim()
        .parse::<u64>()
        .map(ChangesetId)
        .map_err(|_| OsmError::InvalidChangesetId(body.trim().to_string()))
}

fn attributes(e: &BytesStart<'_>) -> Result<HashMap<String, String>, OsmError> {
    let mut map = HashMap::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        map.insert(key, value);
    }
    Ok(map)
}

fn required<'a>(
    attrs: &'a HashMap<String, String>,
    element: &'static str,
    attribute: &'static str,
) -> Result<&'a str, OsmError> {
    attrs
        .get(attribute)
        .map(String::as_str)
        .ok_or(OsmError::MissingAttribute { element, attribute })
}

fn parse_attr<T: std::str::FromStr>(
    attrs: &HashMap<String, String>,
    element: &'static str,
    attribute: &'static str,
) -> Result<T, OsmError> {
    let raw = required(attrs, element, attribute)?;
    raw.parse().map_err(|_| OsmError::InvalidAttribute {
        element,
        attribute,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: i64, version: Option<u64>, tags: &[(&str, &str)]) -> Node {
        Node {
            id: NodeId(id),
            version,
            coordinates: Coordinates::new(2.0, 2.5).unwrap(),
            tags: tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn changeset_body_carries_generator_and_purpose() {
        let xml = encode_changeset(&ChangesetTags {
            purpose: "create".to_string(),
            generator: "GeoSync v0.1.0".to_string(),
        })
        .unwrap();
        assert!(xml.contains(r#"<tag k="created_by" v="GeoSync v0.1.0"/>"#));
        assert!(xml.contains(r#"<tag k="comment" v="create"/>"#));
        assert!(xml.contains("<osm><changeset>"));
    }

    #[test]
    fn osm_change_groups_blocks_in_fixed_order() {
        let xml = encode_osm_change(
            ChangesetId(42),
            "GeoSync",
            &[
                NodeMutation::Delete(node(100, Some(3), &[("amenity", "cafe")])),
                NodeMutation::Create(node(-1, None, &[("name:en", "Y"), ("amenity", "cafe")])),
                NodeMutation::Modify(node(200, Some(1), &[])),
            ],
        )
        .unwrap();

        let create = xml.find("<create>").unwrap();
        let modify = xml.find("<modify>").unwrap();
        let delete = xml.find("<delete>").unwrap();
        assert!(create < modify && modify < delete);

        assert!(xml.contains(
            r#"<node id="-1" changeset="42" lat="2" lon="2.5"><tag k="amenity" v="cafe"/><tag k="name:en" v="Y"/></node>"#
        ));
        assert!(xml.contains(r#"<node id="200" version="1" changeset="42" lat="2" lon="2.5"/>"#));
        assert!(
            xml.contains(r#"<delete><node id="100" version="3" changeset="42" lat="2" lon="2.5"/></delete>"#),
            "deletes are sent without tags: {xml}"
        );
    }

    #[test]
    fn tag_values_are_escaped() {
        let xml = encode_osm_change(
            ChangesetId(1),
            "g",
            &[NodeMutation::Create(node(-1, None, &[("name:en", "Fish & \"Chips\"")]))],
        )
        .unwrap();
        assert!(xml.contains("Fish &amp; &quot;Chips&quot;"));
    }

    #[test]
    fn parses_node_with_tags() {
        let parsed = parse_node(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <osm version="0.6" generator="OpenStreetMap server">
              <node id="100" visible="true" version="3" changeset="9" timestamp="2024-01-01T00:00:00Z" user="m" uid="1" lat="1.0000000" lon="1.0000000">
                <tag k="amenity" v="cafe"/>
                <tag k="name:en" v="Tom &amp; Jerry"/>
              </node>
            </osm>"#,
        )
        .unwrap();

        assert_eq!(parsed.id, NodeId(100));
        assert_eq!(parsed.version, Some(3));
        assert_eq!(parsed.coordinates, Coordinates::new(1.0, 1.0).unwrap());
        assert_eq!(parsed.tags.get("name:en").unwrap(), "Tom & Jerry");
        assert_eq!(parsed.tags.len(), 2);
    }

    #[test]
    fn node_without_version_is_rejected() {
        let err = parse_node(r#"<osm><node id="1" lat="0" lon="0"/></osm>"#).unwrap_err();
        assert!(matches!(
            err,
            OsmError::MissingAttribute {
                attribute: "version",
                ..
            }
        ));
    }

    #[test]
    fn document_without_node_is_rejected() {
        assert!(matches!(
            parse_node("<osm/>").unwrap_err(),
            OsmError::MissingElement("node")
        ));
    }

    #[test]
    fn diff_result_maps_creates_modifies_and_deletes() {
        let map = parse_diff_result(
            r#"<diffResult version="0.6" generator="OpenStreetMap server">
                 <node old_id="-1" new_id="5001" new_version="1"/>
                 <node old_id="-2" new_id="5002" new_version="1"/>
                 <node old_id="200" new_id="200" new_version="2"/>
                 <node old_id="100"/>
               </diffResult>"#,
        )
        .unwrap();

        assert_eq!(map.get(&NodeId(-1)), Some(&NodeId(5001)));
        assert_eq!(map.get(&NodeId(-2)), Some(&NodeId(5002)));
        assert_eq!(map.get(&NodeId(200)), Some(&NodeId(200)));
        assert_eq!(map.get(&NodeId(100)), Some(&NodeId(100)));
    }

    #[test]
    fn diff_result_requires_root_element() {
        assert!(matches!(
            parse_diff_result("<html>oops</html>").unwrap_err(),
            OsmError::MissingElement("diffResult")
        ));
    }

    #[test]
    fn changeset_id_is_trimmed_plain_text() {
        assert_eq!(parse_changeset_id("1234\n").unwrap(), ChangesetId(1234));
        assert!(matches!(
            parse_changeset_id("<html/>").unwrap_err(),
            OsmError::InvalidChangesetId(_)
        ));
    }
}
