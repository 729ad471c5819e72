//! OSM XML document parsing
//!
//! Direct children of the root element are records. `node`, `way` and
//! `relation` are parsed into typed records; any other top-level element
//! (`bounds`, `changeset`, ...) is skipped together with its subtree.

use crate::record::{Attributes, Document, Member, Node, Relation, Tags, Way};
use crate::renumber::check_reference;
use crate::{MergeError, RecordKind, Result};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::path::Path;

/// Read and parse the document at `path`
///
/// Errors are tagged with the path of the document.
pub fn read_document(path: impl AsRef<Path>) -> Result<Document> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| MergeError::io(path, e))?;
    let document = parse_document(&bytes).map_err(|e| e.in_document(path))?;

    tracing::debug!(
        "Parsed {}: {} nodes, {} ways, {} relations",
        path.display(),
        document.nodes.len(),
        document.ways.len(),
        document.relations.len()
    );
    Ok(document)
}

/// Parse an OSM XML document from memory
pub fn parse_document(input: &[u8]) -> Result<Document> {
    #[cfg(feature = "profiling")]
    profiling::scope!("parser::parse_document");

    DocumentParser::default().parse(input)
}

/// Where a record starts, for error reporting
#[derive(Debug, Clone, Copy)]
struct Position {
    /// Ordinal among records of the same kind
    index: usize,
    /// Byte offset of the element in the input
    offset: u64,
}

/// Record under construction while its children are read
#[derive(Debug)]
enum Pending {
    Node(Node, Position),
    Way(Way, Position),
    Relation(Relation, Position),
}

impl Pending {
    fn kind(&self) -> RecordKind {
        match self {
            Self::Node(..) => RecordKind::Node,
            Self::Way(..) => RecordKind::Way,
            Self::Relation(..) => RecordKind::Relation,
        }
    }

    fn position(&self) -> Position {
        match self {
            Self::Node(_, pos) | Self::Way(_, pos) | Self::Relation(_, pos) => *pos,
        }
    }

    fn tags(&self) -> &Tags {
        match self {
            Self::Node(node, _) => &node.tags,
            Self::Way(way, _) => &way.tags,
            Self::Relation(relation, _) => &relation.tags,
        }
    }

    fn tags_mut(&mut self) -> &mut Tags {
        match self {
            Self::Node(node, _) => &mut node.tags,
            Self::Way(way, _) => &mut way.tags,
            Self::Relation(relation, _) => &mut relation.tags,
        }
    }
}

#[derive(Debug, Default)]
struct DocumentParser {
    document: Document,
    /// Number of currently open elements
    depth: usize,
    saw_root: bool,
    pending: Option<Pending>,
    /// Records seen so far per kind, indexed by `RecordKind::index`
    seen: [usize; 3],
}

impl DocumentParser {
    fn parse(mut self, input: &[u8]) -> Result<Document> {
        let mut reader = Reader::from_reader(input);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();

        loop {
            let offset = reader.buffer_position() as u64;
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    self.handle_start(e, offset)?;
                    self.depth += 1;
                }
                Ok(Event::Empty(ref e)) => {
                    // Self-closing element - handle as start + end
                    self.handle_start(e, offset)?;
                    self.depth += 1;
                    self.handle_end()?;
                }
                Ok(Event::End(_)) => {
                    self.handle_end()?;
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(MergeError::xml(format!(
                        "XML parse error at position {}: {e}",
                        reader.error_position()
                    )));
                }
                _ => {}
            }
            buf.clear();
        }

        if !self.saw_root {
            return Err(MergeError::xml("document has no root element"));
        }
        if self.depth != 0 {
            return Err(MergeError::xml("unexpected end of document"));
        }

        Ok(self.document)
    }

    fn handle_start(&mut self, e: &BytesStart<'_>, offset: u64) -> Result<()> {
        match self.depth {
            0 => {
                self.saw_root = true;
                Ok(())
            }
            1 => self.start_record(e, offset),
            2 => self.record_child(e),
            // Nothing in a record nests deeper than its direct children
            _ => Ok(()),
        }
    }

    fn handle_end(&mut self) -> Result<()> {
        self.depth = self.depth.saturating_sub(1);
        if self.depth == 1 {
            if let Some(pending) = self.pending.take() {
                self.finish_record(pending)?;
            }
        }
        Ok(())
    }

    fn start_record(&mut self, e: &BytesStart<'_>, offset: u64) -> Result<()> {
        let kind = match e.name().as_ref() {
            b"node" => RecordKind::Node,
            b"way" => RecordKind::Way,
            b"relation" => RecordKind::Relation,
            other => {
                tracing::trace!(
                    "Skipping top-level element <{}>",
                    String::from_utf8_lossy(other)
                );
                return Ok(());
            }
        };

        let seen = &mut self.seen[kind.index()];
        let position = Position {
            index: *seen,
            offset,
        };
        *seen += 1;

        let malformed = |reason: String| MergeError::MalformedRecord {
            kind,
            index: position.index,
            offset: position.offset,
            reason,
        };

        let mut id = None;
        let mut lat = None;
        let mut lon = None;
        let mut attributes = Attributes::new();

        for (key, value) in read_attributes(e)? {
            match (key.as_str(), kind) {
                ("id", _) => id = Some(value),
                ("lat", RecordKind::Node) => lat = Some(value),
                ("lon", RecordKind::Node) => lon = Some(value),
                _ => {
                    attributes.insert(key, value);
                }
            }
        }

        let id = match id {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .map_err(|_| malformed(format!("id {raw:?} is not an integer")))?,
            None => return Err(malformed("missing id".to_string())),
        };

        self.pending = Some(match kind {
            RecordKind::Node => {
                let lat = parse_coordinate("lat", lat).map_err(malformed)?;
                let lon = parse_coordinate("lon", lon).map_err(malformed)?;
                let mut node = Node::new(id, lat, lon);
                node.attributes = attributes;
                Pending::Node(node, position)
            }
            RecordKind::Way => {
                let mut way = Way::new(id, Vec::new());
                way.attributes = attributes;
                Pending::Way(way, position)
            }
            RecordKind::Relation => {
                let mut relation = Relation::new(id, Vec::new());
                relation.attributes = attributes;
                Pending::Relation(relation, position)
            }
        });
        Ok(())
    }

    fn record_child(&mut self, e: &BytesStart<'_>) -> Result<()> {
        // Children of skipped top-level elements
        let Some(pending) = self.pending.as_mut() else {
            return Ok(());
        };

        match e.name().as_ref() {
            b"tag" => {
                let mut key = None;
                let mut value = None;
                for (k, v) in read_attributes(e)? {
                    match k.as_str() {
                        "k" => key = Some(v),
                        "v" => value = Some(v),
                        _ => {}
                    }
                }
                let (kind, position) = (pending.kind(), pending.position());
                let malformed = |reason: String| MergeError::MalformedRecord {
                    kind,
                    index: position.index,
                    offset: position.offset,
                    reason,
                };
                let (Some(key), Some(value)) = (key, value) else {
                    return Err(malformed("tag without k or v".to_string()));
                };
                if pending.tags().contains_key(&key) {
                    return Err(malformed(format!("duplicate tag key {key:?}")));
                }
                pending.tags_mut().insert(key, value);
            }
            b"nd" => {
                if let Pending::Way(way, _) = pending {
                    let raw = find_attribute(e, "ref")?;
                    let reference = parse_reference(RecordKind::Way, way.id, raw)?;
                    way.nodes.push(reference);
                }
            }
            b"member" => {
                if let Pending::Relation(relation, _) = pending {
                    let mut member_type = None;
                    let mut raw_ref = None;
                    let mut role = String::new();
                    for (k, v) in read_attributes(e)? {
                        match k.as_str() {
                            "type" => member_type = Some(v),
                            "ref" => raw_ref = Some(v),
                            "role" => role = v,
                            _ => {}
                        }
                    }

                    let kind = member_type
                        .as_deref()
                        .and_then(RecordKind::from_member_type)
                        .ok_or_else(|| MergeError::InvalidReference {
                            kind: RecordKind::Relation,
                            id: relation.id,
                            value: format!("type={}", member_type.as_deref().unwrap_or("")),
                        })?;
                    let reference = parse_reference(RecordKind::Relation, relation.id, raw_ref)?;
                    relation.members.push(Member::new(kind, reference, role));
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn finish_record(&mut self, pending: Pending) -> Result<()> {
        let kind = pending.kind();
        let position = pending.position();
        let replaced = match pending {
            Pending::Node(node, _) => {
                let id = node.id;
                self.document.insert_node(node).map(|_| id)
            }
            Pending::Way(way, _) => {
                let id = way.id;
                self.document.insert_way(way).map(|_| id)
            }
            Pending::Relation(relation, _) => {
                let id = relation.id;
                self.document.insert_relation(relation).map(|_| id)
            }
        };

        match replaced {
            Some(id) => Err(MergeError::MalformedRecord {
                kind,
                index: position.index,
                offset: position.offset,
                reason: format!("duplicate id {id}"),
            }),
            None => Ok(()),
        }
    }
}

/// Collect all attributes of an element as owned, unescaped strings
fn read_attributes(e: &BytesStart<'_>) -> Result<Vec<(String, String)>> {
    e.attributes()
        .map(|attr| {
            let attr = attr.map_err(|e| MergeError::xml(format!("Attribute error: {e}")))?;
            let key = std::str::from_utf8(attr.key.as_ref())
                .map_err(|e| MergeError::xml(format!("Attribute key error: {e}")))?
                .to_string();
            let value = attr
                .unescape_value()
                .map_err(|e| MergeError::xml(format!("Attribute value error: {e}")))?
                .into_owned();
            Ok((key, value))
        })
        .collect()
}

fn find_attribute(e: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    Ok(read_attributes(e)?
        .into_iter()
        .find_map(|(k, v)| (k == name).then_some(v)))
}

fn parse_coordinate(name: &str, raw: Option<String>) -> std::result::Result<f64, String> {
    let raw = raw.ok_or_else(|| format!("missing {name}"))?;
    raw.trim()
        .parse::<f64>()
        .map_err(|_| format!("{name} {raw:?} is not a number"))
}

fn parse_reference(kind: RecordKind, owner: i64, raw: Option<String>) -> Result<i64> {
    let raw = raw.unwrap_or_default();
    let invalid = || MergeError::InvalidReference {
        kind,
        id: owner,
        value: raw.clone(),
    };
    let value = raw.trim().parse::<i64>().map_err(|_| invalid())?;
    check_reference(kind, owner, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6" generator="JOSM">
  <bounds minlat="51.50" minlon="-0.13" maxlat="51.51" maxlon="-0.12"/>
  <node id="1" version="2" user="mapper" lat="51.5074" lon="-0.1278"/>
  <node id="2" lat="51.5080" lon="-0.1270">
    <tag k="amenity" v="cafe"/>
    <tag k="name" v="Tea &amp; Cake"/>
  </node>
  <way id="10" visible="true">
    <nd ref="1"/>
    <nd ref="2"/>
    <tag k="highway" v="footway"/>
  </way>
  <relation id="5">
    <member type="way" ref="10" role="outer"/>
    <member type="node" ref="2"/>
    <tag k="type" v="multipolygon"/>
  </relation>
</osm>
"#;

    #[test]
    fn test_parse_sample() {
        let doc = parse_document(SAMPLE.as_bytes()).unwrap();

        assert_eq!(doc.nodes.len(), 2);
        assert_eq!(doc.ways.len(), 1);
        assert_eq!(doc.relations.len(), 1);

        let node = &doc.nodes[&1];
        assert_eq!(node.lat(), 51.5074);
        assert_eq!(node.lon(), -0.1278);
        assert_eq!(node.attributes.get("version").map(String::as_str), Some("2"));
        assert_eq!(node.attributes.get("user").map(String::as_str), Some("mapper"));

        let cafe = &doc.nodes[&2];
        assert_eq!(cafe.tags.get("name").map(String::as_str), Some("Tea & Cake"));

        let way = &doc.ways[&10];
        assert_eq!(way.nodes, vec![1, 2]);
        assert_eq!(way.tags.get("highway").map(String::as_str), Some("footway"));
        assert_eq!(way.attributes.get("visible").map(String::as_str), Some("true"));

        let relation = &doc.relations[&5];
        assert_eq!(
            relation.members,
            vec![
                Member::new(RecordKind::Way, 10, "outer"),
                Member::new(RecordKind::Node, 2, ""),
            ]
        );
    }

    #[test]
    fn test_encounter_order_kept() {
        let xml = r#"<osm>
            <node id="30" lat="0" lon="0"/>
            <node id="4" lat="0" lon="0"/>
            <node id="17" lat="0" lon="0"/>
        </osm>"#;
        let doc = parse_document(xml.as_bytes()).unwrap();
        let ids: Vec<i64> = doc.nodes.keys().copied().collect();
        assert_eq!(ids, vec![30, 4, 17]);
    }

    #[test]
    fn test_unknown_elements_ignored() {
        let xml = r#"<osm>
            <changeset id="99"><tag k="comment" v="x"/></changeset>
            <note><nd ref="abc"/></note>
            <node id="1" lat="1" lon="2"><extra/></node>
        </osm>"#;
        let doc = parse_document(xml.as_bytes()).unwrap();
        assert_eq!(doc.nodes.len(), 1);
        assert!(doc.ways.is_empty());
        assert!(doc.relations.is_empty());
    }

    #[test]
    fn test_missing_id_is_malformed() {
        let xml = r#"<osm>
            <way id="1"><nd ref="1"/></way>
            <way><nd ref="1"/></way>
        </osm>"#;
        let err = parse_document(xml.as_bytes()).unwrap_err();
        match err {
            MergeError::MalformedRecord {
                kind, index, reason, ..
            } => {
                assert_eq!(kind, RecordKind::Way);
                assert_eq!(index, 1);
                assert!(reason.contains("missing id"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_coordinate_is_malformed() {
        let xml = r#"<osm><node id="1" lat="1.0"/></osm>"#;
        let err = parse_document(xml.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            MergeError::MalformedRecord {
                kind: RecordKind::Node,
                index: 0,
                ..
            }
        ));
        assert!(err.to_string().contains("missing lon"));
    }

    #[test]
    fn test_non_integer_id_is_malformed() {
        let xml = r#"<osm><relation id="r1"/></osm>"#;
        let err = parse_document(xml.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            MergeError::MalformedRecord {
                kind: RecordKind::Relation,
                ..
            }
        ));
    }

    #[test]
    fn test_duplicate_id_is_malformed() {
        let xml = r#"<osm>
            <node id="1" lat="0" lon="0"/>
            <node id="1" lat="1" lon="1"/>
        </osm>"#;
        let err = parse_document(xml.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("duplicate id 1"));
    }

    #[test]
    fn test_tag_without_value_is_malformed() {
        let xml = r#"<osm><way id="3"><tag k="name"/></way></osm>"#;
        let err = parse_document(xml.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            MergeError::MalformedRecord {
                kind: RecordKind::Way,
                ..
            }
        ));
    }

    #[test]
    fn test_duplicate_tag_key_is_malformed() {
        let xml = r#"<osm>
            <node id="1" lat="0" lon="0"/>
            <way id="3"><tag k="name" v="High Street"/><tag k="name" v="Low Street"/></way>
        </osm>"#;
        let err = parse_document(xml.as_bytes()).unwrap_err();
        match err {
            MergeError::MalformedRecord {
                kind, index, reason, ..
            } => {
                assert_eq!(kind, RecordKind::Way);
                assert_eq!(index, 0);
                assert!(reason.contains("name"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_nd_reference() {
        for bad in [r#"<nd ref="x"/>"#, r#"<nd ref="0"/>"#, r#"<nd ref="-4"/>"#, "<nd/>"] {
            let xml = format!(r#"<osm><way id="8">{bad}</way></osm>"#);
            let err = parse_document(xml.as_bytes()).unwrap_err();
            assert!(
                matches!(
                    err,
                    MergeError::InvalidReference {
                        kind: RecordKind::Way,
                        id: 8,
                        ..
                    }
                ),
                "{bad} gave {err}"
            );
        }
    }

    #[test]
    fn test_invalid_member_type() {
        let xml = r#"<osm><relation id="2"><member type="area" ref="1" role=""/></relation></osm>"#;
        let err = parse_document(xml.as_bytes()).unwrap_err();
        match err {
            MergeError::InvalidReference { kind, id, value } => {
                assert_eq!(kind, RecordKind::Relation);
                assert_eq!(id, 2);
                assert_eq!(value, "type=area");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_broken_xml() {
        let err = parse_document(b"<osm><node id=\"1\" lat=\"0\" lon=\"0\"></way></osm>").unwrap_err();
        assert!(matches!(err, MergeError::Xml(_)));
    }

    #[test]
    fn test_empty_input() {
        let err = parse_document(b"").unwrap_err();
        assert!(matches!(err, MergeError::Xml(_)));
    }

    #[test]
    fn test_read_document_missing_file() {
        let err = read_document("/nonexistent/dir/missing.osm").unwrap_err();
        match err {
            MergeError::Io { path, .. } => assert!(path.ends_with("missing.osm")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_read_document_tags_errors_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.osm");
        std::fs::write(&path, r#"<osm><way id="1"><nd ref="no"/></way></osm>"#).unwrap();

        let err = read_document(&path).unwrap_err();
        match err {
            MergeError::Document { path: p, source } => {
                assert_eq!(p, path);
                assert!(matches!(*source, MergeError::InvalidReference { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
