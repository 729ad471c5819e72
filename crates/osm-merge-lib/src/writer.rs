//! OSM XML serialization of a merged document

use crate::record::{Attributes, Node, Relation, Tags, Way};
use crate::{MergeError, MergedDocument, Result};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Write};
use std::path::Path;

/// Output envelope settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WriterConfig {
    /// Value of the root `generator` attribute
    pub generator: String,
    /// Value of the root `version` attribute (OSM API version)
    pub version: String,
    /// Emit a `<bounds>` element covering all nodes
    pub include_bounds: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            generator: "MergedOSM".to_string(),
            version: "0.6".to_string(),
            include_bounds: false,
        }
    }
}

/// Serialize `merged` to an in-memory OSM XML document
///
/// Nodes come first, then ways, then relations, each in accumulated order.
pub fn to_xml(merged: &MergedDocument, config: &WriterConfig) -> Result<Vec<u8>> {
    #[cfg(feature = "profiling")]
    profiling::scope!("writer::to_xml");

    let mut buffer = Cursor::new(Vec::new());
    let mut writer = Writer::new_with_indent(&mut buffer, b' ', 2);

    emit(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;

    let mut root = BytesStart::new("osm");
    root.push_attribute(("version", config.version.as_str()));
    root.push_attribute(("generator", config.generator.as_str()));
    emit(&mut writer, Event::Start(root))?;

    if config.include_bounds {
        if let Some(bbox) = merged.bounds() {
            let mut bounds = BytesStart::new("bounds");
            bounds.push_attribute(("minlat", bbox.min().y.to_string().as_str()));
            bounds.push_attribute(("minlon", bbox.min().x.to_string().as_str()));
            bounds.push_attribute(("maxlat", bbox.max().y.to_string().as_str()));
            bounds.push_attribute(("maxlon", bbox.max().x.to_string().as_str()));
            emit(&mut writer, Event::Empty(bounds))?;
        }
    }

    for node in merged.nodes() {
        write_node(&mut writer, node)?;
    }
    for way in merged.ways() {
        write_way(&mut writer, way)?;
    }
    for relation in merged.relations() {
        write_relation(&mut writer, relation)?;
    }

    emit(&mut writer, Event::End(BytesEnd::new("osm")))?;

    let mut output = buffer.into_inner();
    output.push(b'\n');
    Ok(output)
}

/// Write `bytes` to `path` atomically
///
/// The data goes to a temporary file next to `path` first and is renamed over
/// the target only once fully written. On failure the temporary file is
/// removed and `path` is left untouched.
///
/// A replaced file keeps its permissions. A new file gets the usual
/// permissions for newly created files under the process umask.
pub fn write_atomic(bytes: &[u8], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    #[cfg_attr(not(unix), allow(unused_mut))]
    let mut builder = tempfile::Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        // Masked by the umask on creation, like a plain `File::create`
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }
    let mut file = builder
        .tempfile_in(dir)
        .map_err(|e| MergeError::io(dir, e))?;
    if let Ok(existing) = std::fs::metadata(path) {
        file.as_file()
            .set_permissions(existing.permissions())
            .map_err(|e| MergeError::io(file.path(), e))?;
    }
    file.write_all(bytes)
        .and_then(|_| file.as_file().sync_all())
        .map_err(|e| MergeError::io(file.path(), e))?;
    file.persist(path)
        .map_err(|e| MergeError::io(path, e.error))?;
    Ok(())
}

/// Serialize `merged` and write it atomically to `path`
pub fn write_document(
    merged: &MergedDocument,
    path: impl AsRef<Path>,
    config: &WriterConfig,
) -> Result<()> {
    let path = path.as_ref();
    let bytes = to_xml(merged, config)?;
    write_atomic(&bytes, path)?;

    tracing::info!(
        "Wrote {} nodes, {} ways, {} relations to {}",
        merged.nodes().len(),
        merged.ways().len(),
        merged.relations().len(),
        path.display()
    );
    Ok(())
}

fn emit<W: Write>(writer: &mut Writer<W>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| MergeError::xml(format!("Write error: {e}")))
}

/// Start tag of a record: `id`, then passthrough attributes
fn record_start<'a>(name: &'a str, id: i64, attributes: &'a Attributes) -> BytesStart<'a> {
    let mut start = BytesStart::new(name);
    start.push_attribute(("id", id.to_string().as_str()));
    for (key, value) in attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }
    start
}

/// Write `start` as an empty element, or with children produced by `body`
fn write_element<W: Write>(
    writer: &mut Writer<W>,
    start: BytesStart<'_>,
    has_children: bool,
    body: impl FnOnce(&mut Writer<W>) -> Result<()>,
) -> Result<()> {
    if !has_children {
        return emit(writer, Event::Empty(start));
    }

    let end = start.to_end().into_owned();
    emit(writer, Event::Start(start))?;
    body(writer)?;
    emit(writer, Event::End(end))
}

fn write_tags<W: Write>(writer: &mut Writer<W>, tags: &Tags) -> Result<()> {
    for (key, value) in tags {
        let mut tag = BytesStart::new("tag");
        tag.push_attribute(("k", key.as_str()));
        tag.push_attribute(("v", value.as_str()));
        emit(writer, Event::Empty(tag))?;
    }
    Ok(())
}

fn write_node<W: Write>(writer: &mut Writer<W>, node: &Node) -> Result<()> {
    let mut start = record_start("node", node.id, &node.attributes);
    start.push_attribute(("lat", node.lat().to_string().as_str()));
    start.push_attribute(("lon", node.lon().to_string().as_str()));

    write_element(writer, start, !node.tags.is_empty(), |w| {
        write_tags(w, &node.tags)
    })
}

fn write_way<W: Write>(writer: &mut Writer<W>, way: &Way) -> Result<()> {
    let start = record_start("way", way.id, &way.attributes);
    let has_children = !way.nodes.is_empty() || !way.tags.is_empty();

    write_element(writer, start, has_children, |w| {
        for node in &way.nodes {
            let mut nd = BytesStart::new("nd");
            nd.push_attribute(("ref", node.to_string().as_str()));
            emit(w, Event::Empty(nd))?;
        }
        write_tags(w, &way.tags)
    })
}

fn write_relation<W: Write>(writer: &mut Writer<W>, relation: &Relation) -> Result<()> {
    let start = record_start("relation", relation.id, &relation.attributes);
    let has_children = !relation.members.is_empty() || !relation.tags.is_empty();

    write_element(writer, start, has_children, |w| {
        for member in &relation.members {
            let mut element = BytesStart::new("member");
            element.push_attribute(("type", member.kind.as_str()));
            element.push_attribute(("ref", member.reference.to_string().as_str()));
            element.push_attribute(("role", member.role.as_str()));
            emit(w, Event::Empty(element))?;
        }
        write_tags(w, &relation.tags)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Document, Member, RecordKind};
    use crate::parse_document;

    fn create_test_merged() -> MergedDocument {
        let mut doc = Document::new();
        let mut node = Node::new(1, 51.5074, -0.1278);
        node.tags.insert("name".to_string(), "Fish & Chips <3".to_string());
        node.attributes.insert("version".to_string(), "3".to_string());
        doc.insert_node(node);
        doc.insert_node(Node::new(2, 51.5, -0.12));
        doc.insert_way(Way::new(1, vec![1, 2]));
        doc.insert_relation(Relation::new(
            1,
            vec![
                Member::new(RecordKind::Way, 1, "outer"),
                Member::new(RecordKind::Node, 2, ""),
            ],
        ));

        let mut merged = MergedDocument::new();
        merged.append(doc).unwrap();
        merged
    }

    #[test]
    fn test_envelope() {
        let xml = to_xml(&MergedDocument::new(), &WriterConfig::default()).unwrap();
        let text = String::from_utf8(xml).unwrap();

        assert!(text.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(text.contains(r#"<osm version="0.6" generator="MergedOSM">"#));
        assert!(text.trim_end().ends_with("</osm>"));
    }

    #[test]
    fn test_record_order_and_escaping() {
        let xml = to_xml(&create_test_merged(), &WriterConfig::default()).unwrap();
        let text = String::from_utf8(xml).unwrap();

        let node = text.find("<node").unwrap();
        let way = text.find("<way").unwrap();
        let relation = text.find("<relation").unwrap();
        assert!(node < way && way < relation);

        assert!(text.contains(r#"<node id="1" version="3" lat="51.5074" lon="-0.1278">"#));
        assert!(text.contains(r#"<node id="2" lat="51.5" lon="-0.12"/>"#));
        assert!(text.contains("Fish &amp; Chips &lt;3"));
        assert!(text.contains(r#"<member type="way" ref="1" role="outer"/>"#));
        assert!(!text.contains("<bounds"));
    }

    #[test]
    fn test_bounds_element() {
        let config = WriterConfig {
            include_bounds: true,
            ..Default::default()
        };
        let xml = to_xml(&create_test_merged(), &config).unwrap();
        let text = String::from_utf8(xml).unwrap();
        assert!(text.contains(
            r#"<bounds minlat="51.5" minlon="-0.1278" maxlat="51.5074" maxlon="-0.12"/>"#
        ));
    }

    #[test]
    fn test_output_parses_back() {
        let merged = create_test_merged();
        let xml = to_xml(&merged, &WriterConfig::default()).unwrap();
        let doc = parse_document(&xml).unwrap();

        assert_eq!(doc.nodes.len(), 2);
        assert_eq!(doc.nodes[&1], *merged.node(1).unwrap());
        assert_eq!(doc.ways[&1], *merged.way(1).unwrap());
        assert_eq!(doc.relations[&1], *merged.relation(1).unwrap());
    }

    #[test]
    fn test_write_atomic_replaces_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.osm");
        std::fs::write(&path, "old").unwrap();

        write_atomic(b"new", &path).unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"new");
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1, "temporary file left behind");
    }

    #[cfg(unix)]
    #[test]
    fn test_write_atomic_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let mode = |p: &Path| std::fs::metadata(p).unwrap().permissions().mode() & 0o777;

        // A fresh file gets the same mode as any file created under this umask
        let reference = dir.path().join("reference.osm");
        std::fs::write(&reference, "").unwrap();
        let fresh = dir.path().join("fresh.osm");
        write_atomic(b"x", &fresh).unwrap();
        assert_eq!(mode(&fresh), mode(&reference));

        // A replaced file keeps its mode
        let existing = dir.path().join("existing.osm");
        std::fs::write(&existing, "old").unwrap();
        std::fs::set_permissions(&existing, std::fs::Permissions::from_mode(0o644)).unwrap();
        write_atomic(b"x", &existing).unwrap();
        assert_eq!(mode(&existing), 0o644);

        std::fs::set_permissions(&existing, std::fs::Permissions::from_mode(0o640)).unwrap();
        write_atomic(b"y", &existing).unwrap();
        assert_eq!(mode(&existing), 0o640);
    }

    #[test]
    fn test_write_atomic_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.osm");

        let err = write_atomic(b"data", &path).unwrap_err();
        assert!(matches!(err, MergeError::Io { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_write_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merged.osm");

        write_document(&create_test_merged(), &path, &WriterConfig::default()).unwrap();

        let doc = crate::read_document(&path).unwrap();
        assert_eq!(doc.ways[&1].nodes, vec![1, 2]);
    }
}
