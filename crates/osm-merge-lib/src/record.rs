//! Record types for OSM documents
//!
//! Nodes, ways and relations share an ID, tags and passthrough attributes.
//! Ways and relations additionally hold ordered references to other records.

use geo::Coord;
use indexmap::IndexMap;
use std::fmt;

/// Ordered key/value tags of a record (`<tag k=".." v=".."/>`)
pub type Tags = IndexMap<String, String>;

/// XML attributes carried through the merge unchanged (`version`, `user`, ...)
pub type Attributes = IndexMap<String, String>;

/// The three kinds of records in an OSM document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum RecordKind {
    Node,
    Way,
    Relation,
}

impl RecordKind {
    pub const ALL: [RecordKind; 3] = [RecordKind::Node, RecordKind::Way, RecordKind::Relation];

    /// XML element name, also used as the member `type` value
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Way => "way",
            Self::Relation => "relation",
        }
    }

    /// Parse a member `type` attribute
    pub fn from_member_type(value: &str) -> Option<Self> {
        match value {
            "node" => Some(Self::Node),
            "way" => Some(Self::Way),
            "relation" => Some(Self::Relation),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        match self {
            Self::Node => 0,
            Self::Way => 1,
            Self::Relation => 2,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common access to the identity of a record
pub trait Record {
    const KIND: RecordKind;

    fn id(&self) -> i64;

    fn set_id(&mut self, id: i64);
}

/// A point with a fixed coordinate
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: i64,
    /// `x` is longitude, `y` is latitude (WGS84 degrees)
    pub coord: Coord<f64>,
    pub tags: Tags,
    pub attributes: Attributes,
}

impl Node {
    pub fn new(id: i64, lat: f64, lon: f64) -> Self {
        Self {
            id,
            coord: Coord { x: lon, y: lat },
            tags: Tags::new(),
            attributes: Attributes::new(),
        }
    }

    #[inline]
    pub fn lat(&self) -> f64 {
        self.coord.y
    }

    #[inline]
    pub fn lon(&self) -> f64 {
        self.coord.x
    }
}

/// An ordered path through nodes
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Way {
    pub id: i64,
    /// Node references; order defines the geometry
    pub nodes: Vec<i64>,
    pub tags: Tags,
    pub attributes: Attributes,
}

impl Way {
    pub fn new(id: i64, nodes: Vec<i64>) -> Self {
        Self {
            id,
            nodes,
            ..Default::default()
        }
    }
}

/// A single relation member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub kind: RecordKind,
    pub reference: i64,
    pub role: String,
}

impl Member {
    pub fn new(kind: RecordKind, reference: i64, role: impl Into<String>) -> Self {
        Self {
            kind,
            reference,
            role: role.into(),
        }
    }
}

/// An ordered group of members of any kind
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Relation {
    pub id: i64,
    pub members: Vec<Member>,
    pub tags: Tags,
    pub attributes: Attributes,
}

impl Relation {
    pub fn new(id: i64, members: Vec<Member>) -> Self {
        Self {
            id,
            members,
            ..Default::default()
        }
    }
}

macro_rules! impl_record {
    ($ty:ty, $kind:expr) => {
        impl Record for $ty {
            const KIND: RecordKind = $kind;

            #[inline]
            fn id(&self) -> i64 {
                self.id
            }

            #[inline]
            fn set_id(&mut self, id: i64) {
                self.id = id;
            }
        }
    };
}

impl_record!(Node, RecordKind::Node);
impl_record!(Way, RecordKind::Way);
impl_record!(Relation, RecordKind::Relation);

/// One parsed document, each collection keyed by record ID in encounter order
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub nodes: IndexMap<i64, Node>,
    pub ways: IndexMap<i64, Way>,
    pub relations: IndexMap<i64, Relation>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node keyed by its ID, returning any record it replaced
    pub fn insert_node(&mut self, node: Node) -> Option<Node> {
        self.nodes.insert(node.id, node)
    }

    pub fn insert_way(&mut self, way: Way) -> Option<Way> {
        self.ways.insert(way.id, way)
    }

    pub fn insert_relation(&mut self, relation: Relation) -> Option<Relation> {
        self.relations.insert(relation.id, relation)
    }

    /// Number of records of the given kind
    pub fn count(&self, kind: RecordKind) -> usize {
        match kind {
            RecordKind::Node => self.nodes.len(),
            RecordKind::Way => self.ways.len(),
            RecordKind::Relation => self.relations.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.ways.is_empty() && self.relations.is_empty()
    }
}
