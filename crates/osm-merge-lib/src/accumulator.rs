//! MergedDocument - cumulative collections of every renumbered document
//!
//! Records are moved in, never copied, and keep the order in which they were
//! first inserted across the whole run.

use crate::record::{Document, Node, Record, Relation, Way};
use crate::{MergeError, Result};

use geo::{Coord, Rect};
use indexmap::IndexMap;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Information about a merge result
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MergeInfo {
    /// Number of documents appended
    pub document_count: usize,
    pub node_count: usize,
    pub way_count: usize,
    pub relation_count: usize,
    /// Bounding box of all nodes as `(min_lat, min_lon, max_lat, max_lon)`
    pub bounds: Option<(f64, f64, f64, f64)>,
}

/// Accumulated result of a merge run
#[derive(Debug, Clone, Default)]
pub struct MergedDocument {
    nodes: IndexMap<i64, Node>,
    ways: IndexMap<i64, Way>,
    relations: IndexMap<i64, Relation>,
    document_count: usize,
    /// Bounding box of node coordinates (`x` = lon, `y` = lat), updated incrementally
    bounds: Option<Rect<f64>>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl MergedDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the records of a renumbered document into the merged collections
    ///
    /// Fails with [`MergeError::AllocatorInvariantBroken`] if any record ID is
    /// already present, which means the document was not renumbered against
    /// the same allocator as the previous ones. A failed append leaves the
    /// merged document unchanged.
    pub fn append(&mut self, document: Document) -> Result<()> {
        let Document {
            nodes,
            ways,
            relations,
        } = document;

        check_vacant(&self.nodes, &nodes)?;
        check_vacant(&self.ways, &ways)?;
        check_vacant(&self.relations, &relations)?;

        for node in nodes.values() {
            self.update_bounds(node.coord);
        }
        self.nodes.extend(nodes);
        self.ways.extend(ways);
        self.relations.extend(relations);
        self.document_count += 1;
        Ok(())
    }

    #[inline]
    pub fn nodes(&self) -> impl ExactSizeIterator<Item = &Node> {
        self.nodes.values()
    }

    #[inline]
    pub fn ways(&self) -> impl ExactSizeIterator<Item = &Way> {
        self.ways.values()
    }

    #[inline]
    pub fn relations(&self) -> impl ExactSizeIterator<Item = &Relation> {
        self.relations.values()
    }

    pub fn node(&self, id: i64) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn way(&self, id: i64) -> Option<&Way> {
        self.ways.get(&id)
    }

    pub fn relation(&self, id: i64) -> Option<&Relation> {
        self.relations.get(&id)
    }

    /// Number of documents appended so far
    #[inline]
    pub fn document_count(&self) -> usize {
        self.document_count
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.ways.is_empty() && self.relations.is_empty()
    }

    /// Bounding box of all nodes (`x` = longitude, `y` = latitude)
    #[inline]
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.bounds
    }

    /// Get merge information
    ///
    /// This is O(1) as all values are cached.
    pub fn info(&self) -> MergeInfo {
        MergeInfo {
            document_count: self.document_count,
            node_count: self.nodes.len(),
            way_count: self.ways.len(),
            relation_count: self.relations.len(),
            bounds: self
                .bounds
                .map(|b| (b.min().y, b.min().x, b.max().y, b.max().x)),
        }
    }

    fn update_bounds(&mut self, coord: Coord<f64>) {
        if !coord.x.is_finite() || !coord.y.is_finite() {
            tracing::warn!(
                "Skipping non-finite coordinate ({}, {}) in bounds",
                coord.y,
                coord.x
            );
            return;
        }

        self.bounds = Some(match self.bounds {
            Some(bbox) => Rect::new(
                Coord {
                    x: bbox.min().x.min(coord.x),
                    y: bbox.min().y.min(coord.y),
                },
                Coord {
                    x: bbox.max().x.max(coord.x),
                    y: bbox.max().y.max(coord.y),
                },
            ),
            None => Rect::new(coord, coord),
        });
    }
}

fn check_vacant<R: Record>(target: &IndexMap<i64, R>, records: &IndexMap<i64, R>) -> Result<()> {
    match records.keys().find(|id| target.contains_key(*id)) {
        Some(&id) => Err(MergeError::AllocatorInvariantBroken {
            kind: R::KIND,
            id,
            reason: "ID already present in merged output",
        }),
        None => Ok(()),
    }
}
