//! ID reassignment and reference relinking for one document
//!
//! A document is renumbered in three passes:
//!
//! 1. every record ID is observed so the allocator floor sits above the
//!    document's own IDs,
//! 2. each record receives a fresh ID, in encounter order, and the
//!    old → new pair is recorded in a mapping scoped to this document,
//! 3. every way and relation reference found in the mapping is rewritten.
//!
//! References that are not in the document's own mapping are left untouched.
//! They usually point at records of another input document, which this merge
//! does not resolve.

use crate::record::{Document, Record};
use crate::{IdAllocator, MergeError, RecordKind, Result};
use indexmap::IndexMap;
use std::collections::HashMap;

/// Old → new IDs of one document, per record kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdMapping {
    maps: [HashMap<i64, i64>; 3],
}

impl IdMapping {
    /// New ID assigned to the record `old` of `kind`, if it was in this document
    #[inline]
    pub fn get(&self, kind: RecordKind, old: i64) -> Option<i64> {
        self.maps[kind.index()].get(&old).copied()
    }

    /// Number of remapped records of `kind`
    pub fn len(&self, kind: RecordKind) -> usize {
        self.maps[kind.index()].len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.iter().all(HashMap::is_empty)
    }

    fn insert(&mut self, kind: RecordKind, old: i64, new: i64) {
        self.maps[kind.index()].insert(old, new);
    }
}

/// Outcome of renumbering one document
#[derive(Debug, Clone, Default)]
pub struct RelinkReport {
    pub mapping: IdMapping,
    /// References rewritten to a new ID
    pub relinked_references: usize,
    /// References left unchanged because their target is not in this document
    pub unresolved_references: usize,
}

/// Reassign every record ID of `document` and relink its references
///
/// The document is modified in place: collections are re-keyed by the new
/// IDs with their order preserved.
pub fn renumber(document: &mut Document, allocator: &mut IdAllocator) -> Result<RelinkReport> {
    #[cfg(feature = "profiling")]
    profiling::scope!("renumber::renumber");

    validate_references(document)?;

    observe_all(&document.nodes, allocator);
    observe_all(&document.ways, allocator);
    observe_all(&document.relations, allocator);

    let mut report = RelinkReport::default();
    reassign(&mut document.nodes, allocator, &mut report.mapping)?;
    reassign(&mut document.ways, allocator, &mut report.mapping)?;
    reassign(&mut document.relations, allocator, &mut report.mapping)?;

    relink(document, &mut report);

    if report.unresolved_references > 0 {
        tracing::warn!(
            "{} references point outside their own document and were left unchanged",
            report.unresolved_references
        );
    }
    tracing::debug!(
        "Renumbered {} nodes, {} ways, {} relations ({} references relinked)",
        report.mapping.len(RecordKind::Node),
        report.mapping.len(RecordKind::Way),
        report.mapping.len(RecordKind::Relation),
        report.relinked_references
    );

    Ok(report)
}

/// Reject references that cannot name a record
pub(crate) fn check_reference(kind: RecordKind, owner: i64, value: i64) -> Result<i64> {
    if value > 0 {
        Ok(value)
    } else {
        Err(MergeError::InvalidReference {
            kind,
            id: owner,
            value: value.to_string(),
        })
    }
}

fn validate_references(document: &Document) -> Result<()> {
    for way in document.ways.values() {
        for &node in &way.nodes {
            check_reference(RecordKind::Way, way.id, node)?;
        }
    }
    for relation in document.relations.values() {
        for member in &relation.members {
            check_reference(RecordKind::Relation, relation.id, member.reference)?;
        }
    }
    Ok(())
}

fn observe_all<R: Record>(records: &IndexMap<i64, R>, allocator: &mut IdAllocator) {
    for record in records.values() {
        allocator.observe(R::KIND, record.id());
    }
}

fn reassign<R: Record>(
    records: &mut IndexMap<i64, R>,
    allocator: &mut IdAllocator,
    mapping: &mut IdMapping,
) -> Result<()> {
    let mut renumbered = IndexMap::with_capacity(records.len());
    for (old, mut record) in records.drain(..) {
        let new = allocator.next(R::KIND)?;
        mapping.insert(R::KIND, old, new);
        record.set_id(new);
        renumbered.insert(new, record);
    }
    *records = renumbered;
    Ok(())
}

fn relink(document: &mut Document, report: &mut RelinkReport) {
    let mapping = &report.mapping;
    let mut relinked = 0;
    let mut unresolved = 0;

    let mut rewrite = |kind: RecordKind, owner: i64, reference: &mut i64| {
        match mapping.get(kind, *reference) {
            Some(new) => {
                *reference = new;
                relinked += 1;
            }
            None => {
                tracing::debug!("{owner} references unknown {kind} {reference}");
                unresolved += 1;
            }
        }
    };

    for way in document.ways.values_mut() {
        for node in &mut way.nodes {
            rewrite(RecordKind::Node, way.id, node);
        }
    }
    for relation in document.relations.values_mut() {
        for member in &mut relation.members {
            rewrite(member.kind, relation.id, &mut member.reference);
        }
    }

    report.relinked_references += relinked;
    report.unresolved_references += unresolved;
}
