//! OSM Merge Library - ID unification for OpenStreetMap XML documents
//!
//! This library merges several OSM XML documents into one, guaranteeing that no
//! two records of the same kind collide on ID and that every way/relation
//! reference follows its target to the target's new ID.
//!
//! # Architecture
//!
//! - **[`parse_document`]**: Reads one document into typed [`Node`], [`Way`] and [`Relation`] collections
//! - **[`IdAllocator`]**: Per-kind counters shared by every document of one run
//! - **[`renumber`]**: Reassigns IDs for one document and relinks its references
//! - **[`MergedDocument`]**: Accumulates renumbered documents in encounter order
//! - **[`write_document`]**: Serializes the result atomically
//! - **[`OsmMerger`]** / **[`merge_files`]**: The pipeline tying the stages together
//!
//! # Example
//!
//! ```no_run
//! use osm_merge_lib::{Config, MergeOutcome, merge_files};
//!
//! let outcome = merge_files(&["a.osm", "b.osm"], "merged.osm", &Config::default())?;
//! if let MergeOutcome::Written { path, info } = outcome {
//!     println!("{} nodes written to {}", info.node_count, path.display());
//! }
//! # Ok::<(), osm_merge_lib::MergeError>(())
//! ```

mod accumulator;
mod allocator;
mod merge;
mod parser;
mod record;
mod renumber;
mod writer;

// Public API exports
pub use accumulator::{MergeInfo, MergedDocument};
pub use allocator::IdAllocator;
pub use merge::{Config, MergeOutcome, OsmMerger, merge_files};
pub use parser::{parse_document, read_document};
pub use record::{Attributes, Document, Member, Node, Record, RecordKind, Relation, Tags, Way};
pub use renumber::{IdMapping, RelinkReport, renumber};
pub use writer::{WriterConfig, to_xml, write_atomic, write_document};

use std::path::PathBuf;

/// Error types for the merge pipeline
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("Malformed {kind} record #{index} at byte {offset}: {reason}")]
    MalformedRecord {
        kind: RecordKind,
        index: usize,
        offset: u64,
        reason: String,
    },

    #[error("Invalid reference {value:?} in {kind} {id}")]
    InvalidReference {
        kind: RecordKind,
        id: i64,
        value: String,
    },

    /// Input IDs reach `i64::MAX`, leaving no fresh ID for `kind`
    #[error("No {kind} IDs left after {last}")]
    IdSpaceExhausted { kind: RecordKind, last: i64 },

    /// Internal bug: records reached the accumulator without being renumbered
    /// against the run's allocator
    #[error("Allocator invariant broken for {kind} {id}: {reason}")]
    AllocatorInvariantBroken {
        kind: RecordKind,
        id: i64,
        reason: &'static str,
    },

    #[error("XML error: {0}")]
    Xml(String),

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {source}", path.display())]
    Document {
        path: PathBuf,
        #[source]
        source: Box<MergeError>,
    },
}

impl MergeError {
    pub(crate) fn xml(message: impl Into<String>) -> Self {
        Self::Xml(message.into())
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Attach the path of the input document this error came from
    pub(crate) fn in_document(self, path: impl Into<PathBuf>) -> Self {
        match self {
            // IO errors already name their file
            err @ (Self::Io { .. } | Self::Document { .. }) => err,
            err => Self::Document {
                path: path.into(),
                source: Box::new(err),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, MergeError>;
