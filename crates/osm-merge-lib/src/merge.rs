//! OsmMerger - the merge pipeline for one run
//!
//! Each input goes through parse → renumber → append, strictly in caller
//! order. One [`IdAllocator`] spans the whole run and is never reset, so two
//! runs in the same process cannot interfere with each other.

use crate::{
    Document, IdAllocator, MergeInfo, MergedDocument, RelinkReport, Result,
    WriterConfig, read_document, renumber, write_document,
};

use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for a merge run
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    /// Parse input files in parallel before renumbering them in order.
    /// The output is identical either way.
    pub parallel_parse: bool,
    /// Output envelope settings
    pub writer: WriterConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            parallel_parse: true,
            writer: WriterConfig::default(),
        }
    }
}

/// Result of [`merge_files`]
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// No inputs were given; nothing was written
    NothingToDo,
    /// The merged document was written to `path`
    Written { path: PathBuf, info: MergeInfo },
}

impl MergeOutcome {
    /// Destination of the written document, if any
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::NothingToDo => None,
            Self::Written { path, .. } => Some(path),
        }
    }
}

/// Merge pipeline state for one run
#[derive(Debug, Clone)]
pub struct OsmMerger {
    allocator: IdAllocator,
    merged: MergedDocument,
    config: Config,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl OsmMerger {
    /// Create a merger with fresh counters and an empty result
    pub fn new(config: Config) -> Self {
        Self {
            allocator: IdAllocator::new(),
            merged: MergedDocument::new(),
            config,
        }
    }

    /// Renumber a parsed document and append it to the result
    ///
    /// Callers may stop between two calls; the state is consistent at every
    /// document boundary.
    pub fn add_document(&mut self, mut document: Document) -> Result<RelinkReport> {
        let report = renumber(&mut document, &mut self.allocator)?;
        self.merged.append(document)?;
        Ok(report)
    }

    /// Read, renumber and append one file
    pub fn add_file(&mut self, path: impl AsRef<Path>) -> Result<RelinkReport> {
        let path = path.as_ref();
        let document = read_document(path)?;
        self.add_document(document).map_err(|e| e.in_document(path))
    }

    /// Load several files, in order
    ///
    /// With [`Config::parallel_parse`] the files are parsed concurrently; the
    /// renumbering that follows is always sequential in input order. The
    /// first failing file in input order aborts the load, in both modes.
    pub fn load_from_files<P: AsRef<Path> + Sync>(
        &mut self,
        paths: &[P],
    ) -> Result<Vec<RelinkReport>> {
        #[cfg(feature = "profiling")]
        profiling::scope!("merge::load_from_files");

        if !self.config.parallel_parse {
            return paths.iter().map(|path| self.add_file(path)).collect();
        }

        let documents: Vec<Result<Document>> =
            paths.par_iter().map(|path| read_document(path)).collect();

        documents
            .into_iter()
            .zip(paths)
            .map(|(document, path)| {
                self.add_document(document?)
                    .map_err(|e| e.in_document(path.as_ref()))
            })
            .collect()
    }

    /// Write the merged result atomically to `path`
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        write_document(&self.merged, path, &self.config.writer)
    }

    #[inline]
    pub fn info(&self) -> MergeInfo {
        self.merged.info()
    }

    #[inline]
    pub fn merged(&self) -> &MergedDocument {
        &self.merged
    }

    #[inline]
    pub fn allocator(&self) -> &IdAllocator {
        &self.allocator
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn into_merged(self) -> MergedDocument {
        self.merged
    }
}

/// Merge `inputs` in order and write the result to `output`
///
/// Zero inputs is not an error: nothing is written and
/// [`MergeOutcome::NothingToDo`] is returned. On any error no output file is
/// produced.
pub fn merge_files<P: AsRef<Path> + Sync>(
    inputs: &[P],
    output: impl AsRef<Path>,
    config: &Config,
) -> Result<MergeOutcome> {
    if inputs.is_empty() {
        tracing::info!("No input documents, nothing to do");
        return Ok(MergeOutcome::NothingToDo);
    }

    let output = output.as_ref();
    let mut merger = OsmMerger::new(config.clone());
    let reports = merger.load_from_files(inputs)?;

    let unresolved: usize = reports.iter().map(|r| r.unresolved_references).sum();
    if unresolved > 0 {
        tracing::warn!(
            "{unresolved} references across {} documents were not relinked",
            reports.len()
        );
    }

    merger.write_to(output)?;
    Ok(MergeOutcome::Written {
        path: output.to_path_buf(),
        info: merger.info(),
    })
}
