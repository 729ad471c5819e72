use clap::Parser;
use osm_merge_lib::{Config, WriterConfig};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
/// OSM Merge - Merge OpenStreetMap XML files without ID conflicts
pub struct Settings {
    /// OSM files to merge, in order
    #[arg(value_name = "FILE")]
    pub inputs: Vec<PathBuf>,

    /// Where to write the merged document
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Choose input and output files with native dialogs
    #[arg(long, default_value = "false")]
    pub pick: bool,

    /// Generator name written to the output envelope
    #[arg(long, default_value = "MergedOSM")]
    pub generator: String,

    /// Write a <bounds> element covering all merged nodes
    #[arg(long, default_value = "false")]
    pub bounds: bool,

    /// Parse input files one at a time instead of in parallel
    #[arg(long, default_value = "false")]
    pub sequential: bool,

    /// Print a JSON summary of the merge on stdout
    #[arg(long, default_value = "false")]
    pub json: bool,
}

impl Settings {
    /// Parse settings from the command line, exiting on usage errors
    pub fn from_cli() -> Self {
        match Self::try_parse() {
            Ok(settings) => settings,
            Err(e) => e.exit(),
        }
    }

    /// Library configuration for these settings
    pub fn config(&self) -> Config {
        Config {
            parallel_parse: !self.sequential,
            writer: WriterConfig {
                generator: self.generator.clone(),
                include_bounds: self.bounds,
                ..Default::default()
            },
        }
    }
}
