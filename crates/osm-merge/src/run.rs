use crate::file_picker;
use crate::settings::Settings;
use osm_merge_lib::{MergeError, MergeInfo, MergeOutcome, merge_files};
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;

/// Failures of the command line tool
#[derive(Debug, Error)]
pub enum CliError {
    #[error("no output file given (use --output or --pick)")]
    MissingOutput,

    #[error("--pick needs a build with the `dialogs` feature")]
    DialogsUnavailable,

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error("failed to write summary: {0}")]
    Summary(String),
}

/// Inputs and output chosen for one run
#[derive(Debug, Clone, PartialEq)]
enum Plan {
    /// Nothing selected, or the user cancelled a dialog
    Skip,
    Merge { inputs: Vec<PathBuf>, output: PathBuf },
}

fn plan(settings: &Settings) -> Result<Plan, CliError> {
    let inputs = if settings.pick && settings.inputs.is_empty() {
        if !file_picker::dialogs_available() {
            return Err(CliError::DialogsUnavailable);
        }
        file_picker::pick_input_files()
    } else {
        settings.inputs.clone()
    };

    if inputs.is_empty() {
        return Ok(Plan::Skip);
    }

    let output = match (&settings.output, settings.pick) {
        (Some(output), _) => output.clone(),
        (None, true) => {
            if !file_picker::dialogs_available() {
                return Err(CliError::DialogsUnavailable);
            }
            match file_picker::pick_output_file() {
                Some(output) => output,
                None => {
                    tracing::info!("No output file selected");
                    return Ok(Plan::Skip);
                }
            }
        }
        (None, false) => return Err(CliError::MissingOutput),
    };

    Ok(Plan::Merge { inputs, output })
}

/// Run one merge as described by `settings`
pub fn run(settings: &Settings) -> Result<MergeOutcome, CliError> {
    profiling::scope!("run");

    let (inputs, output) = match plan(settings)? {
        Plan::Skip => {
            tracing::info!("No input files selected, nothing to do");
            return Ok(MergeOutcome::NothingToDo);
        }
        Plan::Merge { inputs, output } => (inputs, output),
    };

    tracing::info!("Merging {} files into {}", inputs.len(), output.display());
    let outcome = merge_files(&inputs, &output, &settings.config())?;

    if let MergeOutcome::Written { path, info } = &outcome {
        if settings.json {
            write_summary(&mut std::io::stdout().lock(), info)?;
        }
        if settings.pick {
            file_picker::show_success(&format!("Merged OSM file saved to:\n{}", path.display()));
        }
    }
    Ok(outcome)
}

fn write_summary(out: &mut impl Write, info: &MergeInfo) -> Result<(), CliError> {
    serde_json::to_writer_pretty(&mut *out, info).map_err(|e| CliError::Summary(e.to_string()))?;
    writeln!(out).map_err(|e| CliError::Summary(e.to_string()))
}
