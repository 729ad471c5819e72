//! Command line entry point for merging OSM XML files

mod file_picker;
mod logging;
mod metadata;
mod run;
mod settings;

use settings::Settings;
use std::process::ExitCode;

fn main() -> ExitCode {
    logging::setup_logging();
    metadata::log_version_info();

    let settings = Settings::from_cli();
    match run::run(&settings) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Merge failed: {e}");
            if settings.pick {
                file_picker::show_error(&format!("An error occurred:\n{e}"));
            }
            ExitCode::FAILURE
        }
    }
}
