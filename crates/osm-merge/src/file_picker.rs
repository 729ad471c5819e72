//! Native file dialogs for choosing merge inputs and output.
//!
//! With the `dialogs` feature on desktop targets this uses `rfd`'s blocking
//! dialogs. Otherwise every function reports that dialogs are unavailable, so
//! `--pick` fails cleanly on headless builds.

use std::path::PathBuf;

#[cfg(all(feature = "dialogs", not(any(target_arch = "wasm32", target_os = "android"))))]
mod inner {
    use std::path::PathBuf;

    const FILTER_NAME: &str = "OSM Files";
    const EXTENSIONS: &[&str] = &["osm"];

    pub fn available() -> bool {
        true
    }

    pub fn pick_input_files() -> Vec<PathBuf> {
        rfd::FileDialog::new()
            .set_title("Select OSM Files")
            .add_filter(FILTER_NAME, EXTENSIONS)
            .pick_files()
            .unwrap_or_default()
    }

    pub fn pick_output_file() -> Option<PathBuf> {
        rfd::FileDialog::new()
            .set_title("Save Merged OSM File As")
            .add_filter(FILTER_NAME, EXTENSIONS)
            .set_file_name("merged.osm")
            .save_file()
    }

    pub fn show_message(is_error: bool, description: &str) {
        let (level, title) = if is_error {
            (rfd::MessageLevel::Error, "Error")
        } else {
            (rfd::MessageLevel::Info, "Success")
        };
        let _ = rfd::MessageDialog::new()
            .set_level(level)
            .set_title(title)
            .set_description(description)
            .set_buttons(rfd::MessageButtons::Ok)
            .show();
    }
}

#[cfg(not(all(feature = "dialogs", not(any(target_arch = "wasm32", target_os = "android")))))]
mod inner {
    use std::path::PathBuf;

    pub fn available() -> bool {
        false
    }

    pub fn pick_input_files() -> Vec<PathBuf> {
        Vec::new()
    }

    pub fn pick_output_file() -> Option<PathBuf> {
        None
    }

    pub fn show_message(_is_error: bool, description: &str) {
        tracing::debug!("Dialogs disabled in this build, not showing: {description}");
    }
}

/// Whether native dialogs were compiled in
pub fn dialogs_available() -> bool {
    inner::available()
}

/// Ask for the files to merge; empty when the user cancels
pub fn pick_input_files() -> Vec<PathBuf> {
    inner::pick_input_files()
}

/// Ask where to save the merged file; `None` when the user cancels
pub fn pick_output_file() -> Option<PathBuf> {
    inner::pick_output_file()
}

pub fn show_success(description: &str) {
    inner::show_message(false, description);
}

pub fn show_error(description: &str) {
    inner::show_message(true, description);
}
