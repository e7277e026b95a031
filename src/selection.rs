use std::fmt;
use std::path::PathBuf;

use error_stack::{IntoReport, Report, ResultExt};
use native_dialog::FileDialog;

use crate::Suggestion;

#[derive(Debug)]
pub struct SelectionError;
impl fmt::Display for SelectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Directory selection error")
    }
}
impl std::error::Error for SelectionError {}

pub type SelectionResult<T> = error_stack::Result<T, SelectionError>;

/// Uses `given` when present, otherwise asks for a folder with the native
/// picker.
pub fn select_directory(given: Option<PathBuf>) -> SelectionResult<PathBuf> {
    if let Some(directory) = given {
        return Ok(directory);
    }
    let home_dir = dirs::home_dir();
    let mut dialog = FileDialog::new();
    if let Some(home_dir) = home_dir.as_deref() {
        dialog = dialog.set_location(home_dir);
    }
    dialog
        .show_open_single_dir()
        .into_report()
        .change_context(SelectionError)?
        .ok_or_else(|| {
            Report::new(SelectionError)
                .attach_printable("No directory selected.")
                .attach(Suggestion(
                    "pick a folder in the dialog or pass --directory".to_string(),
                ))
        })
}
