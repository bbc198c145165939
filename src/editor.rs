use std::fs;
use std::io::Write;
use std::process::Command;

use tempfile::Builder;
use tracing::debug;

use crate::error::{Error, Result};

pub const ENTRY_TEMPLATE: &str = "\
# Write the task below. Lines starting with '#' are ignored.
# Syntax: [due date] (Low|Medium|High) {Category} task text
";

/// Opens `initial` in `editor` and returns the buffer once the editor exits.
pub fn compose(editor: &str, initial: &str) -> Result<String> {
    let mut file = Builder::new().prefix("tidy-").suffix(".txt").tempfile()?;
    file.write_all(initial.as_bytes())?;
    file.flush()?;

    let mut parts = editor.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| Error::Editor("no editor configured".to_string()))?;
    debug!(editor, path = %file.path().display(), "launching editor");
    let status = Command::new(program)
        .args(parts)
        .arg(file.path())
        .status()
        .map_err(|e| Error::Editor(format!("can't run `{editor}`: {e}")))?;
    if !status.success() {
        return Err(Error::Editor(format!("`{editor}` exited with {status}")));
    }
    Ok(fs::read_to_string(file.path())?)
}
