//! Shared subprocess plumbing for the `hg` and `git` wrappers.

use std::process::Command;

use tracing::debug;

use crate::error::{HgError, Result};

/// Run a prepared command and return its stdout. A non-zero exit becomes a
/// [`HgError::CommandFailed`] carrying the rendered command line and
/// stderr.
pub(crate) fn run(cmd: &mut Command) -> Result<String> {
    let rendered = render(cmd);
    debug!("Running {rendered}");
    let output = cmd.output()?;
    if !output.status.success() {
        return Err(HgError::CommandFailed {
            command: rendered,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// The command line as a single string, for logs and error messages.
pub(crate) fn render(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().to_string()];
    parts.extend(cmd.get_args().map(|arg| arg.to_string_lossy().to_string()));
    parts.join(" ")
}
