//! Opening a written report in an external program.

use std::path::Path;
use std::process::{Command, Stdio};

use super::ExportError;

/// Program used when no viewer is configured.
#[cfg(target_os = "windows")]
pub const DEFAULT_OPENER: &str = "explorer";
/// Program used when no viewer is configured.
#[cfg(target_os = "macos")]
pub const DEFAULT_OPENER: &str = "open";
/// Program used when no viewer is configured.
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub const DEFAULT_OPENER: &str = "xdg-open";

/// Start `program` on `file` without waiting for it.
///
/// `program` may carry extra arguments separated by whitespace
/// (`"everything -s"`); the file path is appended last. With `None`, the
/// platform opener is used.
///
/// # Errors
///
/// Returns [`ExportError::ViewerLaunch`] if the process cannot be started.
pub fn launch_viewer(program: Option<&str>, file: &Path) -> Result<(), ExportError> {
    let command_line = program.unwrap_or(DEFAULT_OPENER);
    let mut parts = command_line.split_whitespace();
    let Some(executable) = parts.next() else {
        return Err(ExportError::ViewerLaunch {
            program: command_line.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty viewer command"),
        });
    };

    log::debug!("Launching {} on {}", command_line, file.display());

    Command::new(executable)
        .args(parts)
        .arg(file)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|child| log::info!("Opened {} (pid {})", file.display(), child.id()))
        .map_err(|source| ExportError::ViewerLaunch {
            program: executable.to_string(),
            source,
        })
}
