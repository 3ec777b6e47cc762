use std::path::{Path, PathBuf};

use isoforge_shared::{ForgeError, ForgeResult};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Find a tool binary.
///
/// A path with a directory component is used as-is and must exist; a bare
/// name is looked up in `PATH`.
///
/// # Returns
/// * `Ok(PathBuf)` - Path to the found binary
/// * `Err(ForgeError::Config)` - Binary not found in any searched location
pub fn find_binary(program: &Path) -> ForgeResult<PathBuf> {
    if program.components().count() > 1 {
        if program.is_file() {
            return Ok(program.to_path_buf());
        }
        return Err(ForgeError::Config(format!(
            "Binary '{}' not found",
            program.display()
        )));
    }

    let candidates: Vec<PathBuf> = std::env::var_os("PATH")
        .map(|paths| {
            std::env::split_paths(&paths)
                .map(|dir| dir.join(program))
                .collect()
        })
        .unwrap_or_default();

    for candidate in &candidates {
        if candidate.is_file() {
            tracing::debug!(binary = %candidate.display(), "Found binary");
            return Ok(candidate.clone());
        }
    }

    let locations = candidates
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ForgeError::Config(format!(
        "Binary '{}' not found.\nSearched locations:\n{}",
        program.display(),
        locations
    )))
}

/// Install the global tracing subscriber.
///
/// Logs go to stderr; with `log_file` they are also appended to that file
/// through a non-blocking writer. Keep the returned guard alive until exit so
/// buffered lines are flushed.
pub fn init_logging(env_filter: EnvFilter, log_file: Option<&Path>) -> ForgeResult<Option<WorkerGuard>> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| ForgeError::io(format!("opening log file {}", path.display()), e))?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    Ok(guard)
}
