use std::error::Error;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

/// Environment variable consulted for a `tracing` filter directive.
pub const LOG_FILTER_ENV: &str = "OPENCREATOR_LOG";

const DEFAULT_STDERR_FILTER: &str = "opencreator=warn";
const DEFAULT_FILE_FILTER: &str = "opencreator=debug";

/// Install the global `tracing` subscriber.
///
/// Without a log file, diagnostics go to stderr at `warn` so they do not
/// interleave with command output. With `--log <file>`, everything at
/// `debug` and above is appended to that file instead.
pub fn init_tracing(log_file: Option<&Path>) -> Result<(), Box<dyn Error>> {
    let default_filter = if log_file.is_some() {
        DEFAULT_FILE_FILTER
    } else {
        DEFAULT_STDERR_FILTER
    };
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let result = match log_file {
        Some(path) => {
            let file = open_log_file(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
    };

    result.map_err(|err| -> Box<dyn Error> { err })
}

/// Open (creating if needed) a log file in append mode, failing early when
/// the location is not writable.
pub fn open_log_file(path: &Path) -> Result<File, Box<dyn Error>> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| format!("Cannot open log file {}: {err}", path.display()))?;
    Ok(file)
}
