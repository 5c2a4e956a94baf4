//! Capabilities supplied by the embedding shell.
//!
//! The store never touches native dialogs or chooses where files land; it
//! asks the host. [`LocalHost`] is the terminal/filesystem implementation
//! used by the command-line front end.

use std::error::Error;
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use crate::api::images::{decode_data_url, extension_for_mime, preview_url};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileDialogOptions {
    pub title: Option<String>,
    pub multiple: bool,
}

#[derive(Debug)]
pub enum HostError {
    Io(io::Error),
    InvalidName(String),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::Io(err) => write!(f, "{err}"),
            HostError::InvalidName(name) => write!(f, "Invalid file name '{name}'"),
        }
    }
}

impl Error for HostError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            HostError::Io(err) => Some(err),
            HostError::InvalidName(_) => None,
        }
    }
}

impl From<io::Error> for HostError {
    fn from(err: io::Error) -> Self {
        HostError::Io(err)
    }
}

#[async_trait]
pub trait HostShell: Send + Sync {
    /// Let the user pick one or more files. An empty list means cancelled.
    async fn open_file_dialog(&self, options: FileDialogOptions) -> Result<Vec<PathBuf>, HostError>;

    /// Persist `bytes` under an app-owned location and return the path
    /// actually written.
    async fn save_blob(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, HostError>;
}

/// Saves blobs into a directory and "opens" files by prompting on the
/// terminal.
#[derive(Debug, Clone)]
pub struct LocalHost {
    output_dir: PathBuf,
}

impl LocalHost {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[async_trait]
impl HostShell for LocalHost {
    async fn open_file_dialog(&self, options: FileDialogOptions) -> Result<Vec<PathBuf>, HostError> {
        let mut stdin = BufReader::new(tokio::io::stdin());
        Ok(prompt_for_paths(&mut stdin, &options).await?)
    }

    async fn save_blob(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, HostError> {
        let file_name = sanitize_file_name(name)?;
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(file_name);
        tokio::fs::write(&path, bytes).await?;
        debug!(path = %path.display(), size = bytes.len(), "saved blob");
        Ok(path)
    }
}

/// Print the dialog prompt and read one line of paths from `input`.
async fn prompt_for_paths<R>(input: &mut R, options: &FileDialogOptions) -> io::Result<Vec<PathBuf>>
where
    R: AsyncBufRead + Unpin,
{
    let title = options.title.as_deref().unwrap_or("Select a file");
    if options.multiple {
        print!("{title} (paths separated by spaces, empty to cancel): ");
    } else {
        print!("{title} (empty to cancel): ");
    }
    io::stdout().flush()?;

    let mut line = String::new();
    input.read_line(&mut line).await?;
    Ok(parse_picked_paths(&line, options.multiple))
}

/// Keep only paths that exist as files; single-select keeps the first.
fn parse_picked_paths(input: &str, multiple: bool) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = input
        .split_whitespace()
        .map(PathBuf::from)
        .filter(|path| {
            let exists = path.is_file();
            if !exists {
                warn!(path = %path.display(), "ignoring picked path that is not a file");
            }
            exists
        })
        .collect();
    if !multiple {
        paths.truncate(1);
    }
    paths
}

/// Reduce a requested name to its final component so callers cannot write
/// outside the host's directory.
fn sanitize_file_name(name: &str) -> Result<String, HostError> {
    Path::new(name.trim())
        .file_name()
        .and_then(|file_name| file_name.to_str())
        .filter(|file_name| !file_name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| HostError::InvalidName(name.to_string()))
}

/// Write every `data:` image through the host as `<stem>-<n>.<ext>`.
/// Remote URLs are left alone. Returns the written paths in order.
pub async fn persist_generated_images(
    host: &dyn HostShell,
    images: &[String],
    stem: &str,
) -> Result<Vec<PathBuf>, HostError> {
    let mut written = Vec::new();
    for (index, url) in images.iter().enumerate() {
        let Some(data) = decode_data_url(url) else {
            debug!(url = %preview_url(url), "not a data URL, skipping save");
            continue;
        };
        let name = format!(
            "{stem}-{}.{}",
            index + 1,
            extension_for_mime(&data.mime_type)
        );
        written.push(host.save_blob(&name, &data.bytes).await?);
    }
    Ok(written)
}
