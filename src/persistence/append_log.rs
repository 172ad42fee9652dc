//! Append-only command log
//!
//! One accepted mutating command per line, replayed in order on restart.

use std::path::{Path, PathBuf};

use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::Result;

/// Appends command lines to a log file.
///
/// The file handle is opened lazily on the first append so a store that
/// is still replaying never holds the log open for writing.
///
/// A failed append may leave part of its line in the file. The handle is
/// then dropped, and the next append reopens the file and cuts it back to
/// the last complete line before writing, so a torn tail is never glued
/// onto the following command.
#[derive(Debug)]
pub struct AppendLog {
    path: PathBuf,
    file: Option<File>,
    /// File length after the last complete append
    len: u64,
    /// Set when an append failed after possibly writing some bytes
    torn: bool,
}

impl AppendLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
            len: 0,
            torn: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one command line and flushes it.
    pub async fn append(&mut self, line: &str) -> Result<()> {
        let mut record = String::with_capacity(line.len() + 1);
        record.push_str(line);
        record.push('\n');

        let file = self.open().await?;
        let written = match file.write_all(record.as_bytes()).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            warn!(path = %self.path.display(), "append failed, log tail will be cut back: {}", e);
            self.file = None;
            self.torn = true;
            return Err(e.into());
        }

        self.len += record.len() as u64;
        Ok(())
    }

    /// Returns the open handle, opening the file and repairing a torn tail
    /// first if needed.
    async fn open(&mut self) -> Result<&mut File> {
        let file = match self.file.take() {
            Some(file) => file,
            None => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)
                    .await?;

                if self.torn {
                    file.set_len(self.len).await?;
                    self.torn = false;
                    debug!(path = %self.path.display(), len = self.len, "append log tail cut back");
                } else {
                    self.len = file.metadata().await?.len();
                }
                file
            }
        };
        Ok(self.file.insert(file))
    }
}

/// Reads every line of a log file. A missing file yields `None`.
pub async fn read_lines(path: &Path) -> Result<Option<Vec<String>>> {
    match fs::read_to_string(path).await {
        Ok(contents) => Ok(Some(contents.lines().map(str::to_string).collect())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
