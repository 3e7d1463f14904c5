//! Per-directory record of files already fetched.

use std::{
    collections::HashSet,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use serde::Serialize;
use tokio::{
    fs::{self, File, OpenOptions},
    io::AsyncWriteExt,
};

use crate::{error::Result, identity::FileIdentity};

/// Hidden sidecar file kept in every course directory.
pub const LOG_FILE: &str = ".log";

/// Append-only set of identities fetched into one directory.
///
/// Every [`record`](Self::record) is on disk before it returns; entries are
/// never removed.
#[derive(Debug)]
pub struct DownloadLog {
    dir: PathBuf,
    seen: HashSet<FileIdentity>,
    file: File,
}

impl DownloadLog {
    /// Opens the log for `dir`, creating the directory and the sidecar as needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        let path = dir.join(LOG_FILE);

        let existing = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        let seen = existing.lines().filter_map(FileIdentity::from_logged).collect();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        // Terminate a line cut short by an earlier crash.
        if !existing.is_empty() && !existing.ends_with('\n') {
            file.write_all(b"\n").await?;
            file.flush().await?;
        }

        Ok(Self { dir, seen, file })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn contains(&self, id: &FileIdentity) -> bool {
        self.seen.contains(id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Durably appends `id`. Recording a known identity is a no-op.
    pub async fn record(&mut self, id: FileIdentity) -> Result<()> {
        if self.seen.contains(&id) {
            return Ok(());
        }
        self.file.write_all(format!("{id}\n").as_bytes()).await?;
        self.file.flush().await?;
        self.file.sync_data().await?;
        self.seen.insert(id);
        Ok(())
    }

    /// Flushes and releases the sidecar file.
    pub async fn close(mut self) -> Result<()> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        Ok(())
    }
}

/// Identities logged in `dir`, in the order they were recorded.
pub async fn read_log(dir: &Path) -> Result<Vec<FileIdentity>> {
    match fs::read_to_string(dir.join(LOG_FILE)).await {
        Ok(contents) => Ok(contents.lines().filter_map(FileIdentity::from_logged).collect()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// A course directory together with its download log.
#[derive(Debug, Clone, Serialize)]
pub struct LoggedDir {
    pub name: String,
    pub identities: Vec<FileIdentity>,
}

/// Collects the logs of every directory directly under `root`, sorted by name.
///
/// A missing root yields nothing.
pub async fn scan_logs(root: &Path) -> Result<Vec<LoggedDir>> {
    let mut entries = match fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut logged = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await?.is_dir() || !path.join(LOG_FILE).is_file() {
            continue;
        }
        logged.push(LoggedDir {
            name: entry.file_name().to_string_lossy().into_owned(),
            identities: read_log(&path).await?,
        });
    }
    logged.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(logged)
}
