// Backup store - lists, locates and deletes backup archives

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Invalid filename")]
    InvalidFilename,

    #[error("Only .zip files can be deleted")]
    NotZip,

    #[error("Backup {0} not found")]
    NotFound(String),

    #[error("Failed to access backups: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupInfo {
    pub filename: String,
    pub path: PathBuf,
    pub size: u64,
    pub size_formatted: String,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct BackupStore {
    dir: PathBuf,
}

impl BackupStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// All `.zip` archives, newest first. A missing directory is an empty list.
    pub async fn list(&self) -> Result<Vec<BackupInfo>, BackupError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut backups = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let filename = entry.file_name().to_string_lossy().to_string();
            if !filename.ends_with(".zip") {
                continue;
            }

            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }

            let created: DateTime<Utc> = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());

            backups.push(BackupInfo {
                filename,
                path: entry.path(),
                size: metadata.len(),
                size_formatted: format_bytes(metadata.len()),
                created,
            });
        }

        backups.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| b.filename.cmp(&a.filename)));
        Ok(backups)
    }

    pub async fn latest(&self) -> Result<Option<BackupInfo>, BackupError> {
        Ok(self.list().await?.into_iter().next())
    }

    pub async fn delete(&self, filename: &str) -> Result<String, BackupError> {
        if filename.is_empty()
            || filename.contains("..")
            || filename.contains('/')
            || filename.contains('\\')
        {
            return Err(BackupError::InvalidFilename);
        }
        if !filename.ends_with(".zip") {
            return Err(BackupError::NotZip);
        }

        let path = self.dir.join(filename);
        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => {}
            Ok(_) => return Err(BackupError::NotFound(filename.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BackupError::NotFound(filename.to_string()))
            }
            Err(e) => return Err(e.into()),
        }

        tokio::fs::remove_file(&path).await?;
        tracing::info!("Deleted backup {:?}", path);
        Ok(format!("Backup {} deleted successfully", filename))
    }
}

pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}
