// Server log files - tail reads and size/line statistics per instance

use crate::instances::{InstanceRegistry, RegistryError, ServerTarget};
use crate::operations::format_bytes;
use serde::Serialize;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

pub const DEFAULT_TAIL_LINES: usize = 500;
pub const MAX_TAIL_LINES: usize = 10_000;

const TAIL_CHUNK: u64 = 16 * 1024;

#[derive(Error, Debug)]
pub enum LogError {
    #[error(transparent)]
    Instance(#[from] RegistryError),

    #[error("Unknown log type: {0}")]
    UnknownKind(String),

    #[error("No {kind} log configured for instance {instance}")]
    NotConfigured { instance: String, kind: LogKind },

    #[error("Failed to read log {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Main,
    Maintenance,
    /// Lines of the main log mentioning "error"
    Errors,
}

impl LogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::Main => "main",
            LogKind::Maintenance => "maintenance",
            LogKind::Errors => "errors",
        }
    }

    fn path(self, target: &ServerTarget) -> Option<&Path> {
        match self {
            LogKind::Main | LogKind::Errors => target.log_path.as_deref(),
            LogKind::Maintenance => target.maintenance_log_path.as_deref(),
        }
    }
}

impl std::fmt::Display for LogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LogKind {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main" | "server" => Ok(LogKind::Main),
            "maintenance" => Ok(LogKind::Maintenance),
            "errors" => Ok(LogKind::Errors),
            other => Err(LogError::UnknownKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogStats {
    pub total_lines: u64,
    pub file_size: u64,
    pub file_size_formatted: String,
}

pub struct LogService {
    registry: Arc<InstanceRegistry>,
}

impl LogService {
    pub fn new(registry: Arc<InstanceRegistry>) -> Self {
        Self { registry }
    }

    /// Last `lines` lines of an instance log. A log file that does not exist yet reads as empty.
    pub async fn read_log(
        &self,
        instance_id: &str,
        kind: LogKind,
        lines: usize,
    ) -> Result<Vec<String>, LogError> {
        let path = self.log_path(instance_id, kind)?;
        let lines = lines.clamp(1, MAX_TAIL_LINES);

        let tail = match tail_lines(&path, lines).await {
            Ok(tail) => tail,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(LogError::Io { path, source }),
        };

        if kind == LogKind::Errors {
            return Ok(tail
                .into_iter()
                .filter(|line| line.to_lowercase().contains("error"))
                .collect());
        }
        Ok(tail)
    }

    /// Line count and size. A missing file counts as empty.
    pub async fn stats(&self, instance_id: &str, kind: LogKind) -> Result<LogStats, LogError> {
        let path = self.log_path(instance_id, kind)?;

        match count_lines(&path).await {
            Ok((total_lines, file_size)) => Ok(LogStats {
                total_lines,
                file_size,
                file_size_formatted: format_bytes(file_size),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(LogStats {
                total_lines: 0,
                file_size: 0,
                file_size_formatted: format_bytes(0),
            }),
            Err(source) => Err(LogError::Io { path, source }),
        }
    }

    fn log_path(&self, instance_id: &str, kind: LogKind) -> Result<PathBuf, LogError> {
        let target = self.registry.resolve_instance(instance_id)?;
        let path = kind.path(&target).map(Path::to_path_buf);
        path.ok_or_else(|| LogError::NotConfigured {
            instance: instance_id.to_string(),
            kind,
        })
    }
}

/// Read backwards from the end until `lines` complete lines are buffered
async fn tail_lines(path: &Path, lines: usize) -> std::io::Result<Vec<String>> {
    let mut file = File::open(path).await?;
    let len = file.metadata().await?.len();

    let mut start = len;
    let mut buf: Vec<u8> = Vec::new();
    while start > 0 {
        let step = TAIL_CHUNK.min(start);
        start -= step;

        file.seek(SeekFrom::Start(start)).await?;
        let mut chunk = vec![0u8; step as usize];
        file.read_exact(&mut chunk).await?;
        chunk.extend_from_slice(&buf);
        buf = chunk;

        if buf.iter().filter(|b| **b == b'\n').count() > lines {
            break;
        }
    }

    let text = String::from_utf8_lossy(&buf);
    let all: Vec<&str> = text.lines().collect();
    let skip = all.len().saturating_sub(lines);
    Ok(all[skip..].iter().map(|line| line.to_string()).collect())
}

async fn count_lines(path: &Path) -> std::io::Result<(u64, u64)> {
    let mut file = File::open(path).await?;
    let mut buf = vec![0u8; TAIL_CHUNK as usize];
    let mut lines = 0u64;
    let mut size = 0u64;
    let mut last = b'\n';

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        size += n as u64;
        lines += buf[..n].iter().filter(|b| **b == b'\n').count() as u64;
        last = buf[n - 1];
    }

    // An unterminated final line still counts
    if last != b'\n' {
        lines += 1;
    }
    Ok((lines, size))
}
