//! Persistent request and service logs for long-running processes.
//!
//! Entries are appended to a JSONL file, one object per line, and read back
//! newest-first with optional level filtering. The handle is cheap to clone
//! and safe to share between request handlers.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

#[cfg(feature = "schemars")]
use schemars::JsonSchema;

use crate::Level;

/// HTTP request details attached to an entry.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[cfg_attr(feature = "schemars", derive(JsonSchema))]
pub struct LogContext {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub request_id: Option<String>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub method: Option<String>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub path: Option<String>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub user_agent: Option<String>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub duration_ms: Option<f64>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub status_code: Option<u16>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[cfg_attr(feature = "schemars", derive(JsonSchema))]
pub struct LogEntry {
  pub timestamp: DateTime<Utc>,
  pub level: String,
  pub message: String,
  pub component: String,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub context: Option<LogContext>,
}

struct LogFile {
  path: PathBuf,
  echo: bool,
}

impl LogFile {
  fn open(path: &Path, echo: bool) -> std::io::Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
      File::create(path)?;
    }
    Ok(Self { path: path.to_path_buf(), echo })
  }

  fn append(&self, entry: &LogEntry) -> std::io::Result<()> {
    let line = serde_json::to_string(entry)
      .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
    writeln!(file, "{line}")?;
    file.flush()
  }

  fn read(&self, limit: Option<usize>, level: Option<&str>) -> std::io::Result<Vec<LogEntry>> {
    if !self.path.exists() {
      return Ok(Vec::new());
    }

    let reader = BufReader::new(File::open(&self.path)?);
    let mut entries = Vec::new();
    for line in reader.lines() {
      let line = line?;
      if line.trim().is_empty() {
        continue;
      }
      // Lines from an interrupted write are skipped.
      let Ok(entry) = serde_json::from_str::<LogEntry>(&line) else {
        continue;
      };
      if level.is_none_or(|wanted| wanted == "all" || entry.level == wanted) {
        entries.push(entry);
      }
    }

    // Newest N, then oldest-first for terminal display.
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    if let Some(limit) = limit {
      entries.truncate(limit);
    }
    entries.reverse();
    Ok(entries)
  }
}

/// Shared JSONL log store.
#[derive(Clone)]
pub struct DaemonLogs {
  inner: Arc<Mutex<LogFile>>,
}

impl DaemonLogs {
  /// Open (or create) the log file and echo each entry to the console.
  pub fn new<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
    Self::with_echo(path, true)
  }

  /// Open the log file without console echo, used by tests and quiet servers.
  pub fn silent<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
    Self::with_echo(path, false)
  }

  fn with_echo<P: AsRef<Path>>(path: P, echo: bool) -> std::io::Result<Self> {
    let file = LogFile::open(path.as_ref(), echo)?;
    Ok(Self { inner: Arc::new(Mutex::new(file)) })
  }

  pub async fn path(&self) -> PathBuf {
    self.inner.lock().await.path.clone()
  }

  /// Append an entry. Write failures are reported on the console only.
  pub async fn record(
    &self,
    level: Level,
    message: &str,
    component: &str,
    context: Option<LogContext>,
  ) {
    let entry = LogEntry {
      timestamp: Utc::now(),
      level: level.as_str().to_string(),
      message: message.to_string(),
      component: component.to_string(),
      context,
    };

    let file = self.inner.lock().await;
    if let Err(e) = file.append(&entry) {
      crate::warn!("failed to write log entry to {}: {}", file.path.display(), e);
    }
    if file.echo {
      crate::emit(level, message);
    }
  }

  pub async fn info(&self, message: &str, component: &str) {
    self.record(Level::Info, message, component, None).await;
  }

  pub async fn warn(&self, message: &str, component: &str) {
    self.record(Level::Warn, message, component, None).await;
  }

  pub async fn error(&self, message: &str, component: &str) {
    self.record(Level::Error, message, component, None).await;
  }

  pub async fn success(&self, message: &str, component: &str) {
    self.record(Level::Success, message, component, None).await;
  }

  /// Read back up to `limit` of the newest entries, oldest first.
  pub async fn entries(
    &self,
    limit: Option<usize>,
    level: Option<&str>,
  ) -> std::io::Result<Vec<LogEntry>> {
    self.inner.lock().await.read(limit, level)
  }
}
