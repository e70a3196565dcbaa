//! Single-file JSON persistence for `TaskProgress`.
//!
//! A missing file loads as fresh state. A file that cannot be parsed (or lacks
//! required keys) is logged as a warning and also loads as fresh state; its
//! previous content is discarded on the next save. Saves go to a temp file in
//! the same directory and are renamed over the target.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write as _};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use chrono::Utc;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::audit::AuditLog;
use crate::model::{Context, MainTask, Subtask, Timestamp};
use crate::progress::TaskProgress;

pub const SCHEMA_VERSION: &str = "1.0";

/// On-disk shape of the progress file.
#[derive(Debug, Serialize, Deserialize)]
struct ProgressFile {
    #[serde(default = "default_version")]
    version: String,
    #[serde(default = "Utc::now")]
    created_at: Timestamp,
    #[serde(default = "Utc::now")]
    updated_at: Timestamp,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    main_task: Option<MainTask>,
    #[serde(default)]
    subtasks: Vec<Subtask>,
    #[serde(default)]
    context: Context,
    #[serde(default)]
    audit_log: AuditLog,
}

fn default_version() -> String {
    SCHEMA_VERSION.to_string()
}

impl From<&TaskProgress> for ProgressFile {
    fn from(p: &TaskProgress) -> Self {
        ProgressFile {
            version: SCHEMA_VERSION.to_string(),
            created_at: p.created_at,
            updated_at: p.updated_at,
            session_id: p.session_id.clone(),
            main_task: p.main_task.clone(),
            subtasks: p.subtasks().to_vec(),
            context: p.context.clone(),
            audit_log: p.audit_log().clone(),
        }
    }
}

impl From<ProgressFile> for TaskProgress {
    fn from(f: ProgressFile) -> Self {
        TaskProgress::from_parts(
            f.created_at,
            f.updated_at,
            f.session_id,
            f.main_task,
            f.subtasks,
            f.context,
            f.audit_log,
        )
    }
}

/// Parse progress file content.
pub fn parse(content: &str) -> Result<TaskProgress> {
    let file: ProgressFile = serde_json::from_str(content)?;
    if file.version != SCHEMA_VERSION {
        warn!(
            "progress file has schema version {}, expected {SCHEMA_VERSION}; loading anyway",
            file.version
        );
    }
    Ok(file.into())
}

/// Serialize progress to the on-disk JSON format.
pub fn render(progress: &TaskProgress) -> Result<String> {
    Ok(serde_json::to_string_pretty(&ProgressFile::from(progress))?)
}

/// Result of reading the progress file.
#[derive(Debug)]
pub enum Loaded {
    Missing,
    Parsed(TaskProgress),
    /// The file exists but could not be parsed; `load` warns and starts fresh.
    Recovered(anyhow::Error),
}

/// Outcome of a `ProgressStore::cycle` closure.
#[derive(Debug)]
pub enum Commit<T> {
    Save(T),
    Discard(T),
}

#[derive(Debug, Clone)]
pub struct ProgressStore {
    path: PathBuf,
    locking: bool,
}

impl ProgressStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ProgressStore {
            path: path.into(),
            locking: true,
        }
    }

    /// Enable or disable the advisory lock taken by `transact`.
    pub fn with_locking(mut self, enabled: bool) -> Self {
        self.locking = enabled;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|f| f.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    /// Read the progress file without recovering. I/O failures other than a
    /// missing file are errors; unparsable content is reported as
    /// `Loaded::Recovered`.
    pub fn read(&self) -> Result<Loaded> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Loaded::Missing),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", self.path.display()))
            }
        };
        Ok(match parse(&content) {
            Ok(progress) => Loaded::Parsed(progress),
            Err(e) => Loaded::Recovered(e),
        })
    }

    /// Load progress, starting fresh when the file is missing or unparsable.
    pub fn load(&self) -> Result<TaskProgress> {
        match self.read()? {
            Loaded::Missing => {
                debug!("no progress file at {}; starting fresh", self.path.display());
                Ok(TaskProgress::new())
            }
            Loaded::Parsed(progress) => {
                debug!(
                    "loaded {} subtask(s) from {}",
                    progress.subtasks().len(),
                    self.path.display()
                );
                Ok(progress)
            }
            Loaded::Recovered(e) => {
                warn!(
                    "could not load {}: {e:#}; starting with empty progress",
                    self.path.display()
                );
                Ok(TaskProgress::new())
            }
        }
    }

    /// Stamp `updated_at` and atomically replace the progress file.
    pub fn save(&self, progress: &mut TaskProgress) -> Result<()> {
        progress.touch();
        let json = render(progress)?;
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        if !dir.exists() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create directory {}", dir.display()))?;
        }
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
        tmp.write_all(json.as_bytes())?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        debug!("saved progress to {}", self.path.display());
        Ok(())
    }

    /// Run one load -> mutate -> save cycle. Nothing is written when `f`
    /// fails. With locking enabled, concurrent cycles against the same file
    /// are serialized through an exclusive lock on `<file>.lock`.
    pub fn transact<T>(&self, f: impl FnOnce(&mut TaskProgress) -> Result<T>) -> Result<T> {
        self.cycle(|progress| f(progress).map(Commit::Save))
    }

    /// Like `transact`, but `f` decides whether its changes are written.
    pub fn cycle<T>(&self, f: impl FnOnce(&mut TaskProgress) -> Result<Commit<T>>) -> Result<T> {
        let _lock = if self.locking {
            Some(self.acquire_lock()?)
        } else {
            None
        };
        let mut progress = self.load()?;
        match f(&mut progress)? {
            Commit::Save(value) => {
                self.save(&mut progress)?;
                Ok(value)
            }
            Commit::Discard(value) => Ok(value),
        }
    }

    /// Reset `progress` and delete the backing file. The lock file stays:
    /// other processes may be blocked on it.
    pub fn clear(&self, progress: &mut TaskProgress) -> Result<()> {
        progress.reset();
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to remove {}", self.path.display())),
        }
    }

    /// Block until an exclusive advisory lock on the lock file is held. The
    /// lock is released when the returned file is dropped.
    fn acquire_lock(&self) -> Result<File> {
        let lock_path = self.lock_path();
        if let Some(dir) = lock_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create directory {}", dir.display()))?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("failed to open lock file {}", lock_path.display()))?;

        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
        if rc != 0 {
            return Err(io::Error::last_os_error()).context("flock failed");
        }
        Ok(file)
    }
}
