//! Durable local store: the authoritative task map plus the FIFO queue of
//! operations not yet confirmed by the server.
//!
//! Both live in one JSON file so a crash can never leave a mutation applied
//! without its queue entry or vice versa. Mutators touch memory only;
//! callers persist once per logical mutation, under the store lock.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tasksync_core::models::{PendingOperation, Task};

use crate::errors::ClientResult;

/// On-disk layout: `{"tasks": {id: Task}, "operations": [PendingOperation]}`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    tasks: HashMap<String, Task>,
    #[serde(default)]
    operations: Vec<PendingOperation>,
}

#[derive(Debug)]
pub struct LocalStore {
    path: PathBuf,
    tasks: HashMap<String, Task>,
    operations: Vec<PendingOperation>,
}

impl LocalStore {
    /// Hydrate from disk. A missing file starts empty; an unreadable one is
    /// renamed to `<path>.backup-<unix-ts>` and the store starts empty
    /// rather than destroying whatever is in it.
    pub fn load(path: impl Into<PathBuf>) -> ClientResult<Self> {
        let path = path.into();
        let file = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<StoreFile>(&raw) {
                Ok(file) => file,
                Err(err) => {
                    let backup = backup_path(&path);
                    tracing::warn!(
                        "store file {} is corrupt ({}), preserving it as {}",
                        path.display(),
                        err,
                        backup.display()
                    );
                    fs::rename(&path, &backup)?;
                    StoreFile::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => StoreFile::default(),
            Err(err) => return Err(err.into()),
        };

        tracing::debug!(
            "loaded {} tasks and {} pending operations from {}",
            file.tasks.len(),
            file.operations.len(),
            path.display()
        );

        Ok(Self {
            path,
            tasks: file.tasks,
            operations: file.operations,
        })
    }

    /// Flush the current state to disk: write `<path>.tmp`, fsync, then
    /// rename into place. A crash mid-write leaves the previous file; a
    /// failed rename leaves it too.
    pub fn persist(&self) -> ClientResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let blob = serde_json::to_vec(&StoreFile {
            tasks: self.tasks.clone(),
            operations: self.operations.clone(),
        })?;

        let tmp = tmp_path(&self.path);
        let mut file = File::create(&tmp)?;
        file.write_all(&blob)?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Throw away in-memory state and re-read the last durable file. Used
    /// to roll back after a failed persist.
    pub fn reload(&mut self) -> ClientResult<()> {
        *self = Self::load(self.path.clone())?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn put(&mut self, task: Task) {
        self.tasks.insert(task.id.clone(), task);
    }

    pub fn remove(&mut self, id: &str) -> Option<Task> {
        self.tasks.remove(id)
    }

    pub fn all(&self) -> Vec<Task> {
        self.tasks.values().cloned().collect()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn enqueue(&mut self, op: PendingOperation) {
        self.operations.push(op);
    }

    /// Stable snapshot of the queue for one sync pass. Does not mutate.
    pub fn peek_batch(&self) -> Vec<PendingOperation> {
        self.operations.clone()
    }

    /// Remove exactly the `n` oldest operations (the ones just confirmed).
    /// Entries enqueued during the network round-trip stay put.
    pub fn commit(&mut self, n: usize) {
        let n = n.min(self.operations.len());
        self.operations.drain(..n);
    }

    pub fn operations(&self) -> &[PendingOperation] {
        &self.operations
    }

    pub fn operations_mut(&mut self) -> &mut [PendingOperation] {
        &mut self.operations
    }

    pub fn pending_count(&self) -> usize {
        self.operations.len()
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}

fn backup_path(path: &Path) -> PathBuf {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let mut os = path.as_os_str().to_owned();
    os.push(format!(".backup-{ts}"));
    PathBuf::from(os)
}
