//! Filesystem primitives shared by every persistence-touching component:
//! atomic whole-file replacement, append-only JSONL writes, and the advisory
//! cross-process write lock used to hot-swap the System 1 cache.

use crate::error::{Error, Result};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Write `bytes` to `path` atomically: write to a sibling temp file, then
/// rename over the target. The rename is atomic on any filesystem where
/// source and destination share a mount, which holds here because the temp
/// file is always created in `path`'s own parent directory.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let tmp_name = format!(
        ".{}.tmp-{}",
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("duet-core"),
        uuid::Uuid::new_v4()
    );
    let tmp_path = parent.join(tmp_name);

    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Serialize `value` and atomically replace the contents of `path` with it.
pub fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    atomic_write(path, &bytes)
}

/// Append one JSON value as a single line to the JSONL file at `path`,
/// creating it (and its parent directory) if necessary. UTF-8, LF-terminated,
/// no trailing commas — one object per line.
pub fn append_jsonl<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut line = serde_json::to_string(value)?;
    line.push('\n');

    let mut file = OpenOptions::new().append(true).create(true).open(path)?;
    file.write_all(line.as_bytes())?;
    Ok(())
}

/// Read every line of a JSONL file, skipping blank lines. Missing files read
/// as empty (fresh install), matching the persistence layer's tolerance for
/// absent state.
pub fn read_jsonl<T: for<'de> serde::Deserialize<'de>>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(Error::from))
        .collect()
}

const LOCK_BACKOFF: Duration = Duration::from_millis(50);
const LOCK_DEADLINE: Duration = Duration::from_secs(2);

/// Advisory write lock for a target file, realized as a sibling `<path>.lock`
/// file carrying the holder's PID and acquisition timestamp. Readers never
/// take this lock; only writers serialize through it, per the hot-swap
/// protocol for the System 1 cache.
pub struct FileLock {
    lock_path: PathBuf,
}

impl FileLock {
    /// Try to acquire the lock on `target`, retrying with a fixed backoff
    /// until `LOCK_DEADLINE` elapses.
    pub fn acquire(target: &Path) -> Result<Self> {
        let lock_path = lock_path_for(target);
        let deadline = Instant::now() + LOCK_DEADLINE;

        loop {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
            {
                Ok(mut file) => {
                    let payload = format!("{}\t{}\n", std::process::id(), now_millis());
                    let _ = file.write_all(payload.as_bytes());
                    return Ok(Self { lock_path });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if Instant::now() >= deadline {
                        return Err(Error::lock_contention(
                            target.display().to_string(),
                            LOCK_DEADLINE.as_millis() as u64,
                        ));
                    }
                    std::thread::sleep(LOCK_BACKOFF);
                }
                Err(e) => return Err(Error::from(e)),
            }
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}

fn lock_path_for(target: &Path) -> PathBuf {
    let mut s = target.as_os_str().to_owned();
    s.push(".lock");
    PathBuf::from(s)
}

fn now_millis() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn atomic_write_replaces_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        atomic_write(&path, b"{\"a\":1}").unwrap();
        atomic_write(&path, b"{\"a\":2}").unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "{\"a\":2}");
    }

    #[test]
    fn append_jsonl_appends_one_line_per_call() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        append_jsonl(&path, &serde_json::json!({"n": 1})).unwrap();
        append_jsonl(&path, &serde_json::json!({"n": 2})).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(!content.ends_with(",\n"));
    }

    #[test]
    fn read_jsonl_on_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.jsonl");
        let values: Vec<serde_json::Value> = read_jsonl(&path).unwrap();
        assert!(values.is_empty());
    }

    #[test]
    fn file_lock_excludes_a_second_acquirer() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("system1-cache.json");
        let first = FileLock::acquire(&target).unwrap();
        let lock_file = lock_path_for(&target);
        assert!(lock_file.exists());
        drop(first);
        assert!(!lock_file.exists());
    }
}
