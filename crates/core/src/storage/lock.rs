use crate::domain::report::RunId;
use anyhow::Context;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

// A lock older than this is left over from a crashed or killed run.
const STALE_AFTER: Duration = Duration::from_secs(6 * 3600);

/// Best-effort guard against two overlapping runs for the same run id.
///
/// Held for the lifetime of the value; the lock file is removed on drop.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

fn lock_path(dir: &Path, run_id: RunId) -> PathBuf {
    dir.join(format!("{}.lock", run_id.file_stem()))
}

impl RunLock {
    /// Returns `Ok(None)` when another live run holds the lock.
    pub fn try_acquire(dir: &Path, run_id: RunId) -> anyhow::Result<Option<Self>> {
        let path = lock_path(dir, run_id);
        if is_stale(&path) {
            tracing::warn!(%run_id, path = %path.display(), "removing stale run lock");
            let _ = std::fs::remove_file(&path);
        }

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                let _ = writeln!(file, "pid={} run_id={run_id}", std::process::id());
                Ok(Some(Self { path }))
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
            Err(err) => {
                Err(err).with_context(|| format!("failed to create run lock {}", path.display()))
            }
        }
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %err, "failed to release run lock");
        }
    }
}

fn is_stale(path: &Path) -> bool {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > STALE_AFTER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn run_id() -> RunId {
        RunId::for_date(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap())
    }

    #[test]
    fn second_acquire_is_refused_until_release() {
        let dir = tempfile::tempdir().unwrap();

        let held = RunLock::try_acquire(dir.path(), run_id()).unwrap();
        assert!(held.is_some());
        assert!(RunLock::try_acquire(dir.path(), run_id()).unwrap().is_none());

        drop(held);
        assert!(RunLock::try_acquire(dir.path(), run_id()).unwrap().is_some());
    }

    #[test]
    fn different_days_do_not_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let other = RunId::for_date(NaiveDate::from_ymd_opt(2026, 10, 20).unwrap());

        let _a = RunLock::try_acquire(dir.path(), run_id()).unwrap().unwrap();
        assert!(RunLock::try_acquire(dir.path(), other).unwrap().is_some());
    }
}
