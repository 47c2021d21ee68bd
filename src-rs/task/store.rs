use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::warn;

use super::types::JobRecord;

pub type JobSnapshot = Arc<Vec<JobRecord>>;

/// Ordered job collection, most recent first. Every change publishes a new snapshot, so a
/// reader holding an older `JobSnapshot` never sees a half-applied update. History is written
/// under the write lock, so the file always matches the latest published snapshot.
pub struct JobStore {
    persist_path: Option<PathBuf>,
    jobs: RwLock<JobSnapshot>,
}

impl JobStore {
    pub fn new(persist_path: Option<PathBuf>) -> Self {
        Self {
            persist_path,
            jobs: RwLock::new(Arc::new(Vec::new())),
        }
    }

    pub fn snapshot(&self) -> JobSnapshot {
        match self.jobs.read() {
            Ok(lock) => Arc::clone(&lock),
            Err(_) => Arc::new(Vec::new()),
        }
    }

    pub fn get(&self, id: &str) -> Option<JobRecord> {
        self.snapshot().iter().find(|job| job.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    pub fn has_pollable(&self) -> bool {
        self.snapshot().iter().any(JobRecord::needs_polling)
    }

    pub fn pollable_ids(&self) -> Vec<String> {
        self.snapshot()
            .iter()
            .filter(|job| job.needs_polling())
            .map(|job| job.id.clone())
            .collect()
    }

    /// Puts `record` at the front. A record already stored under the same id is replaced.
    pub fn insert_front(&self, record: JobRecord) -> JobSnapshot {
        let snapshot = {
            let mut guard = match self.jobs.write() {
                Ok(lock) => lock,
                Err(_) => return Arc::new(Vec::new()),
            };
            let jobs = Arc::make_mut(&mut guard);
            if let Some(pos) = jobs.iter().position(|job| job.id == record.id) {
                warn!(task_id = %record.id, "backend reused a task id; replacing the old record");
                jobs.remove(pos);
            }
            jobs.insert(0, record);
            self.save_if_needed(guard.as_slice());
            Arc::clone(&guard)
        };
        snapshot
    }

    /// Applies `apply` to the record with `id`. The closure reports whether it changed
    /// anything; a new snapshot is published and returned only in that case.
    pub fn update<F>(&self, id: &str, apply: F) -> Option<JobSnapshot>
    where
        F: FnOnce(&mut JobRecord) -> bool,
    {
        let snapshot = {
            let mut guard = self.jobs.write().ok()?;
            let pos = guard.iter().position(|job| job.id == id)?;
            let mut candidate = guard[pos].clone();
            if !apply(&mut candidate) {
                return None;
            }
            Arc::make_mut(&mut guard)[pos] = candidate;
            self.save_if_needed(guard.as_slice());
            Arc::clone(&guard)
        };
        Some(snapshot)
    }

    pub fn remove(&self, id: &str) -> Option<JobSnapshot> {
        let snapshot = {
            let mut guard = self.jobs.write().ok()?;
            let pos = guard.iter().position(|job| job.id == id)?;
            Arc::make_mut(&mut guard).remove(pos);
            self.save_if_needed(guard.as_slice());
            Arc::clone(&guard)
        };
        Some(snapshot)
    }

    pub fn replace_all(&self, records: Vec<JobRecord>) -> JobSnapshot {
        let snapshot = Arc::new(records);
        if let Ok(mut guard) = self.jobs.write() {
            *guard = Arc::clone(&snapshot);
        }
        snapshot
    }

    fn save_if_needed(&self, jobs: &[JobRecord]) {
        let path = match &self.persist_path {
            Some(path) => path,
            None => return,
        };
        match serde_json::to_string_pretty(jobs) {
            Ok(serialized) => {
                if let Err(err) = fs::write(path, serialized) {
                    warn!(path = %path.display(), error = %err, "failed to persist job history");
                }
            }
            Err(err) => warn!(error = %err, "failed to serialize job history"),
        }
    }

    pub fn persist_path(&self) -> Option<&Path> {
        self.persist_path.as_deref()
    }

    pub fn load_from_disk(path: &Path) -> Option<Vec<JobRecord>> {
        let data = fs::read_to_string(path).ok()?;
        match serde_json::from_str::<Vec<JobRecord>>(&data) {
            Ok(jobs) => Some(jobs),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "ignoring unreadable job history");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{FormatKind, JobStatus};

    fn job(id: &str) -> JobRecord {
        JobRecord::pending(id, "https://example.com/v", "137", FormatKind::Video, false)
    }

    #[test]
    fn newest_record_is_first() {
        let store = JobStore::new(None);
        store.insert_front(job("a"));
        store.insert_front(job("b"));
        let ids: Vec<_> = store.snapshot().iter().map(|j| j.id.clone()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn duplicate_ids_are_replaced_not_duplicated() {
        let store = JobStore::new(None);
        store.insert_front(job("a"));
        store.insert_front(job("b"));
        store.insert_front(job("a"));
        let ids: Vec<_> = store.snapshot().iter().map(|j| j.id.clone()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn old_snapshots_are_not_mutated() {
        let store = JobStore::new(None);
        store.insert_front(job("a"));
        let before = store.snapshot();
        store.update("a", |rec| {
            rec.status = JobStatus::Success;
            true
        });
        assert_eq!(before[0].status, JobStatus::Pending);
        assert_eq!(store.get("a").unwrap().status, JobStatus::Success);
    }

    #[test]
    fn update_is_keyed_by_id() {
        let store = JobStore::new(None);
        store.insert_front(job("a"));
        store.insert_front(job("b"));
        store.insert_front(job("c"));
        store.remove("b");
        store.update("a", |rec| {
            rec.progress = Some(77);
            true
        });
        assert_eq!(store.get("a").unwrap().progress, Some(77));
        assert_eq!(store.get("c").unwrap().progress, Some(0));
        assert!(store.update("b", |_| true).is_none());
    }

    #[test]
    fn unchanged_update_publishes_nothing() {
        let store = JobStore::new(None);
        store.insert_front(job("a"));
        let before = store.snapshot();
        assert!(store.update("a", |_| false).is_none());
        assert!(Arc::ptr_eq(&before, &store.snapshot()));
    }

    #[test]
    fn remove_missing_is_noop() {
        let store = JobStore::new(None);
        store.insert_front(job("a"));
        assert!(store.remove("zzz").is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn pollable_ids_skip_terminal_and_poll_error() {
        let store = JobStore::new(None);
        for id in ["p", "s", "e"] {
            store.insert_front(job(id));
        }
        store.update("s", |rec| {
            rec.status = JobStatus::Success;
            true
        });
        store.update("e", |rec| {
            rec.status = JobStatus::PollError;
            true
        });
        assert_eq!(store.pollable_ids(), vec!["p"]);
        assert!(store.has_pollable());
    }

    #[test]
    fn history_file_tracks_latest_snapshot_under_concurrent_writers() {
        let path = std::env::temp_dir().join(format!(
            "downloader-history-race-{}.json",
            std::process::id()
        ));
        let store = Arc::new(JobStore::new(Some(path.clone())));
        store.insert_front(job("polled"));

        let ticker = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for pct in 0..50u8 {
                    store.update("polled", |rec| {
                        rec.status = JobStatus::Progress;
                        rec.progress = Some(pct);
                        true
                    });
                }
            })
        };
        let submitter = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for n in 0..20 {
                    store.insert_front(job(&format!("new-{}", n)));
                }
            })
        };
        ticker.join().unwrap();
        submitter.join().unwrap();

        let loaded = JobStore::load_from_disk(&path).unwrap();
        assert_eq!(loaded.len(), 21);
        assert_eq!(loaded, *store.snapshot());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn history_round_trips_through_disk() {
        let path = std::env::temp_dir().join(format!(
            "downloader-history-{}.json",
            std::process::id()
        ));
        let store = JobStore::new(Some(path.clone()));
        store.insert_front(job("a"));
        store.update("a", |rec| {
            rec.status = JobStatus::Failure;
            rec.error_message = Some("boom".into());
            true
        });
        let loaded = JobStore::load_from_disk(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].error_message.as_deref(), Some("boom"));
        let _ = fs::remove_file(path);
    }
}
