use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::merge::{merge_status, record_poll_failure, MergePolicy};
use super::poller::{PollTarget, Poller};
use super::store::{JobSnapshot, JobStore};
use super::types::{FormatDescriptor, FormatKind, JobRecord, PollReport};
use crate::api::{DownloadRequest, JobApi};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::session::{Access, CapabilityGate};

const EVENT_CAPACITY: usize = 64;

#[derive(Clone, Debug)]
pub enum TrackerEvent {
    JobsChanged(JobSnapshot),
    PollerStarted,
    PollerStopped,
}

/// Formats offered for the most recently probed URL. Dropped on submit or the next probe.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbedFormats {
    pub url: String,
    pub formats: Vec<FormatDescriptor>,
}

/// Audio when the selector asks for a conversion, otherwise whatever the probe reported.
pub fn format_kind_for(code: &str, formats: &[FormatDescriptor]) -> FormatKind {
    if code.contains("_convert_") {
        return FormatKind::Audio;
    }
    formats
        .iter()
        .find(|format| format.code == code)
        .map(|format| format.kind)
        .unwrap_or(FormatKind::Video)
}

/// Tracks submitted download jobs and keeps them in sync with the backend.
#[derive(Clone)]
pub struct TaskTracker {
    inner: Arc<TrackerInner>,
}

struct TrackerInner {
    api: Arc<dyn JobApi>,
    gate: Arc<dyn CapabilityGate>,
    policy: MergePolicy,
    poll_interval: Duration,
    store: JobStore,
    events: broadcast::Sender<TrackerEvent>,
    poller: Poller,
    tick_lock: tokio::sync::Mutex<()>,
    busy: Mutex<Option<&'static str>>,
    probed: Mutex<Option<ProbedFormats>>,
}

/// Holds the probe/submit slot; released on drop.
struct BusyGuard<'a> {
    slot: &'a Mutex<Option<&'static str>>,
}

impl<'a> BusyGuard<'a> {
    fn claim(slot: &'a Mutex<Option<&'static str>>, what: &'static str) -> Result<Self, ClientError> {
        let mut current = slot
            .lock()
            .map_err(|_| ClientError::Busy("tracker lock"))?;
        if let Some(other) = *current {
            return Err(ClientError::Busy(other));
        }
        *current = Some(what);
        Ok(Self { slot })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut current) = self.slot.lock() {
            *current = None;
        }
    }
}

impl TaskTracker {
    pub fn new(api: Arc<dyn JobApi>, gate: Arc<dyn CapabilityGate>, cfg: &ClientConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(TrackerInner {
                api,
                gate,
                policy: MergePolicy::from_config(cfg),
                poll_interval: cfg.poll_interval,
                store: JobStore::new(cfg.history_path.clone()),
                events,
                poller: Poller::new(),
                tick_lock: tokio::sync::Mutex::new(()),
                busy: Mutex::new(None),
                probed: Mutex::new(None),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.inner.events.subscribe()
    }

    pub fn jobs(&self) -> JobSnapshot {
        self.inner.store.snapshot()
    }

    pub fn job(&self, id: &str) -> Option<JobRecord> {
        self.inner.store.get(id)
    }

    pub fn is_polling(&self) -> bool {
        self.inner.poller.is_running()
    }

    pub fn probed_formats(&self) -> Option<ProbedFormats> {
        self.inner.probed.lock().ok().and_then(|probed| probed.clone())
    }

    pub fn resolve_format_kind(&self, code: &str) -> FormatKind {
        let formats = self
            .probed_formats()
            .map(|probed| probed.formats)
            .unwrap_or_default();
        format_kind_for(code, &formats)
    }

    pub async fn probe_formats(&self, url: &str) -> Result<Vec<FormatDescriptor>, ClientError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ClientError::Validation("Please enter a URL.".to_string()));
        }
        let _busy = BusyGuard::claim(&self.inner.busy, "format probe")?;
        self.inner.set_probed(None);

        let resp = self.inner.api.get_formats(url).await.map_err(|err| {
            warn!(%url, error = %err, "format probe failed");
            err
        })?;
        debug!(%url, count = resp.formats.len(), "formats probed");
        self.inner.set_probed(Some(ProbedFormats {
            url: url.to_string(),
            formats: resp.formats.clone(),
        }));
        Ok(resp.formats)
    }

    /// Starts a download job and records it as `PENDING`. Nothing is recorded on failure.
    pub async fn submit(
        &self,
        url: &str,
        format_selector: &str,
        format_kind: FormatKind,
        is_playlist: bool,
    ) -> Result<String, ClientError> {
        match self.inner.gate.access() {
            Access::Allowed => {}
            Access::Pending => return Err(ClientError::SessionPending),
            Access::Denied => {
                return Err(ClientError::Auth(
                    "Please log in to start downloads.".to_string(),
                ))
            }
        }
        let url = url.trim();
        let format_selector = format_selector.trim();
        if url.is_empty() {
            return Err(ClientError::Validation("Please enter a URL.".to_string()));
        }
        if format_selector.is_empty() {
            return Err(ClientError::Validation("Please select a format.".to_string()));
        }
        let _busy = BusyGuard::claim(&self.inner.busy, "download submission")?;

        let request = DownloadRequest {
            url: url.to_string(),
            format_code: format_selector.to_string(),
            format_type: format_kind,
            is_playlist,
        };
        let resp = self
            .inner
            .api
            .submit_download(&request)
            .await
            .map_err(|err| {
                warn!(%url, error = %err, "download submission failed");
                match err {
                    ClientError::Auth(message) => ClientError::Auth(message),
                    other => ClientError::JobSubmission(other.display_message()),
                }
            })?;
        let task_id = resp.task_id.trim().to_string();
        if task_id.is_empty() {
            return Err(ClientError::JobSubmission(
                "backend returned an empty task id".to_string(),
            ));
        }

        let record = JobRecord::pending(&task_id, url, format_selector, format_kind, is_playlist);
        let snapshot = self.inner.store.insert_front(record);
        self.inner.set_probed(None);
        self.inner.emit(TrackerEvent::JobsChanged(snapshot));
        self.inner.ensure_poller();
        info!(%task_id, %url, "download task started");
        Ok(task_id)
    }

    /// Fetches status for every pollable record and merges each answer by id.
    pub async fn poll_once(&self) -> PollReport {
        self.inner.poll_once().await
    }

    /// Drops a record regardless of its status. Unknown ids are ignored.
    pub fn remove(&self, id: &str) -> bool {
        let snapshot = match self.inner.store.remove(id) {
            Some(snapshot) => snapshot,
            None => return false,
        };
        self.inner.emit(TrackerEvent::JobsChanged(snapshot));
        let store = &self.inner.store;
        if self.inner.poller.stop_if(|| !store.has_pollable()) {
            self.inner.emit(TrackerEvent::PollerStopped);
        }
        true
    }

    /// Reloads persisted history and resumes polling for unfinished jobs.
    pub fn restore(&self) -> usize {
        let records = match self
            .inner
            .store
            .persist_path()
            .and_then(JobStore::load_from_disk)
        {
            Some(records) => records,
            None => return 0,
        };
        let count = records.len();
        let snapshot = self.inner.store.replace_all(records);
        self.inner.emit(TrackerEvent::JobsChanged(snapshot));
        self.inner.ensure_poller();
        info!(count, "job history restored");
        count
    }

    /// Cancels the shared timer. Jobs already running on the backend are left alone.
    pub fn shutdown(&self) {
        if self.inner.poller.abort() {
            self.inner.emit(TrackerEvent::PollerStopped);
        }
    }
}

impl TrackerInner {
    fn emit(&self, event: TrackerEvent) {
        let _ = self.events.send(event);
    }

    fn set_probed(&self, value: Option<ProbedFormats>) {
        if let Ok(mut probed) = self.probed.lock() {
            *probed = value;
        }
    }

    fn ensure_poller(self: &Arc<Self>) {
        if self.poller.start(self.poll_interval, Arc::downgrade(self)) {
            self.emit(TrackerEvent::PollerStarted);
        }
    }

    async fn poll_once(&self) -> PollReport {
        let _tick = match self.tick_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("previous poll tick still in flight; skipping");
                return PollReport {
                    skipped: true,
                    ..PollReport::default()
                };
            }
        };

        let ids = self.store.pollable_ids();
        let mut report = PollReport {
            polled: ids.len(),
            ..PollReport::default()
        };
        if ids.is_empty() {
            return report;
        }

        let mut requests: FuturesUnordered<_> = ids
            .into_iter()
            .map(|id| {
                let api = Arc::clone(&self.api);
                async move {
                    let outcome = api.task_status(&id).await;
                    (id, outcome)
                }
            })
            .collect();

        while let Some((id, outcome)) = requests.next().await {
            let changed = match outcome {
                Ok(payload) => self
                    .store
                    .update(&id, |record| merge_status(record, &payload, &self.policy)),
                Err(err) => {
                    let err = ClientError::Poll {
                        task_id: id.clone(),
                        message: err.display_message(),
                    };
                    warn!(error = %err, "status poll failed");
                    report.failed += 1;
                    self.store
                        .update(&id, |record| record_poll_failure(record, &err, &self.policy))
                }
            };
            if changed.is_some() {
                report.updated += 1;
            }
        }

        if report.updated > 0 {
            self.emit(TrackerEvent::JobsChanged(self.store.snapshot()));
        }
        debug!(
            polled = report.polled,
            updated = report.updated,
            failed = report.failed,
            "poll tick finished"
        );
        report
    }
}

#[async_trait]
impl PollTarget for TrackerInner {
    async fn tick(&self) {
        self.poll_once().await;
    }

    fn wants_polling(&self) -> bool {
        self.store.has_pollable()
    }

    fn poller(&self) -> &Poller {
        &self.poller
    }

    fn on_retired(&self) {
        debug!("no pollable jobs left; poll timer stopped");
        self.emit(TrackerEvent::PollerStopped);
    }
}

impl Drop for TrackerInner {
    fn drop(&mut self) {
        self.poller.abort();
    }
}
