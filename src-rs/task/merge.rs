use serde_json::Value;

use super::types::{FailureMessageSource, JobRecord, JobStatus};
use crate::api::{RemoteStatus, TaskStatusResponse};
use crate::config::ClientConfig;
use crate::error::ClientError;

#[derive(Clone, Debug)]
pub struct MergePolicy {
    pub failure_message_order: Vec<FailureMessageSource>,
    pub failure_fallback: String,
    pub poll_failure_limit: u32,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

impl MergePolicy {
    pub fn from_config(cfg: &ClientConfig) -> Self {
        Self {
            failure_message_order: cfg.failure_message_order.clone(),
            failure_fallback: cfg.failure_fallback.clone(),
            poll_failure_limit: cfg.effective_poll_failure_limit(),
        }
    }
}

pub fn local_status(remote: RemoteStatus) -> JobStatus {
    match remote {
        RemoteStatus::Pending | RemoteStatus::Retry | RemoteStatus::Unknown => JobStatus::Pending,
        RemoteStatus::Started | RemoteStatus::Progress => JobStatus::Progress,
        RemoteStatus::Success => JobStatus::Success,
        RemoteStatus::Failure | RemoteStatus::Revoked => JobStatus::Failure,
    }
}

/// Folds a fetched status payload into `record`. Returns whether the record changed.
///
/// Records that are terminal or in `PollError` are never touched. A `PROGRESS` record does
/// not fall back to `PENDING`, which guards against a stale response overtaking a newer one.
pub fn merge_status(record: &mut JobRecord, payload: &TaskStatusResponse, policy: &MergePolicy) -> bool {
    if !record.needs_polling() {
        return false;
    }
    let target = local_status(payload.status);
    if record.status == JobStatus::Progress && target == JobStatus::Pending {
        return false;
    }

    let before = record.clone();
    record.status = target;
    record.poll_failures = 0;
    if let Some(text) = payload
        .info
        .as_ref()
        .and_then(|info| info.status.as_deref())
        .filter(|text| !text.trim().is_empty())
    {
        record.status_text = Some(text.to_string());
    }
    if target == JobStatus::Progress {
        if let Some(progress) = payload.info.as_ref().and_then(|info| info.progress) {
            record.progress = Some(clamp_progress(progress));
        }
    }
    record.result = payload.result.clone();
    if target == JobStatus::Failure {
        record.error_message = Some(failure_message(payload, policy));
    }
    *record != before
}

/// Counts a failed status fetch; after `poll_failure_limit` consecutive failures the record
/// becomes `PollError` and stops being polled.
pub fn record_poll_failure(record: &mut JobRecord, err: &ClientError, policy: &MergePolicy) -> bool {
    if !record.needs_polling() {
        return false;
    }
    record.poll_failures = record.poll_failures.saturating_add(1);
    if record.poll_failures >= policy.poll_failure_limit.max(1) {
        record.status = JobStatus::PollError;
        record.error_message = Some(format!("Error checking status: {}", err.display_message()));
    }
    true
}

pub fn failure_message(payload: &TaskStatusResponse, policy: &MergePolicy) -> String {
    policy
        .failure_message_order
        .iter()
        .find_map(|source| extract_message(*source, payload))
        .unwrap_or_else(|| policy.failure_fallback.clone())
}

fn extract_message(source: FailureMessageSource, payload: &TaskStatusResponse) -> Option<String> {
    let found = match source {
        FailureMessageSource::ResultExcMessage => result_field(payload, "exc_message"),
        FailureMessageSource::ResultError => result_field(payload, "error"),
        FailureMessageSource::InfoStatus => payload
            .info
            .as_ref()
            .and_then(|info| info.status.clone()),
        FailureMessageSource::StatusMessage => payload.status_message.clone(),
    };
    found.filter(|message| !message.trim().is_empty())
}

fn result_field(payload: &TaskStatusResponse, key: &str) -> Option<String> {
    payload
        .result
        .as_ref()
        .and_then(|result| result.get(key))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn clamp_progress(raw: f64) -> u8 {
    if !raw.is_finite() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}
