use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Progress,
    Success,
    Failure,
    PollError,
}

impl JobStatus {
    /// `Success` and `Failure` are final: never polled or merged again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }

    /// Only these are fetched on a poll tick. `PollError` waits for the user to dismiss it.
    pub fn needs_polling(self) -> bool {
        matches!(self, Self::Pending | Self::Progress)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Progress => "PROGRESS",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::PollError => "POLL_ERROR",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    Video,
    Audio,
}

impl FormatKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

/// One selectable output format offered by the backend for a source URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    pub code: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: FormatKind,
    #[serde(default)]
    pub extension: Option<String>,
    #[serde(default)]
    pub filesize: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub source_url: String,
    pub format_selector: String,
    pub format_kind: FormatKind,
    pub is_playlist: bool,
    pub status: JobStatus,
    pub progress: Option<u8>,
    pub result: Option<Value>,
    pub error_message: Option<String>,
    /// Latest free-form step text reported by the job runner, e.g. "Verifying output...".
    #[serde(default)]
    pub status_text: Option<String>,
    #[serde(default)]
    pub poll_failures: u32,
    pub created_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn pending(
        id: &str,
        source_url: &str,
        format_selector: &str,
        format_kind: FormatKind,
        is_playlist: bool,
    ) -> Self {
        Self {
            id: id.to_string(),
            source_url: source_url.to_string(),
            format_selector: format_selector.to_string(),
            format_kind,
            is_playlist,
            status: JobStatus::Pending,
            progress: Some(0),
            result: None,
            error_message: None,
            status_text: None,
            poll_failures: 0,
            created_at: Utc::now(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn needs_polling(&self) -> bool {
        self.status.needs_polling()
    }

    /// Relative paths or URLs of the produced artifacts, when the job succeeded.
    pub fn artifact_locators(&self) -> Vec<String> {
        if self.status != JobStatus::Success {
            return Vec::new();
        }
        let entries = match &self.result {
            Some(Value::Array(items)) => items.iter().collect::<Vec<_>>(),
            Some(single @ Value::Object(_)) => vec![single],
            _ => return Vec::new(),
        };
        entries
            .into_iter()
            .filter_map(|entry| {
                ["file_url", "url", "filepath", "filename"]
                    .iter()
                    .find_map(|key| entry.get(*key).and_then(Value::as_str))
                    .map(str::to_string)
            })
            .collect()
    }
}

/// Resolves an artifact locator against the API base URL; media is served beside `/api`.
pub fn artifact_url(api_base: &str, locator: &str) -> String {
    if locator.starts_with("http://") || locator.starts_with("https://") {
        return locator.to_string();
    }
    let base = api_base.trim_end_matches('/');
    let origin = base.strip_suffix("/api").unwrap_or(base);
    crate::helpers::join_url(origin, locator)
}

/// Where a failure explanation may be found in a status payload, tried in configured order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMessageSource {
    ResultExcMessage,
    InfoStatus,
    StatusMessage,
    ResultError,
}

impl FailureMessageSource {
    pub fn default_order() -> Vec<Self> {
        vec![Self::ResultExcMessage, Self::InfoStatus, Self::StatusMessage]
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PollReport {
    pub polled: usize,
    pub updated: usize,
    pub failed: usize,
    /// Another tick was still awaiting responses, so this one did nothing.
    pub skipped: bool,
}
