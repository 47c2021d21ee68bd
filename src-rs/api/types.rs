use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::task::{FormatDescriptor, FormatKind};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthStatusResponse {
    #[serde(rename = "isAuthenticated")]
    pub is_authenticated: bool,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub username: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FormatsRequest {
    pub url: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FormatsResponse {
    #[serde(default)]
    pub formats: Vec<FormatDescriptor>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub format_code: String,
    pub format_type: FormatKind,
    pub is_playlist: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadResponse {
    pub task_id: String,
}

/// Status vocabulary reported by the job runner. Unrecognised values decode as `Unknown`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoteStatus {
    Pending,
    Started,
    Retry,
    Progress,
    Success,
    Failure,
    Revoked,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ProgressInfo {
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TaskStatusResponse {
    pub status: RemoteStatus,
    #[serde(default)]
    pub info: Option<ProgressInfo>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub status_message: Option<String>,
}

impl TaskStatusResponse {
    pub fn new(status: RemoteStatus) -> Self {
        Self {
            status,
            info: None,
            result: None,
            status_message: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForumAuthor {
    #[serde(default)]
    pub id: Option<u64>,
    pub username: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ForumTopic {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub author: Option<ForumAuthor>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub post_count: Option<u32>,
    #[serde(default)]
    pub latest_post_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ForumPost {
    pub id: String,
    #[serde(default)]
    pub author: Option<ForumAuthor>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ForumTopicDetail {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub author: Option<ForumAuthor>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub posts: Vec<ForumPost>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewTopicRequest {
    pub title: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewPostRequest {
    pub content: String,
}
