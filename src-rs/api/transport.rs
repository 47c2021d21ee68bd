use async_trait::async_trait;

use super::types::{
    AuthStatusResponse, DownloadRequest, DownloadResponse, ForumPost, ForumTopic,
    ForumTopicDetail, FormatsResponse, LoginRequest, LoginResponse, RegisterRequest,
    RegisterResponse, TaskStatusResponse,
};
use crate::error::ClientError;

/// Remote identity service backing the session manager.
#[async_trait]
pub trait IdentityApi: Send + Sync {
    async fn auth_status(&self) -> Result<AuthStatusResponse, ClientError>;
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ClientError>;
    async fn logout(&self) -> Result<(), ClientError>;
    async fn register(&self, request: &RegisterRequest) -> Result<RegisterResponse, ClientError>;
}

/// Format probing, job submission and per-job status.
#[async_trait]
pub trait JobApi: Send + Sync {
    async fn get_formats(&self, url: &str) -> Result<FormatsResponse, ClientError>;
    async fn submit_download(
        &self,
        request: &DownloadRequest,
    ) -> Result<DownloadResponse, ClientError>;
    async fn task_status(&self, task_id: &str) -> Result<TaskStatusResponse, ClientError>;
}

#[async_trait]
pub trait ForumApi: Send + Sync {
    async fn list_topics(&self) -> Result<Vec<ForumTopic>, ClientError>;
    async fn topic_detail(&self, topic_id: &str) -> Result<ForumTopicDetail, ClientError>;
    async fn create_topic(&self, title: &str) -> Result<ForumTopic, ClientError>;
    async fn create_post(&self, topic_id: &str, content: &str) -> Result<ForumPost, ClientError>;
}
