use std::sync::Arc;

use tracing::{debug, warn};

use crate::api::{ForumApi, ForumPost, ForumTopic, ForumTopicDetail};
use crate::error::ClientError;
use crate::session::{Access, CapabilityGate};

/// Discussion board access for signed-in users.
pub struct ForumClient {
    api: Arc<dyn ForumApi>,
    gate: Arc<dyn CapabilityGate>,
}

impl ForumClient {
    pub fn new(api: Arc<dyn ForumApi>, gate: Arc<dyn CapabilityGate>) -> Self {
        Self { api, gate }
    }

    fn check_access(&self) -> Result<(), ClientError> {
        match self.gate.access() {
            Access::Allowed => Ok(()),
            Access::Pending => Err(ClientError::SessionPending),
            Access::Denied => Err(ClientError::Auth(
                "Please log in to use the forum.".to_string(),
            )),
        }
    }

    pub async fn list_topics(&self) -> Result<Vec<ForumTopic>, ClientError> {
        self.check_access()?;
        let topics = self.api.list_topics().await?;
        debug!(count = topics.len(), "forum topics fetched");
        Ok(topics)
    }

    pub async fn topic(&self, topic_id: &str) -> Result<ForumTopicDetail, ClientError> {
        self.check_access()?;
        let topic_id = topic_id.trim();
        if topic_id.is_empty() {
            return Err(ClientError::Validation("Topic id is required.".to_string()));
        }
        self.api.topic_detail(topic_id).await
    }

    pub async fn create_topic(&self, title: &str) -> Result<ForumTopic, ClientError> {
        self.check_access()?;
        let title = title.trim();
        if title.is_empty() {
            return Err(ClientError::Validation(
                "Topic title cannot be empty.".to_string(),
            ));
        }
        self.api.create_topic(title).await.map_err(|err| {
            warn!(error = %err, "creating forum topic failed");
            err
        })
    }

    pub async fn reply(&self, topic_id: &str, content: &str) -> Result<ForumPost, ClientError> {
        self.check_access()?;
        let topic_id = topic_id.trim();
        let content = content.trim();
        if topic_id.is_empty() {
            return Err(ClientError::Validation("Topic id is required.".to_string()));
        }
        if content.is_empty() {
            return Err(ClientError::Validation("Reply cannot be empty.".to_string()));
        }
        self.api.create_post(topic_id, content).await.map_err(|err| {
            warn!(%topic_id, error = %err, "posting forum reply failed");
            err
        })
    }
}
