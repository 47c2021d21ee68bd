use std::sync::Arc;

use downloader_client_rs::{ClientConfig, ClientError, ForumClient, HttpBackend, SessionManager, TaskTracker};

/// Everything the console talks to, wired over one shared HTTP backend and cookie jar.
pub struct Services {
    pub backend: Arc<HttpBackend>,
    pub session: Arc<SessionManager>,
    pub tracker: TaskTracker,
    pub forum: ForumClient,
}

impl Services {
    pub fn connect(cfg: &ClientConfig) -> Result<Self, ClientError> {
        let backend = Arc::new(HttpBackend::new(cfg)?);
        let session = Arc::new(SessionManager::new(backend.clone()));
        let tracker = TaskTracker::new(backend.clone(), session.clone(), cfg);
        let forum = ForumClient::new(backend.clone(), session.clone());
        Ok(Self {
            backend,
            session,
            tracker,
            forum,
        })
    }
}
