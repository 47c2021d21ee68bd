use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::csrf::csrf_token;
use super::transport::{ForumApi, IdentityApi, JobApi};
use super::types::{
    AuthStatusResponse, DownloadRequest, DownloadResponse, ForumPost, ForumTopic,
    ForumTopicDetail, FormatsRequest, FormatsResponse, LoginRequest, LoginResponse,
    NewPostRequest, NewTopicRequest, RegisterRequest, RegisterResponse, TaskStatusResponse,
};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::helpers::join_url;

/// Cookie-authenticated client for the downloader REST API.
pub struct HttpBackend {
    base_url: String,
    base: Url,
    csrf_cookie: String,
    csrf_header: HeaderName,
    jar: Arc<Jar>,
    client: Client,
}

impl fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpBackend")
            .field("base_url", &self.base_url)
            .field("csrf_cookie", &self.csrf_cookie)
            .field("csrf_header", &self.csrf_header)
            .finish()
    }
}

impl HttpBackend {
    pub fn new(cfg: &ClientConfig) -> Result<Self, ClientError> {
        cfg.validate()?;
        let base: Url = cfg.base_url.parse().map_err(|err| {
            ClientError::Config(format!("invalid base url {}: {}", cfg.base_url, err))
        })?;
        let csrf_header = HeaderName::from_bytes(cfg.csrf_header.as_bytes()).map_err(|err| {
            ClientError::Config(format!("invalid csrf header {}: {}", cfg.csrf_header, err))
        })?;
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .timeout(cfg.request_timeout)
            .build()
            .map_err(|err| ClientError::Config(format!("failed to build http client: {}", err)))?;
        Ok(Self {
            base_url: cfg.base_url.clone(),
            base,
            csrf_cookie: cfg.csrf_cookie.clone(),
            csrf_header,
            jar,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    fn mutating_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        match csrf_token(&self.jar, &self.base, &self.csrf_cookie) {
            Some(token) => match HeaderValue::from_str(&token) {
                Ok(value) => {
                    headers.insert(self.csrf_header.clone(), value);
                }
                Err(_) => warn!(cookie = %self.csrf_cookie, "csrf cookie is not a valid header value"),
            },
            None => warn!(cookie = %self.csrf_cookie, "csrf cookie not found; sending request without token"),
        }
        headers
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.endpoint(path);
        debug!(%url, "GET");
        let body = send(self.client.get(&url).header(ACCEPT, "application/json")).await?;
        decode(&body)
    }

    async fn post_json<B, T>(&self, path: &str, payload: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path);
        debug!(%url, "POST");
        let request = self
            .client
            .post(&url)
            .headers(self.mutating_headers())
            .json(payload);
        let body = send(request).await?;
        decode(&body)
    }

    async fn post_ignoring_body(&self, path: &str) -> Result<(), ClientError> {
        let url = self.endpoint(path);
        debug!(%url, "POST");
        send(self.client.post(&url).headers(self.mutating_headers())).await?;
        Ok(())
    }
}

async fn send(request: RequestBuilder) -> Result<String, ClientError> {
    let resp = request
        .send()
        .await
        .map_err(|err| ClientError::Transport(err.to_string()))?;
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    if status.is_client_error() || status.is_server_error() {
        return Err(error_for_status(status, &body));
    }
    Ok(body)
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ClientError> {
    serde_json::from_str(body)
        .map_err(|err| ClientError::Transport(format!("invalid json response: {}", err)))
}

fn error_for_status(status: StatusCode, body: &str) -> ClientError {
    let code = status.as_u16();
    let message = extract_error_message(body).unwrap_or_else(|| format!("http {}", code));
    match code {
        401 | 403 => ClientError::Auth(message),
        _ if status.is_client_error() => ClientError::Rejected { status: code, message },
        _ => ClientError::Transport(format!("server error {}: {}", code, message)),
    }
}

/// Pulls a human readable message out of an error body: `{"error": ..}`, `{"detail": ..}`
/// or the first entry of a field error list such as `{"title": ["required"]}`.
pub fn extract_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    for key in ["error", "detail", "message"] {
        if let Some(message) = value.get(key).and_then(Value::as_str) {
            return Some(message.to_string());
        }
    }
    value.as_object()?.values().find_map(|field| {
        field
            .as_array()
            .and_then(|items| items.first())
            .and_then(Value::as_str)
            .map(str::to_string)
    })
}

#[async_trait]
impl IdentityApi for HttpBackend {
    async fn auth_status(&self) -> Result<AuthStatusResponse, ClientError> {
        self.get_json("/auth/status/").await
    }

    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ClientError> {
        self.post_json("/auth/login/", request).await
    }

    async fn logout(&self) -> Result<(), ClientError> {
        self.post_ignoring_body("/auth/logout/").await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<RegisterResponse, ClientError> {
        self.post_json("/auth/register/", request).await
    }
}

#[async_trait]
impl JobApi for HttpBackend {
    async fn get_formats(&self, url: &str) -> Result<FormatsResponse, ClientError> {
        let request = FormatsRequest {
            url: url.to_string(),
        };
        self.post_json("/get_formats/", &request).await
    }

    async fn submit_download(
        &self,
        request: &DownloadRequest,
    ) -> Result<DownloadResponse, ClientError> {
        self.post_json("/download/", request).await
    }

    async fn task_status(&self, task_id: &str) -> Result<TaskStatusResponse, ClientError> {
        self.get_json(&format!("/task_status/{}/", task_id)).await
    }
}

#[async_trait]
impl ForumApi for HttpBackend {
    async fn list_topics(&self) -> Result<Vec<ForumTopic>, ClientError> {
        self.get_json("/forum/topics/").await
    }

    async fn topic_detail(&self, topic_id: &str) -> Result<ForumTopicDetail, ClientError> {
        self.get_json(&format!("/forum/topics/{}/", topic_id)).await
    }

    async fn create_topic(&self, title: &str) -> Result<ForumTopic, ClientError> {
        let request = NewTopicRequest {
            title: title.to_string(),
        };
        self.post_json("/forum/topics/", &request).await
    }

    async fn create_post(&self, topic_id: &str, content: &str) -> Result<ForumPost, ClientError> {
        let request = NewPostRequest {
            content: content.to_string(),
        };
        self.post_json(&format!("/forum/topics/{}/posts/", topic_id), &request)
            .await
    }
}
