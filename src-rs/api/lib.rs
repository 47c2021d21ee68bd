pub mod csrf;
pub mod http;
pub mod transport;
pub mod types;

pub use http::HttpBackend;
pub use transport::{ForumApi, IdentityApi, JobApi};
pub use types::{
    AuthStatusResponse, DownloadRequest, DownloadResponse, ForumAuthor, ForumPost, ForumTopic,
    ForumTopicDetail, FormatsResponse, LoginRequest, LoginResponse, ProgressInfo,
    RegisterRequest, RegisterResponse, RemoteStatus, TaskStatusResponse,
};
