pub mod config;
pub mod error;
pub mod forum;
pub mod helpers;

#[path = "api/lib.rs"]
pub mod api;
#[path = "session/lib.rs"]
pub mod session;
#[path = "task/lib.rs"]
pub mod task;

pub use api::HttpBackend;
pub use config::ClientConfig;
pub use error::ClientError;
pub use forum::ForumClient;
pub use session::{Access, CapabilityGate, Session, SessionManager, SessionPhase, User};
pub use task::{FormatKind, JobRecord, JobStatus, TaskTracker, TrackerEvent};
