pub mod merge;
pub mod poller;
pub mod store;
pub mod tracker;
pub mod types;

pub use merge::{failure_message, local_status, MergePolicy};
pub use store::{JobSnapshot, JobStore};
pub use tracker::{format_kind_for, ProbedFormats, TaskTracker, TrackerEvent};
pub use types::{
    artifact_url, FailureMessageSource, FormatDescriptor, FormatKind, JobRecord, JobStatus,
    PollReport,
};
