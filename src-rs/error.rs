use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("{0}")]
    Validation(String),
    #[error("could not start download: {0}")]
    JobSubmission(String),
    #[error("status check failed for {task_id}: {message}")]
    Poll { task_id: String, message: String },
    #[error("session check still in progress")]
    SessionPending,
    #[error("busy: {0}")]
    Busy(&'static str),
    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth_error",
            Self::Transport(_) => "network_error",
            Self::Rejected { .. } => "api_error",
            Self::Validation(_) => "validation_error",
            Self::JobSubmission(_) => "submission_error",
            Self::Poll { .. } => "poll_error",
            Self::SessionPending => "session_pending",
            Self::Busy(_) => "busy",
            Self::Config(_) => "config_error",
        }
    }

    /// Whether repeating the same request later could succeed without user input.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Poll { .. } | Self::SessionPending | Self::Busy(_)
        )
    }

    /// Text suitable for showing next to the form that triggered the request.
    pub fn display_message(&self) -> String {
        match self {
            Self::Auth(message)
            | Self::Transport(message)
            | Self::Validation(message)
            | Self::JobSubmission(message)
            | Self::Config(message) => message.clone(),
            Self::Rejected { message, .. } | Self::Poll { message, .. } => message.clone(),
            Self::SessionPending => "Checking your session, try again in a moment.".to_string(),
            Self::Busy(what) => format!("Please wait: {} in progress.", what),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_taxonomy() {
        assert_eq!(ClientError::Auth("x".into()).code(), "auth_error");
        assert_eq!(
            ClientError::Poll {
                task_id: "abc".into(),
                message: "boom".into()
            }
            .code(),
            "poll_error"
        );
        assert!(ClientError::Transport("down".into()).is_retryable());
        assert!(!ClientError::Validation("empty".into()).is_retryable());
    }

    #[test]
    fn display_message_strips_prefixes() {
        let err = ClientError::Rejected {
            status: 400,
            message: "Invalid URL".into(),
        };
        assert_eq!(err.display_message(), "Invalid URL");
        assert_eq!(err.to_string(), "request rejected (400): Invalid URL");
    }
}
