use shared::error::{ApiException, ErrorCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("backend request failed: {0}")]
    Gateway(#[from] ApiException),
    #[error("{0}")]
    Validation(String),
    #[error("invalid payload from backend: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("no {collection} record with id {id}")]
    UnknownRecord { collection: String, id: String },
    #[error("not signed in")]
    NotSignedIn,
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("local preferences unavailable: {0}")]
    Preferences(#[source] anyhow::Error),
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn category(&self) -> NoticeCategory {
        match self {
            ClientError::Gateway(err) if err.is_auth() => NoticeCategory::Auth,
            ClientError::Gateway(err) => match err.code {
                ErrorCode::Transport => NoticeCategory::Transport,
                ErrorCode::Validation => NoticeCategory::Validation,
                _ => NoticeCategory::Backend,
            },
            ClientError::NotSignedIn => NoticeCategory::Auth,
            ClientError::Validation(_) | ClientError::UnknownRecord { .. } => {
                NoticeCategory::Validation
            }
            ClientError::Decode(_) | ClientError::Config(_) | ClientError::Preferences(_) => {
                NoticeCategory::Backend
            }
        }
    }

    pub fn requires_reauth(&self) -> bool {
        self.category() == NoticeCategory::Auth
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeCategory {
    Auth,
    Transport,
    Validation,
    Backend,
}

/// A transient, user-visible message raised where an action failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub category: NoticeCategory,
    pub message: String,
}

impl Notice {
    pub fn new(category: NoticeCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }

    pub fn from_error(summary: &str, error: &ClientError) -> Self {
        Self::new(error.category(), format!("{summary}: {error}"))
    }
}
