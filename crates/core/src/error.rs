use inkpress_appwrite::AppwriteError;
use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("backend error: {0}")]
    Backend(#[source] AppwriteError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl ServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<AppwriteError> for ServiceError {
    fn from(err: AppwriteError) -> Self {
        match &err {
            AppwriteError::Transport { .. } | AppwriteError::RetriesExhausted { .. } => {
                return Self::Unavailable(err.to_string());
            }
            AppwriteError::InvalidArgument(msg) => return Self::InvalidInput(msg.clone()),
            _ => {}
        }
        match err.status() {
            Some(StatusCode::NOT_FOUND) => Self::NotFound(err.to_string()),
            Some(StatusCode::CONFLICT) => Self::AlreadyExists(err.to_string()),
            Some(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                Self::PermissionDenied(err.to_string())
            }
            Some(StatusCode::BAD_REQUEST) => Self::InvalidInput(err.to_string()),
            Some(s) if s == StatusCode::TOO_MANY_REQUESTS || s.is_server_error() => {
                Self::Unavailable(err.to_string())
            }
            _ => Self::Backend(err),
        }
    }
}
