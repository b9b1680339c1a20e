use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppwriteError>;

#[derive(Debug, Error)]
pub enum AppwriteError {
    #[error("{method} {url} failed: {source}")]
    Transport {
        method: reqwest::Method,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("appwrite returned {status} ({kind}): {message}")]
    Api {
        status: StatusCode,
        kind: String,
        message: String,
    },

    #[error("max retries exceeded for {url} (last status {status})")]
    RetriesExhausted { url: String, status: StatusCode },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    Http(#[source] reqwest::Error),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AppwriteError {
    /// HTTP status associated with the failure, when the server answered.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status, .. } | Self::RetriesExhausted { status, .. } => Some(*status),
            Self::Transport { source, .. } | Self::Decode { source, .. } => source.status(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    /// The service's error `type` string, e.g. `document_not_found`.
    pub fn kind(&self) -> Option<&str> {
        match self {
            Self::Api { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

/// Error body returned by the service on non-2xx responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl ErrorBody {
    /// Build an `Api` error, falling back to the raw body when it is not JSON.
    pub(crate) fn into_error(status: StatusCode, raw: &str) -> AppwriteError {
        match serde_json::from_str::<ErrorBody>(raw) {
            Ok(body) => AppwriteError::Api {
                status,
                kind: body.kind,
                message: body.message,
            },
            Err(_) => AppwriteError::Api {
                status,
                kind: String::new(),
                message: raw.to_string(),
            },
        }
    }
}
