use serde_json::Value;
use std::fmt;
use thiserror::Error;

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Body of a failed catalog response: JSON when it parses, raw text otherwise
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogErrorBody {
    Json(Value),
    Text(String),
}

impl CatalogErrorBody {
    pub fn from_text(text: String) -> Self {
        match serde_json::from_str::<Value>(&text) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Text(text),
        }
    }
}

impl fmt::Display for CatalogErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(value) => write!(f, "{value}"),
            Self::Text(text) => write!(f, "{text}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Catalog request failed with status {status}: {body}")]
    Request { status: u16, body: CatalogErrorBody },

    #[error("Catalog transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid catalog URL: {0}")]
    InvalidUrl(String),

    #[error("Unexpected catalog response for {resource}: {reason}")]
    Decode { resource: String, reason: String },
}

impl CatalogError {
    pub fn request(status: u16, body: CatalogErrorBody) -> Self {
        Self::Request { status, body }
    }

    pub fn decode(resource: impl Into<String>, reason: impl ToString) -> Self {
        Self::Decode {
            resource: resource.into(),
            reason: reason.to_string(),
        }
    }

    /// Status code of a non-success response
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Request { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Check if error is recoverable (worth retrying)
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Request { status, .. } => *status >= 500,
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::InvalidUrl(_) | Self::Decode { .. } => false,
        }
    }
}
