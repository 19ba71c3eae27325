//! Error types for the rebuild orchestration core.
//!

use crate::catalog::CatalogError;
use crate::config::ConfigurationError;
use crate::state_machine::StateMachineError;
use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FreshmakerError {
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("State machine error: {0}")]
    StateMachine(#[from] StateMachineError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("{service} error: {reason}")]
    Collaborator { service: String, reason: String },
    #[error("Version error: {0}")]
    Version(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Timeout error: {0}")]
    Timeout(String),
}

impl FreshmakerError {
    /// Error raised by one of the external collaborators (advisory service, build system, ...)
    pub fn collaborator(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Collaborator {
            service: service.into(),
            reason: reason.into(),
        }
    }

    /// Check if error is recoverable (worth retrying)
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            FreshmakerError::Catalog(e) => e.is_recoverable(),
            FreshmakerError::Timeout(_) => true,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for FreshmakerError {
    fn from(error: serde_json::Error) -> Self {
        FreshmakerError::InvalidInput(format!("JSON serialization error: {error}"))
    }
}

pub type FreshmakerResult<T> = std::result::Result<T, FreshmakerError>;
