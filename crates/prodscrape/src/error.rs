//! Terminal error types of the extraction pipeline.
//!
//! Missing fields are never errors; they surface as absent values on the
//! record. Only setup, navigation and viability failures reach the caller.

use std::time::Duration;

/// Failure while preparing or driving a rendering session.
#[derive(thiserror::Error, Debug)]
pub enum NavigationError {
    /// Session creation or fingerprint preparation failed. Not retried.
    #[error("session setup failed: {0}")]
    Setup(String),

    #[error("navigation timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The frame became unusable mid-navigation. Retried on a fresh session.
    #[error("frame detached: {0}")]
    Detachment(String),

    #[error("navigation failed after {attempts} attempts: {last}")]
    ExhaustedRetries {
        attempts: u32,
        #[source]
        last: Box<NavigationError>,
    },

    /// Any engine fault not recognised as transient.
    #[error("browser engine error: {0}")]
    Engine(String),
}

/// Terminal outcome of [`crate::ProductAssembler::assemble`].
#[derive(thiserror::Error, Debug)]
pub enum ExtractionError {
    #[error("invalid product url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("browser setup failed: {0}")]
    Setup(String),

    #[error("navigation failed: {0}")]
    NavigationFailed(#[source] NavigationError),

    #[error("no viable product data at {url}: neither a product name nor a price was found")]
    NoViableData { url: String },
}

impl ExtractionError {
    /// Pipeline stage that failed, for user-facing reports.
    pub fn stage(&self) -> &'static str {
        match self {
            ExtractionError::InvalidUrl { .. } => "input",
            ExtractionError::Setup(_) => "setup",
            ExtractionError::NavigationFailed(_) => "navigation",
            ExtractionError::NoViableData { .. } => "extraction",
        }
    }
}

impl From<NavigationError> for ExtractionError {
    fn from(e: NavigationError) -> Self {
        match e {
            NavigationError::Setup(reason) => ExtractionError::Setup(reason),
            other => ExtractionError::NavigationFailed(other),
        }
    }
}
