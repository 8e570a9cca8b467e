//! Typed errors for the pollen pipeline.
//!
//! Fetch-level failures are described by [`FetchError`] and normalized into a
//! single [`UpdateFailed`] before they reach the poll coordinator. Classifier
//! and read-side failures use [`PollenError`].

use thiserror::Error;

/// Low-level failure of a single fetch against the remote API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("{0}")]
    Transport(String),
    #[error("{0}")]
    Status(reqwest::StatusCode),
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_decode() {
            FetchError::MalformedPayload(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

/// Stable failure signal surfaced to the poll coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct UpdateFailed(pub String);

impl UpdateFailed {
    pub fn reason(&self) -> &str {
        &self.0
    }
}

impl From<FetchError> for UpdateFailed {
    fn from(err: FetchError) -> Self {
        UpdateFailed(format!("Error fetching data: {}", err))
    }
}

/// Errors raised by classification and by consumers reading sensor state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollenError {
    #[error("unknown pollen kind: {0:?}")]
    UnknownKind(String),
    #[error("unknown severity level label: {0:?}")]
    UnknownLevel(String),
    #[error("threshold configuration is inconsistent: {0}")]
    ConfigurationInconsistency(String),
    #[error("no snapshot has been fetched yet")]
    NotReady,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_message_contains_code() {
        let err: UpdateFailed = FetchError::Status(reqwest::StatusCode::SERVICE_UNAVAILABLE).into();
        assert_eq!(err.reason(), "Error fetching data: 503 Service Unavailable");
    }

    #[test]
    fn test_timeout_message() {
        let err: UpdateFailed = FetchError::Timeout.into();
        assert_eq!(err.to_string(), "Error fetching data: request timed out");
    }

    #[test]
    fn test_malformed_payload_message() {
        let err: UpdateFailed = FetchError::MalformedPayload("missing field `hourly`".into()).into();
        assert!(err.reason().starts_with("Error fetching data: malformed payload"));
        assert!(err.reason().contains("hourly"));
    }

    #[test]
    fn test_pollen_error_display() {
        let err = PollenError::UnknownLevel("level_ high".into());
        assert!(err.to_string().contains("level_ high"));
        assert_eq!(
            PollenError::NotReady.to_string(),
            "no snapshot has been fetched yet"
        );
    }
}
