use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised while talking to the roster, nation, grade and webhook
/// endpoints.
#[derive(Debug, Error)]
pub enum ScanError {
  #[error("http request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("unexpected status {status}: {body}")]
  Status { status: StatusCode, body: String },

  #[error("invalid response body: {0}")]
  Decode(#[from] serde_json::Error),

  #[error("store error: {0}")]
  Store(#[from] lookout_db::DbError),

  #[error("invalid configuration: {0}")]
  Config(String),
}

impl ScanError {
  /// Build a [`ScanError::Status`] from a non-success response, consuming the body.
  pub async fn from_response(response: reqwest::Response) -> Self {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    ScanError::Status { status, body }
  }

  /// Whether the remote side refused the request itself (4xx other than rate
  /// limiting), as opposed to a transport or server failure.
  pub fn is_client_rejection(&self) -> bool {
    matches!(
      self,
      ScanError::Status { status, .. }
        if status.is_client_error() && *status != StatusCode::TOO_MANY_REQUESTS
    )
  }
}

impl From<crate::validation::ValidationError> for ScanError {
  fn from(err: crate::validation::ValidationError) -> Self {
    ScanError::Config(err.to_string())
  }
}

pub type Result<T> = std::result::Result<T, ScanError>;
